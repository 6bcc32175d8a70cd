use std::sync::Arc;

use serde::Serialize;

use crate::log_info;

use super::{
    error::PlaybackError,
    script::ScriptExecutor,
    spotify::{open_location_script, NAME_SCRIPT, RUNNING_SCRIPT},
};

const ENABLE_LOGS: bool = true;

pub const AUTOMATION_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_Automation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    Authorized,
    Denied,
    NotDetermined,
    TargetNotRunning,
}

impl PermissionStatus {
    /// Whether polling Spotify makes sense in this state.
    pub fn allows_polling(self) -> bool {
        matches!(
            self,
            PermissionStatus::Authorized | PermissionStatus::TargetNotRunning
        )
    }

    fn from_reply(reply: &str) -> Self {
        if reply.trim() == "not running" {
            PermissionStatus::TargetNotRunning
        } else {
            PermissionStatus::Authorized
        }
    }

    fn from_error(err: &PlaybackError) -> Self {
        match err {
            PlaybackError::PermissionDenied { .. } => PermissionStatus::Denied,
            PlaybackError::NotRunning { .. } => PermissionStatus::TargetNotRunning,
            _ => PermissionStatus::NotDetermined,
        }
    }
}

/// Answers whether this process may send Apple events to Spotify.
#[derive(Clone)]
pub struct PermissionGate {
    executor: Arc<ScriptExecutor>,
}

impl PermissionGate {
    pub fn new(executor: Arc<ScriptExecutor>) -> Self {
        Self { executor }
    }

    pub async fn check(&self) -> PermissionStatus {
        match self.executor.run(RUNNING_SCRIPT).await {
            Ok(reply) => PermissionStatus::from_reply(&reply),
            Err(err) => PermissionStatus::from_error(&err),
        }
    }

    /// Addresses Spotify directly so the system prompt appears, then re-checks.
    pub async fn request(&self) -> PermissionStatus {
        if let Err(err) = self.executor.run(NAME_SCRIPT).await {
            log_info!("[permission] prompt script failed: {}", err);
        }
        self.check().await
    }

    pub async fn open_settings(&self) -> Result<(), PlaybackError> {
        self.executor
            .run(&open_location_script(AUTOMATION_SETTINGS_URL))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::script::{codes, ScriptError};
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    fn gate_with(
        runner: impl Fn(&str) -> Result<String, ScriptError> + Send + Sync + 'static,
    ) -> PermissionGate {
        PermissionGate::new(Arc::new(ScriptExecutor::new(Arc::new(runner))))
    }

    #[tokio::test]
    async fn check_maps_codes_to_statuses() {
        let gate = gate_with(|_: &str| Ok("paused".to_string()));
        assert_eq!(gate.check().await, PermissionStatus::Authorized);

        let gate = gate_with(|_: &str| Ok("not running".to_string()));
        assert_eq!(gate.check().await, PermissionStatus::TargetNotRunning);

        let gate = gate_with(|_: &str| Err(ScriptError::new(Some(codes::NOT_AUTHORIZED), "no")));
        assert_eq!(gate.check().await, PermissionStatus::Denied);

        let gate = gate_with(|_: &str| Err(ScriptError::new(Some(codes::APP_NOT_RUNNING), "gone")));
        assert_eq!(gate.check().await, PermissionStatus::TargetNotRunning);

        let gate = gate_with(|_: &str| Err(ScriptError::new(Some(codes::CANT_GET), "huh")));
        assert_eq!(gate.check().await, PermissionStatus::NotDetermined);
    }

    #[tokio::test]
    async fn request_runs_the_prompt_script_before_rechecking() {
        let prompted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&prompted);
        let gate = gate_with(move |source: &str| {
            if source == NAME_SCRIPT {
                flag.store(true, Ordering::SeqCst);
                return Ok("Spotify".to_string());
            }
            if flag.load(Ordering::SeqCst) {
                Ok("playing".to_string())
            } else {
                Err(ScriptError::new(Some(codes::NOT_AUTHORIZED), "no"))
            }
        });

        assert_eq!(gate.check().await, PermissionStatus::Denied);
        assert_eq!(gate.request().await, PermissionStatus::Authorized);
        assert!(prompted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn open_settings_targets_the_automation_pane() {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        let gate = gate_with(move |source: &str| {
            *sink.lock().unwrap() = source.to_string();
            Ok(String::new())
        });

        gate.open_settings().await.unwrap();
        assert!(seen.lock().unwrap().contains("Privacy_Automation"));
    }

    #[test]
    fn only_authorized_or_absent_target_allows_polling() {
        assert!(PermissionStatus::Authorized.allows_polling());
        assert!(PermissionStatus::TargetNotRunning.allows_polling());
        assert!(!PermissionStatus::Denied.allows_polling());
        assert!(!PermissionStatus::NotDetermined.allows_polling());
    }
}
