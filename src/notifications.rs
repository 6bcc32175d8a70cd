//! Desktop notifications for finished focus sessions.

use std::sync::Arc;

use anyhow::{Context, Result};
use notify_rust::Notification;

use crate::models::{SessionRecord, UNLABELED};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Posts through the platform notification center.
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        Notification::new()
            .summary(title)
            .body(body)
            .appname(&self.app_name)
            .show()
            .map(|_| ())
            .context("failed to post notification")
    }
}

#[derive(Clone)]
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Posts the completion notice off the async runtime. Failures are logged.
    pub async fn session_completed(&self, record: &SessionRecord) {
        let (title, body) = completion_message(record);
        let notifier = Arc::clone(&self.notifier);
        let posted = tokio::task::spawn_blocking(move || notifier.notify(&title, &body)).await;

        match posted {
            Ok(Ok(())) => log_info!("Posted completion notification for {}", record.id),
            Ok(Err(err)) => log_warn!("{err:#}"),
            Err(err) => log_warn!("notification worker failed: {err}"),
        }
    }
}

pub fn completion_message(record: &SessionRecord) -> (String, String) {
    let subject = if record.label == UNLABELED {
        "focus"
    } else {
        record.label.as_str()
    };
    (
        "Focus session complete".to_string(),
        format!("{} of {subject}", format_duration(record.duration_seconds)),
    )
}

/// Human readable duration: `45 s`, `25 min`, `1 h 05 min`.
pub fn format_duration(seconds: u64) -> String {
    match seconds {
        0..=59 => format!("{seconds} s"),
        60..=3599 => format!("{} min", seconds / 60),
        _ => format!("{} h {:02} min", seconds / 3600, (seconds % 3600) / 60),
    }
}
