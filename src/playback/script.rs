//! AppleScript execution boundary.

use std::{
    panic::{self, AssertUnwindSafe},
    process::Command,
    sync::{Arc, Mutex, PoisonError},
};

use thiserror::Error;
use tokio_util::{sync::CancellationToken, task::AbortOnDropHandle};

use super::{error::PlaybackError, resume::ResumeOnce};

/// AppleEvent error numbers the playback layer reacts to.
pub mod codes {
    /// `errAEEventNotPermitted`: the user has not allowed automation.
    pub const NOT_AUTHORIZED: i32 = -1743;
    /// `procNotFound`: the target application is not running.
    pub const APP_NOT_RUNNING: i32 = -600;
    pub const CANT_GET: i32 = -1728;
    pub const NOT_UNDERSTOOD: i32 = -1708;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    pub code: Option<i32>,
    pub message: String,
}

impl ScriptError {
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Reads the `(-1743)` style error number that `osascript` appends to its message.
    pub fn from_stderr(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let code = message
            .rsplit_once('(')
            .and_then(|(_, tail)| tail.strip_suffix(')'))
            .and_then(|number| number.trim().parse::<i32>().ok());
        Self { code, message }
    }
}

/// Runs one AppleScript source and returns its textual result.
pub trait ScriptRunner: Send + Sync + 'static {
    fn run(&self, source: &str) -> Result<String, ScriptError>;
}

impl<F> ScriptRunner for F
where
    F: Fn(&str) -> Result<String, ScriptError> + Send + Sync + 'static,
{
    fn run(&self, source: &str) -> Result<String, ScriptError> {
        self(source)
    }
}

pub struct OsascriptRunner;

impl ScriptRunner for OsascriptRunner {
    fn run(&self, source: &str) -> Result<String, ScriptError> {
        let output = Command::new("osascript")
            .arg("-e")
            .arg(source)
            .output()
            .map_err(|err| ScriptError::new(None, format!("failed to launch osascript: {err}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        } else {
            Err(ScriptError::from_stderr(&String::from_utf8_lossy(
                &output.stderr,
            )))
        }
    }
}

/// Runs scripts on the blocking pool and lets callers abandon them.
pub struct ScriptExecutor {
    runner: Arc<dyn ScriptRunner>,
    pending: Mutex<CancellationToken>,
}

impl ScriptExecutor {
    pub fn new(runner: Arc<dyn ScriptRunner>) -> Self {
        Self {
            runner,
            pending: Mutex::new(CancellationToken::new()),
        }
    }

    pub async fn run(&self, source: &str) -> Result<String, PlaybackError> {
        let token = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token();
        run_cancellable(Arc::clone(&self.runner), source.to_string(), token).await
    }

    /// Resolves every in-flight call with [`PlaybackError::Cancelled`].
    pub fn cancel_pending(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.cancel();
        *pending = CancellationToken::new();
    }
}

/// Executes `source` off the async runtime. Whichever of completion or `cancel`
/// happens first decides the result; the other is dropped.
pub async fn run_cancellable(
    runner: Arc<dyn ScriptRunner>,
    source: String,
    cancel: CancellationToken,
) -> Result<String, PlaybackError> {
    let (resume, outcome) = ResumeOnce::channel();

    let worker = Arc::clone(&resume);
    tokio::task::spawn_blocking(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| runner.run(&source)))
            .unwrap_or_else(|_| Err(ScriptError::new(None, "script runner panicked")));
        worker.resume(result.map_err(PlaybackError::from));
    });

    // Aborted when this future completes or is dropped by its caller.
    let canceller = Arc::clone(&resume);
    let _watcher = AbortOnDropHandle::new(tokio::spawn(async move {
        cancel.cancelled().await;
        canceller.resume(Err(PlaybackError::Cancelled));
    }));
    drop(resume);

    outcome.await.unwrap_or_else(|_| {
        Err(PlaybackError::ConnectionFailed(
            "script worker exited without a result".to_string(),
        ))
    })
}
