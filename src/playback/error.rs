use thiserror::Error;

use super::script::{codes, ScriptError};

/// Failures surfaced to the playback view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("not allowed to control Spotify (automation error {code})")]
    PermissionDenied { code: i32 },
    #[error("Spotify is not running")]
    NotRunning { code: i32 },
    #[error("AppleScript failed: {message}")]
    ScriptFailed { code: Option<i32>, message: String },
    #[error("could not reach Spotify: {0}")]
    ConnectionFailed(String),
    #[error("unexpected reply from Spotify: {0}")]
    InvalidResponse(String),
    #[error("cancelled")]
    Cancelled,
}

impl PlaybackError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, PlaybackError::PermissionDenied { .. })
    }
}

impl From<ScriptError> for PlaybackError {
    fn from(err: ScriptError) -> Self {
        match err.code {
            Some(code @ codes::NOT_AUTHORIZED) => PlaybackError::PermissionDenied { code },
            Some(code @ codes::APP_NOT_RUNNING) => PlaybackError::NotRunning { code },
            code => PlaybackError::ScriptFailed {
                code,
                message: err.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_uses_the_numeric_code() {
        let denied = ScriptError::new(Some(-1743), "anything");
        assert_eq!(
            PlaybackError::from(denied),
            PlaybackError::PermissionDenied { code: -1743 }
        );

        // Text alone never decides the kind.
        let wording = ScriptError::new(Some(-1728), "Not authorized to send Apple events");
        assert!(!PlaybackError::from(wording).is_permission_denied());

        let missing = ScriptError::new(Some(-600), "Application isn't running.");
        assert_eq!(
            PlaybackError::from(missing),
            PlaybackError::NotRunning { code: -600 }
        );
    }
}
