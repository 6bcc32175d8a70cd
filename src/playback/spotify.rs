//! Spotify control through AppleScript.

use std::sync::Arc;

use serde::Serialize;

use super::{error::PlaybackError, script::ScriptExecutor};

const FIELD_SEPARATOR: char = '\u{1f}';
const NOT_RUNNING_REPLY: &str = "not running";

/// Liveness and permission probe. Does not launch Spotify.
pub const RUNNING_SCRIPT: &str = r#"if application "Spotify" is running then
    tell application "Spotify" to get player state
else
    return "not running"
end if"#;

/// Touches Spotify directly so macOS shows the automation prompt.
pub const NAME_SCRIPT: &str = r#"tell application "Spotify" to get name"#;

pub const STATE_SCRIPT: &str = r#"if application "Spotify" is not running then return "not running"
tell application "Spotify"
    set sep to (ASCII character 31)
    set playerState to (player state as string)
    if playerState is "stopped" then return playerState
    set t to current track
    return playerState & sep & (name of t) & sep & (artist of t) & sep & (album of t) & sep & (player position as string) & sep & ((duration of t) as string)
end tell"#;

pub const PLAY_PAUSE_SCRIPT: &str = r#"tell application "Spotify" to playpause"#;
pub const NEXT_TRACK_SCRIPT: &str = r#"tell application "Spotify" to next track"#;
pub const PREVIOUS_TRACK_SCRIPT: &str = r#"tell application "Spotify" to previous track"#;

pub const LAUNCH_URL: &str = "spotify:";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub name: String,
    pub artist: String,
    pub album: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub connected: bool,
    pub is_playing: bool,
    pub track: Option<TrackInfo>,
    pub position_seconds: f64,
    pub duration_seconds: f64,
}

impl PlaybackState {
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Parses the reply of [`STATE_SCRIPT`].
    pub fn parse(reply: &str) -> Result<Self, PlaybackError> {
        let reply = reply.trim();
        match reply {
            NOT_RUNNING_REPLY => return Ok(Self::disconnected()),
            "stopped" => {
                return Ok(Self {
                    connected: true,
                    ..Self::default()
                })
            }
            _ => {}
        }

        let fields: Vec<&str> = reply.split(FIELD_SEPARATOR).collect();
        let [state, name, artist, album, position, duration] = fields.as_slice() else {
            return Err(PlaybackError::InvalidResponse(reply.to_string()));
        };

        let is_playing = match *state {
            "playing" => true,
            "paused" => false,
            other => return Err(PlaybackError::InvalidResponse(format!("player state {other}"))),
        };

        Ok(Self {
            connected: true,
            is_playing,
            track: Some(TrackInfo {
                name: name.to_string(),
                artist: artist.to_string(),
                album: album.to_string(),
            }),
            position_seconds: parse_number(position)?,
            // Spotify reports track duration in milliseconds.
            duration_seconds: parse_number(duration)? / 1000.0,
        })
    }
}

/// AppleScript formats reals with the user's locale, so `12,5` is possible.
fn parse_number(raw: &str) -> Result<f64, PlaybackError> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| PlaybackError::InvalidResponse(format!("not a number: {raw}")))
}

#[derive(Clone)]
pub struct SpotifyClient {
    executor: Arc<ScriptExecutor>,
}

impl SpotifyClient {
    pub fn new(executor: Arc<ScriptExecutor>) -> Self {
        Self { executor }
    }

    pub async fn fetch_playback_state(&self) -> Result<PlaybackState, PlaybackError> {
        let reply = self.executor.run(STATE_SCRIPT).await?;
        PlaybackState::parse(&reply)
    }

    pub async fn toggle_play_pause(&self) -> Result<(), PlaybackError> {
        self.executor.run(PLAY_PAUSE_SCRIPT).await.map(|_| ())
    }

    pub async fn next_track(&self) -> Result<(), PlaybackError> {
        self.executor.run(NEXT_TRACK_SCRIPT).await.map(|_| ())
    }

    pub async fn previous_track(&self) -> Result<(), PlaybackError> {
        self.executor.run(PREVIOUS_TRACK_SCRIPT).await.map(|_| ())
    }

    /// Opens Spotify through its URL scheme.
    pub async fn launch(&self) -> Result<(), PlaybackError> {
        self.executor
            .run(&open_location_script(LAUNCH_URL))
            .await
            .map(|_| ())
    }

    pub fn cancel_pending(&self) {
        self.executor.cancel_pending();
    }
}

pub(crate) fn open_location_script(url: &str) -> String {
    format!("open location \"{}\"", url.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::script::ScriptError;

    #[test]
    fn parses_a_playing_track() {
        let reply = ["playing", "Clair de Lune", "Debussy", "Suite bergamasque", "12,5", "300000"]
            .join("\u{1f}");
        let state = PlaybackState::parse(&reply).unwrap();
        assert!(state.connected && state.is_playing);
        assert_eq!(state.track.as_ref().unwrap().artist, "Debussy");
        assert_eq!(state.position_seconds, 12.5);
        assert_eq!(state.duration_seconds, 300.0);
    }

    #[test]
    fn not_running_and_stopped_are_not_errors() {
        assert_eq!(
            PlaybackState::parse("not running\n").unwrap(),
            PlaybackState::disconnected()
        );
        let stopped = PlaybackState::parse("stopped").unwrap();
        assert!(stopped.connected);
        assert!(!stopped.is_playing);
        assert!(stopped.track.is_none());
    }

    #[test]
    fn malformed_replies_are_rejected() {
        assert!(matches!(
            PlaybackState::parse("playing\u{1f}only two"),
            Err(PlaybackError::InvalidResponse(_))
        ));
        let bad_state = ["buffering", "a", "b", "c", "1", "2"].join("\u{1f}");
        assert!(PlaybackState::parse(&bad_state).is_err());
    }

    #[test]
    fn open_location_escapes_quotes() {
        assert_eq!(open_location_script("spotify:"), "open location \"spotify:\"");
        assert_eq!(open_location_script("a\"b"), "open location \"a\\\"b\"");
    }

    #[tokio::test]
    async fn commands_send_the_fixed_scripts() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let log = Arc::clone(&seen);
        let executor = Arc::new(ScriptExecutor::new(Arc::new(
            move |source: &str| -> Result<String, ScriptError> {
                log.lock().unwrap().push(source.to_string());
                Ok(String::new())
            },
        )));
        let client = SpotifyClient::new(executor);

        client.toggle_play_pause().await.unwrap();
        client.next_track().await.unwrap();
        client.previous_track().await.unwrap();
        client.launch().await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                PLAY_PAUSE_SCRIPT.to_string(),
                NEXT_TRACK_SCRIPT.to_string(),
                PREVIOUS_TRACK_SCRIPT.to_string(),
                "open location \"spotify:\"".to_string(),
            ]
        );
    }
}
