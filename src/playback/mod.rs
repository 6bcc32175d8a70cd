pub mod error;
pub mod mirror;
pub mod permission;
mod resume;
pub mod script;
pub mod spotify;

pub use error::PlaybackError;
pub use mirror::{MirrorConfig, PlaybackMirror, PlayerSnapshot};
pub use permission::{PermissionGate, PermissionStatus};
pub use script::{OsascriptRunner, ScriptError, ScriptExecutor, ScriptRunner};
pub use spotify::{PlaybackState, SpotifyClient, TrackInfo};
