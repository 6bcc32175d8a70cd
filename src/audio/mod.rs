pub mod chime;

use std::sync::{mpsc::Sender, Arc, Mutex, PoisonError};

use anyhow::Result;

use crate::settings::SettingsStore;

pub use chime::CompletionChime;

const ENABLE_LOGS: bool = true;

#[allow(unused_imports)]
use crate::{log_debug, log_warn};

/// Something that can make the completion sound.
pub trait SoundPlayer: Send + Sync {
    fn play_completion(&self);
}

enum AudioCommand {
    PlayChime,
}

/// Plays the chime on a dedicated audio thread that owns the output stream.
pub struct ChimePlayer {
    tx: Mutex<Option<Sender<AudioCommand>>>,
}

impl ChimePlayer {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    fn send(&self, command: AudioCommand) {
        let mut guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            match spawn_audio_thread() {
                Ok(tx) => *guard = Some(tx),
                Err(err) => {
                    log_warn!("Audio thread unavailable: {err:#}");
                    return;
                }
            }
        }

        let delivered = guard
            .as_ref()
            .map(|tx| tx.send(command).is_ok())
            .unwrap_or(false);
        if !delivered {
            // Thread died; the next call starts a fresh one.
            *guard = None;
        }
    }
}

impl Default for ChimePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundPlayer for ChimePlayer {
    fn play_completion(&self) {
        self.send(AudioCommand::PlayChime);
    }
}

#[cfg(target_os = "macos")]
fn spawn_audio_thread() -> Result<Sender<AudioCommand>> {
    use rodio::{OutputStream, Sink};
    use std::{sync::mpsc, thread};

    let (tx, rx) = mpsc::channel::<AudioCommand>();

    thread::Builder::new()
        .name("focusbar-audio".to_string())
        .spawn(move || {
            let (_stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(err) => {
                    log_warn!("Failed to open audio output: {err}");
                    return;
                }
            };
            while let Ok(AudioCommand::PlayChime) = rx.recv() {
                match Sink::try_new(&handle) {
                    Ok(sink) => {
                        sink.append(CompletionChime::new());
                        sink.detach();
                    }
                    Err(err) => log_warn!("Failed to create audio sink: {err}"),
                }
            }
        })?;

    Ok(tx)
}

#[cfg(not(target_os = "macos"))]
fn spawn_audio_thread() -> Result<Sender<AudioCommand>> {
    use std::{sync::mpsc, thread};

    let (tx, rx) = mpsc::channel::<AudioCommand>();
    thread::Builder::new()
        .name("focusbar-audio".to_string())
        .spawn(move || {
            while let Ok(AudioCommand::PlayChime) = rx.recv() {
                log_debug!("Completion chime skipped: no audio backend on this platform");
            }
        })?;
    Ok(tx)
}

/// Completion sound gated by the persisted `soundEnabled` preference.
#[derive(Clone)]
pub struct CompletionSounds {
    player: Arc<dyn SoundPlayer>,
    settings: Arc<SettingsStore>,
}

impl CompletionSounds {
    pub fn new(player: Arc<dyn SoundPlayer>, settings: Arc<SettingsStore>) -> Self {
        Self { player, settings }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.sound_enabled()
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.settings.set_sound_enabled(enabled)
    }

    /// Returns whether the sound was played.
    pub fn play_if_enabled(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.player.play_completion();
        true
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CountingPlayer;
    use super::*;

    #[test]
    fn preference_gates_playback() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")).unwrap());
        let player = Arc::new(CountingPlayer::default());
        let sounds = CompletionSounds::new(player.clone(), settings.clone());

        assert!(sounds.is_enabled());
        assert!(sounds.play_if_enabled());

        sounds.set_enabled(false).unwrap();
        assert!(!sounds.play_if_enabled());
        assert_eq!(player.plays(), 1);
        assert!(!settings.sound_enabled());
    }
}
