//! Local mirror of Spotify's player state.
//!
//! One [`PlayerSnapshot`] is published through a `watch` channel and the most
//! recent failure through a second one, so a reverted snapshot is exactly the one
//! that was published before. Every change happens while holding `ops`, so
//! polling, optimistic toggles and their reverts never interleave. The scripts
//! themselves run on the blocking pool.

use std::{
    sync::{Arc, Mutex as StdMutex, PoisonError, Weak},
    time::Duration,
};

use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{log_info, log_warn};

use super::{
    error::PlaybackError,
    permission::{PermissionGate, PermissionStatus},
    spotify::{PlaybackState, SpotifyClient},
};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub permission: PermissionStatus,
    pub playback: PlaybackState,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            permission: PermissionStatus::NotDetermined,
            playback: PlaybackState::disconnected(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MirrorConfig {
    pub poll_interval: Duration,
    /// Pause after a track change before asking Spotify what it is playing.
    pub settle_delay: Duration,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            settle_delay: Duration::from_millis(500),
        }
    }
}

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PlaybackMirror {
    client: SpotifyClient,
    gate: PermissionGate,
    config: MirrorConfig,
    state_tx: watch::Sender<PlayerSnapshot>,
    error_tx: watch::Sender<Option<PlaybackError>>,
    ops: Mutex<()>,
    poller: StdMutex<Option<Poller>>,
}

impl PlaybackMirror {
    pub fn new(client: SpotifyClient, gate: PermissionGate, config: MirrorConfig) -> Arc<Self> {
        let (state_tx, _) = watch::channel(PlayerSnapshot::default());
        let (error_tx, _) = watch::channel(None);
        Arc::new(Self {
            client,
            gate,
            config,
            state_tx,
            error_tx,
            ops: Mutex::new(()),
            poller: StdMutex::new(None),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.state_tx.borrow().clone()
    }

    /// Failure of the latest round trip; cleared by the next successful refresh.
    pub fn last_error(&self) -> Option<PlaybackError> {
        self.error_tx.borrow().clone()
    }

    pub fn subscribe_errors(&self) -> watch::Receiver<Option<PlaybackError>> {
        self.error_tx.subscribe()
    }

    /// Checks the permission gate and starts the poll loop when it makes sense.
    pub async fn start_polling(self: &Arc<Self>) -> PermissionStatus {
        let status = self.check_permission().await;
        if !status.allows_polling() {
            self.stop_polling();
            log_info!("[mirror] not polling, permission is {:?}", status);
            return status;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            Arc::downgrade(self),
            self.config.poll_interval,
            cancel.clone(),
        ));
        // Swap under one lock so a concurrent start never orphans a running loop.
        let replaced = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Poller { cancel, handle });
        if let Some(old) = replaced {
            old.cancel.cancel();
        }
        status
    }

    pub async fn check_permission(&self) -> PermissionStatus {
        let status = self.gate.check().await;
        let _guard = self.ops.lock().await;
        self.state_tx.send_modify(|snapshot| snapshot.permission = status);
        status
    }

    pub fn stop_polling(&self) {
        let poller = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(poller) = poller {
            poller.cancel.cancel();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|poller| !poller.handle.is_finished())
    }

    pub async fn refresh(&self) -> Result<PlaybackState, PlaybackError> {
        let _guard = self.ops.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<PlaybackState, PlaybackError> {
        match self.client.fetch_playback_state().await {
            Ok(playback) => {
                let permission = if playback.connected {
                    PermissionStatus::Authorized
                } else {
                    PermissionStatus::TargetNotRunning
                };
                self.state_tx.send_replace(PlayerSnapshot {
                    permission,
                    playback: playback.clone(),
                });
                self.error_tx.send_replace(None);
                Ok(playback)
            }
            Err(PlaybackError::Cancelled) => Err(PlaybackError::Cancelled),
            Err(err) => {
                self.state_tx.send_modify(|snapshot| {
                    match &err {
                        PlaybackError::PermissionDenied { .. } => {
                            snapshot.permission = PermissionStatus::Denied
                        }
                        PlaybackError::NotRunning { .. } => {
                            snapshot.permission = PermissionStatus::TargetNotRunning
                        }
                        _ => {}
                    }
                    snapshot.playback = PlaybackState::disconnected();
                });
                self.error_tx.send_replace(Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Flips `is_playing` right away and republishes the untouched previous
    /// snapshot if Spotify rejects the command.
    pub async fn toggle_play_pause(&self) -> Result<(), PlaybackError> {
        let _guard = self.ops.lock().await;
        let previous = self.snapshot();
        self.state_tx.send_modify(|snapshot| {
            snapshot.playback.is_playing = !previous.playback.is_playing;
        });

        match self.client.toggle_play_pause().await {
            Ok(()) => Ok(()),
            Err(err) => {
                log_warn!("[mirror] play/pause failed, reverting: {}", err);
                self.state_tx.send_replace(previous);
                self.record_failure(Err(err))
            }
        }
    }

    pub async fn next_track(&self) -> Result<PlaybackState, PlaybackError> {
        let _guard = self.ops.lock().await;
        self.record_failure(self.client.next_track().await)?;
        tokio::time::sleep(self.config.settle_delay).await;
        self.refresh_locked().await
    }

    pub async fn previous_track(&self) -> Result<PlaybackState, PlaybackError> {
        let _guard = self.ops.lock().await;
        self.record_failure(self.client.previous_track().await)?;
        tokio::time::sleep(self.config.settle_delay).await;
        self.refresh_locked().await
    }

    pub async fn launch(&self) -> Result<(), PlaybackError> {
        let result = self.client.launch().await;
        let _guard = self.ops.lock().await;
        self.record_failure(result)
    }

    pub async fn request_permission(&self) -> PermissionStatus {
        let status = self.gate.request().await;
        let _guard = self.ops.lock().await;
        self.state_tx.send_modify(|snapshot| snapshot.permission = status);
        status
    }

    pub async fn open_permission_settings(&self) -> Result<(), PlaybackError> {
        self.gate.open_settings().await
    }

    /// Must be called with `ops` held.
    fn record_failure<T>(&self, result: Result<T, PlaybackError>) -> Result<T, PlaybackError> {
        if let Err(err) = &result {
            if *err != PlaybackError::Cancelled {
                self.error_tx.send_replace(Some(err.clone()));
            }
        }
        result
    }
}

impl Drop for PlaybackMirror {
    fn drop(&mut self) {
        self.stop_polling();
        self.client.cancel_pending();
    }
}

async fn poll_loop(mirror: Weak<PlaybackMirror>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(mirror) = mirror.upgrade() else {
            break;
        };
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = mirror.refresh() => result,
        };

        if let Err(err) = result {
            if err.is_permission_denied() {
                log_warn!("[mirror] automation permission revoked, polling stopped");
                break;
            }
        }
    }
}
