use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time,
};

use crate::{
    audio::CompletionSounds,
    log_info,
    models::{normalize_label, SessionRecord},
    notifications::NotificationService,
    store::SessionStore,
};

use super::{TimerMode, TimerState, TimerStatus};

const ENABLE_LOGS: bool = true;
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub remaining_ms: i64,
}

impl TimerSnapshot {
    fn capture(state: &mut TimerState) -> Self {
        let now = Instant::now();
        state.sync(now);
        Self {
            remaining_ms: state.remaining_ms_at(now),
            state: state.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TimerEvent {
    StateChanged(TimerSnapshot),
    Tick(TimerSnapshot),
    SessionCompleted(SessionRecord),
}

/// Runs one focus session at a time and records it when it ends.
#[derive(Clone)]
pub struct FocusTimer {
    state: Arc<Mutex<TimerState>>,
    store: SessionStore,
    sounds: CompletionSounds,
    notifications: NotificationService,
    events: broadcast::Sender<TimerEvent>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
}

impl FocusTimer {
    pub fn new(
        store: SessionStore,
        sounds: CompletionSounds,
        notifications: NotificationService,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(TimerState::new())),
            store,
            sounds,
            notifications,
            events,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::capture(&mut *self.state.lock().await)
    }

    pub async fn start(
        &self,
        target: Duration,
        mode: TimerMode,
        label: Option<String>,
    ) -> Result<TimerSnapshot> {
        if mode == TimerMode::Countdown && target.is_zero() {
            bail!("countdown target must be greater than zero");
        }

        let snapshot = {
            let mut state = self.state.lock().await;
            if state.is_active() {
                bail!("timer already active");
            }
            state.begin(
                mode,
                target,
                normalize_label(label.unwrap_or_default()),
                Utc::now(),
                Instant::now(),
            );
            TimerSnapshot::capture(&mut state)
        };

        self.spawn_ticker().await;
        log_info!("[timer] started {:?} for {:?}", mode, snapshot.state.label);
        self.emit(TimerEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// Ends the session early and records the time spent so far.
    pub async fn stop(&self) -> Result<SessionRecord> {
        let (record, snapshot) = self
            .close_session()
            .await
            .ok_or_else(|| anyhow!("no active session to stop"))?;
        self.cancel_ticker().await;
        self.record_session(&record, snapshot, false).await;
        Ok(record)
    }

    /// Drops the running session without recording it.
    pub async fn cancel(&self) -> Result<()> {
        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.is_active() {
                return Ok(());
            }
            state.reset();
            TimerSnapshot::capture(&mut state)
        };
        self.cancel_ticker().await;
        self.emit(TimerEvent::StateChanged(snapshot));
        Ok(())
    }

    pub async fn pause(&self) -> Result<TimerSnapshot> {
        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.pause(Instant::now()) {
                bail!("timer is not running");
            }
            TimerSnapshot::capture(&mut state)
        };
        self.emit(TimerEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn resume(&self) -> Result<TimerSnapshot> {
        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.resume(Instant::now()) {
                bail!("timer is not paused");
            }
            TimerSnapshot::capture(&mut state)
        };
        self.emit(TimerEvent::StateChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// Moves the running session out of the state. `None` when idle.
    async fn close_session(&self) -> Option<(SessionRecord, TimerSnapshot)> {
        let mut state = self.state.lock().await;
        let record = state.finish(Utc::now(), Instant::now())?;
        Some((record, TimerSnapshot::capture(&mut state)))
    }

    /// Persists a closed session and announces it. `completed` is set when a
    /// countdown ran out, which also rings the chime and posts a notification.
    async fn record_session(&self, record: &SessionRecord, snapshot: TimerSnapshot, completed: bool) {
        self.store.save(record).await;
        log_info!(
            "[timer] recorded {} s of {:?}",
            record.duration_seconds,
            record.label
        );

        if completed {
            self.sounds.play_if_enabled();
            self.notifications.session_completed(record).await;
        }

        self.emit(TimerEvent::StateChanged(snapshot));
        self.emit(TimerEvent::SessionCompleted(record.clone()));
    }

    async fn spawn_ticker(&self) {
        let mut ticker = self.ticker.lock().await;
        if let Some(handle) = ticker.take() {
            handle.abort();
        }

        let timer = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(timer.tick_interval);
            interval.tick().await;
            loop {
                interval.tick().await;

                let snapshot = {
                    let mut state = timer.state.lock().await;
                    match state.status {
                        TimerStatus::Idle => break,
                        TimerStatus::Paused => continue,
                        TimerStatus::Running => TimerSnapshot::capture(&mut state),
                    }
                };

                if snapshot.state.mode == TimerMode::Countdown && snapshot.remaining_ms <= 0 {
                    if let Some((record, snapshot)) = timer.close_session().await {
                        // The next start() aborts this ticker; the effects must outlive it.
                        tokio::spawn(async move {
                            timer.record_session(&record, snapshot, true).await;
                        });
                    }
                    break;
                }

                timer.emit(TimerEvent::Tick(snapshot));
            }
        });

        *ticker = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    fn emit(&self, event: TimerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::testing::CountingPlayer, notifications::testing::RecordingNotifier,
        settings::SettingsStore,
    };
    use std::sync::{mpsc, Mutex as StdMutex};
    use tempfile::TempDir;

    struct Fixture {
        timer: FocusTimer,
        store: SessionStore,
        player: Arc<CountingPlayer>,
        notifier: Arc<RecordingNotifier>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")).unwrap());
        let store = SessionStore::in_memory().unwrap();
        let player = Arc::new(CountingPlayer::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let timer = FocusTimer::new(
            store.clone(),
            CompletionSounds::new(player.clone(), settings),
            NotificationService::new(notifier.clone()),
        )
        .with_tick_interval(Duration::from_millis(10));
        Fixture {
            timer,
            store,
            player,
            notifier,
            _dir: dir,
        }
    }

    async fn next_completion(events: &mut broadcast::Receiver<TimerEvent>) -> SessionRecord {
        let wait = async {
            loop {
                if let Ok(TimerEvent::SessionCompleted(record)) = events.recv().await {
                    return record;
                }
            }
        };
        time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("countdown did not complete")
    }

    #[tokio::test]
    async fn countdown_completes_with_chime_and_notification() {
        let fx = fixture();
        let mut events = fx.timer.subscribe();

        fx.timer
            .start(
                Duration::from_millis(30),
                TimerMode::Countdown,
                Some("Reading".into()),
            )
            .await
            .unwrap();

        let record = next_completion(&mut events).await;
        assert_eq!(record.label, "Reading");
        assert_eq!(fx.store.count().await, 1);
        assert_eq!(fx.player.plays(), 1);
        assert_eq!(fx.notifier.sent().len(), 1);
        assert_eq!(fx.timer.snapshot().await.state.status, TimerStatus::Idle);
    }

    #[tokio::test]
    async fn manual_stop_records_without_chime() {
        let fx = fixture();
        fx.timer
            .start(Duration::ZERO, TimerMode::Stopwatch, None)
            .await
            .unwrap();

        let record = fx.timer.stop().await.unwrap();
        assert_eq!(record.label, crate::models::UNLABELED);
        assert_eq!(fx.store.fetch_all().await, vec![record]);
        assert_eq!(fx.player.plays(), 0);
        assert!(fx.notifier.sent().is_empty());
        assert!(fx.timer.stop().await.is_err());
    }

    #[tokio::test]
    async fn start_rejects_zero_countdown_and_double_start() {
        let fx = fixture();
        assert!(fx
            .timer
            .start(Duration::ZERO, TimerMode::Countdown, None)
            .await
            .is_err());

        fx.timer
            .start(Duration::from_secs(60), TimerMode::Countdown, None)
            .await
            .unwrap();
        assert!(fx
            .timer
            .start(Duration::from_secs(60), TimerMode::Countdown, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn cancel_discards_the_session() {
        let fx = fixture();
        fx.timer
            .start(Duration::from_secs(60), TimerMode::Countdown, None)
            .await
            .unwrap();
        fx.timer.cancel().await.unwrap();

        assert_eq!(fx.store.count().await, 0);
        assert_eq!(fx.timer.snapshot().await.state.status, TimerStatus::Idle);
        fx.timer.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_status() {
        let fx = fixture();
        fx.timer
            .start(Duration::from_secs(60), TimerMode::Countdown, None)
            .await
            .unwrap();

        let paused = fx.timer.pause().await.unwrap();
        assert_eq!(paused.state.status, TimerStatus::Paused);
        assert!(fx.timer.pause().await.is_err());

        let resumed = fx.timer.resume().await.unwrap();
        assert_eq!(resumed.state.status, TimerStatus::Running);
    }

    /// Holds each notification until the test releases it.
    struct GatedNotifier {
        posted: StdMutex<mpsc::Sender<()>>,
        release: StdMutex<mpsc::Receiver<()>>,
    }

    impl crate::notifications::Notifier for GatedNotifier {
        fn notify(&self, _title: &str, _body: &str) -> Result<()> {
            self.posted.lock().unwrap().send(())?;
            self.release.lock().unwrap().recv()?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn restarting_during_completion_keeps_the_completion_event() {
        let dir = TempDir::new().unwrap();
        let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")).unwrap());
        let (posted_tx, posted_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let notifier = Arc::new(GatedNotifier {
            posted: StdMutex::new(posted_tx),
            release: StdMutex::new(release_rx),
        });
        let store = SessionStore::in_memory().unwrap();
        let timer = FocusTimer::new(
            store.clone(),
            CompletionSounds::new(Arc::new(CountingPlayer::default()), settings),
            NotificationService::new(notifier),
        )
        .with_tick_interval(Duration::from_millis(10));
        let mut events = timer.subscribe();

        timer
            .start(Duration::from_millis(20), TimerMode::Countdown, Some("First".into()))
            .await
            .unwrap();
        tokio::task::spawn_blocking(move || posted_rx.recv().unwrap())
            .await
            .unwrap();

        // The first session is closed but its effects are still running.
        timer
            .start(Duration::from_secs(60), TimerMode::Countdown, Some("Second".into()))
            .await
            .unwrap();
        release_tx.send(()).unwrap();

        let record = next_completion(&mut events).await;
        assert_eq!(record.label, "First");
        assert_eq!(store.count().await, 1);
        timer.cancel().await.unwrap();
    }
}
