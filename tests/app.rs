use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use focusbar_lib::{
    audio::SoundPlayer,
    config::AppConfig,
    notifications::Notifier,
    playback::{PermissionStatus, ScriptError},
    settings::SettingsStore,
    store::SessionStore,
    timer::{TimerEvent, TimerMode},
    App,
};
use tempfile::TempDir;

#[derive(Default)]
struct Chimes(AtomicUsize);

impl SoundPlayer for Chimes {
    fn play_completion(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Inbox(Mutex<Vec<String>>);

impl Notifier for Inbox {
    fn notify(&self, title: &str, body: &str) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(format!("{title}: {body}"));
        Ok(())
    }
}

fn app(dir: &TempDir, chimes: Arc<Chimes>, inbox: Arc<Inbox>) -> App {
    let config = AppConfig::with_data_dir(dir.path());
    let settings = Arc::new(SettingsStore::new(config.settings_path()).unwrap());
    App::assemble(
        config,
        settings,
        SessionStore::in_memory().unwrap(),
        chimes,
        inbox,
        Arc::new(|_: &str| -> Result<String, ScriptError> { Ok("not running".to_string()) }),
    )
}

#[tokio::test]
async fn bootstrap_creates_the_data_directory() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::with_data_dir(dir.path().join("nested").join("focusbar"));

    let app = App::bootstrap(config.clone()).await.unwrap();
    assert!(app.store.is_durable());
    assert!(config.db_path().exists());
    assert!(app.sounds.is_enabled());
}

#[tokio::test]
async fn completed_countdown_shows_up_in_statistics() {
    let dir = TempDir::new().unwrap();
    let chimes = Arc::new(Chimes::default());
    let inbox = Arc::new(Inbox::default());
    let app = app(&dir, chimes.clone(), inbox.clone());

    let timer = app.timer.clone().with_tick_interval(Duration::from_millis(10));
    let mut events = timer.subscribe();
    timer
        .start(Duration::from_millis(20), TimerMode::Countdown, Some("Deep Work".into()))
        .await
        .unwrap();

    let record = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(TimerEvent::SessionCompleted(record)) = events.recv().await {
                break record;
            }
        }
    })
    .await
    .unwrap();

    let stats = app.stats.get_statistics().await;
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.labels[0].label, "Deep Work");
    assert_eq!(app.store.fetch_all().await, vec![record]);
    assert_eq!(chimes.0.load(Ordering::SeqCst), 1);
    assert_eq!(
        inbox.0.lock().unwrap().as_slice(),
        ["Focus session complete: 0 s of Deep Work".to_string()]
    );
}

#[tokio::test]
async fn muted_sound_skips_the_chime() {
    let dir = TempDir::new().unwrap();
    let chimes = Arc::new(Chimes::default());
    let app = app(&dir, chimes.clone(), Arc::new(Inbox::default()));

    app.sounds.set_enabled(false).unwrap();
    assert!(!app.settings.sound_enabled());
    assert!(!app.sounds.play_if_enabled());
    assert_eq!(chimes.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn closed_spotify_is_reported_as_not_running() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, Arc::new(Chimes::default()), Arc::new(Inbox::default()));

    assert_eq!(
        app.playback.check_permission().await,
        PermissionStatus::TargetNotRunning
    );
    let state = app.playback.refresh().await.unwrap();
    assert!(!state.connected);
}
