pub mod audio;
mod cli;
pub mod config;
pub mod db;
pub mod models;
pub mod notifications;
pub mod playback;
pub mod settings;
pub mod stats;
pub mod store;
pub mod timer;
mod utils;

use std::{fs, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;

use audio::{ChimePlayer, CompletionSounds, SoundPlayer};
use config::AppConfig;
use notifications::{DesktopNotifier, NotificationService, Notifier};
use playback::{
    OsascriptRunner, PermissionGate, PlaybackMirror, ScriptExecutor, ScriptRunner, SpotifyClient,
};
use settings::SettingsStore;
use stats::StatisticsService;
use store::SessionStore;
use timer::FocusTimer;

const APP_NAME: &str = "Focusbar";

/// Every long-lived service, wired once at startup.
pub struct App {
    pub config: AppConfig,
    pub settings: Arc<SettingsStore>,
    pub store: SessionStore,
    pub stats: StatisticsService,
    pub sounds: CompletionSounds,
    pub timer: FocusTimer,
    pub playback: Arc<PlaybackMirror>,
}

impl App {
    /// Opens the settings file and session database under the configured data
    /// directory and wires the platform integrations.
    pub async fn bootstrap(config: AppConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Failed to create data directory {}", config.data_dir.display())
        })?;

        let settings = Arc::new(SettingsStore::new(config.settings_path())?);
        let store = SessionStore::initialize(config.db_path(), &settings).await?;
        if let Some(message) = store.status_message() {
            warn!("{message}");
        }

        Ok(Self::assemble(
            config,
            settings,
            store,
            Arc::new(ChimePlayer::new()),
            Arc::new(DesktopNotifier::new(APP_NAME)),
            Arc::new(OsascriptRunner),
        ))
    }

    pub fn assemble(
        config: AppConfig,
        settings: Arc<SettingsStore>,
        store: SessionStore,
        player: Arc<dyn SoundPlayer>,
        notifier: Arc<dyn Notifier>,
        runner: Arc<dyn ScriptRunner>,
    ) -> Self {
        let sounds = CompletionSounds::new(player, Arc::clone(&settings));
        let timer = FocusTimer::new(
            store.clone(),
            sounds.clone(),
            NotificationService::new(notifier),
        );

        let executor = Arc::new(ScriptExecutor::new(runner));
        let playback = PlaybackMirror::new(
            SpotifyClient::new(Arc::clone(&executor)),
            PermissionGate::new(executor),
            config.mirror(),
        );

        Self {
            stats: StatisticsService::new(store.clone(), config.week_start),
            config,
            settings,
            store,
            sounds,
            timer,
            playback,
        }
    }
}

pub fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = AppConfig::from_env()?;

    let level = if config.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async move {
        let app = App::bootstrap(config).await?;
        cli::execute(cli.command, &app).await
    })
}
