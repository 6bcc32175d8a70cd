use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    models::SessionRecord,
    notifications::format_duration,
    playback::{PermissionStatus, PlaybackError, PlaybackMirror, PlayerSnapshot},
    stats::SessionStatistics,
    timer::{TimerEvent, TimerMode},
    App,
};

#[derive(Parser)]
#[command(
    name = "focusbar",
    version = env!("CARGO_PKG_VERSION"),
    about = "Focus timer with session history, statistics and Spotify controls",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a focus session in the foreground; Ctrl-C ends it early
    Start {
        #[arg(long, short, default_value_t = 25, help = "Countdown length in minutes")]
        minutes: u64,

        #[arg(long, conflicts_with = "minutes", help = "Count up until stopped")]
        stopwatch: bool,

        #[arg(long, short, help = "Label recorded with the session")]
        label: Option<String>,
    },

    /// Show totals for all time, today and this week
    Stats {
        #[arg(long, help = "Print as JSON")]
        json: bool,
    },

    /// Inspect or edit the session history
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },

    /// Turn the completion chime on or off
    Sound {
        #[command(subcommand)]
        action: SoundCommand,
    },

    /// Control Spotify
    Spotify {
        #[command(subcommand)]
        action: SpotifyCommand,
    },
}

#[derive(Subcommand)]
pub enum SessionsCommand {
    List {
        #[arg(long)]
        label: Option<String>,

        #[arg(long, conflicts_with = "label", help = "Only sessions started today")]
        today: bool,
    },
    Delete {
        id: String,
    },
    Clear,
}

#[derive(Subcommand)]
pub enum SoundCommand {
    On,
    Off,
    Status,
}

#[derive(Subcommand)]
pub enum SpotifyCommand {
    /// Print what Spotify is playing
    Status {
        #[arg(long, help = "Keep printing changes until interrupted")]
        watch: bool,
    },
    Toggle,
    Next,
    Previous,
    /// Launch Spotify
    Open,
    /// Ask macOS for automation access, or open its settings pane
    Permission {
        #[arg(long)]
        settings: bool,
    },
}

pub async fn execute(command: Command, app: &App) -> Result<()> {
    match command {
        Command::Start {
            minutes,
            stopwatch,
            label,
        } => run_session(app, minutes, stopwatch, label).await,
        Command::Stats { json } => {
            let stats = app.stats.get_statistics().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", render_statistics(&stats));
            }
            Ok(())
        }
        Command::Sessions { action } => sessions(app, action).await,
        Command::Sound { action } => {
            match action {
                SoundCommand::On => app.sounds.set_enabled(true)?,
                SoundCommand::Off => app.sounds.set_enabled(false)?,
                SoundCommand::Status => {}
            }
            let state = if app.sounds.is_enabled() { "on" } else { "off" };
            println!("Completion sound is {state}");
            Ok(())
        }
        Command::Spotify { action } => spotify(app, action).await,
    }
}

async fn run_session(app: &App, minutes: u64, stopwatch: bool, label: Option<String>) -> Result<()> {
    let (mode, target) = if stopwatch {
        (TimerMode::Stopwatch, Duration::ZERO)
    } else {
        (TimerMode::Countdown, countdown_target(minutes)?)
    };

    let mut events = app.timer.subscribe();
    let started = app.timer.start(target, mode, label).await?;
    println!("Focusing on {} (Ctrl-C to finish)", started.state.label);

    let record = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break app.timer.stop().await?,
            event = events.recv() => match event {
                Ok(TimerEvent::SessionCompleted(record)) => break record,
                Ok(TimerEvent::Tick(snapshot)) if snapshot.remaining_ms % 60_000 < 1_000 => {
                    println!("{}", format_duration((snapshot.remaining_ms / 1000) as u64));
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => bail!("timer stopped unexpectedly"),
            },
        }
    };

    println!("Recorded {}", render_session(&record));
    Ok(())
}

/// The timer keeps its target in signed milliseconds.
fn countdown_target(minutes: u64) -> Result<Duration> {
    match minutes
        .checked_mul(60_000)
        .filter(|millis| *millis <= i64::MAX as u64)
    {
        Some(millis) => Ok(Duration::from_millis(millis)),
        None => bail!("{minutes} minutes is too long for a countdown"),
    }
}

async fn sessions(app: &App, action: SessionsCommand) -> Result<()> {
    match action {
        SessionsCommand::List { label, today } => {
            let records = match (label, today) {
                (Some(label), _) => app.store.fetch_by_label(&label).await,
                (None, true) => app.stats.sessions_today().await,
                (None, false) => app.store.fetch_all().await,
            };
            if records.is_empty() {
                println!("No sessions");
            }
            for record in &records {
                println!("{}", render_session(record));
            }
        }
        SessionsCommand::Delete { id } => {
            app.store.delete(&id).await;
            println!("{} sessions stored", app.store.count().await);
        }
        SessionsCommand::Clear => {
            app.store.delete_all().await;
            println!("Session history cleared");
        }
    }
    Ok(())
}

async fn spotify(app: &App, action: SpotifyCommand) -> Result<()> {
    let mirror = &app.playback;
    match action {
        SpotifyCommand::Status { watch: false } => {
            if mirror.check_permission().await.allows_polling() {
                // Failures are published on the snapshot.
                let _ = mirror.refresh().await;
            }
            println!("{}", render_mirror(mirror));
        }
        SpotifyCommand::Status { watch: true } => {
            let mut updates = mirror.subscribe();
            let permission = mirror.start_polling().await;
            if !permission.allows_polling() {
                println!("{}", render_mirror(mirror));
                return Ok(());
            }
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = updates.borrow_and_update().clone();
                        println!("{}", render_player(&snapshot, mirror.last_error().as_ref()));
                        if snapshot.permission == PermissionStatus::Denied {
                            break;
                        }
                    }
                }
            }
            mirror.stop_polling();
        }
        SpotifyCommand::Toggle => {
            mirror.refresh().await?;
            mirror.toggle_play_pause().await?;
            println!("{}", render_mirror(mirror));
        }
        SpotifyCommand::Next => {
            mirror.next_track().await?;
            println!("{}", render_mirror(mirror));
        }
        SpotifyCommand::Previous => {
            mirror.previous_track().await?;
            println!("{}", render_mirror(mirror));
        }
        SpotifyCommand::Open => mirror.launch().await?,
        SpotifyCommand::Permission { settings: true } => mirror.open_permission_settings().await?,
        SpotifyCommand::Permission { settings: false } => {
            let status = mirror.request_permission().await;
            println!("{}", render_permission(status));
        }
    }
    Ok(())
}

fn render_session(record: &SessionRecord) -> String {
    format!(
        "{}  {}  {:>10}  {}",
        record.id,
        record.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        format_duration(record.duration_seconds),
        record.label
    )
}

fn render_statistics(stats: &SessionStatistics) -> String {
    let mut out = format!(
        "All time:  {} sessions, {} (avg {})\nToday:     {} sessions, {}\nThis week: {} sessions, {}\n",
        stats.total_sessions,
        format_duration(stats.total_focus_seconds),
        format_duration(stats.average_session_seconds),
        stats.today_sessions,
        format_duration(stats.today_focus_seconds),
        stats.week_sessions,
        format_duration(stats.week_focus_seconds),
    );
    for label in &stats.labels {
        out.push_str(&format!(
            "  {:<20} {:>3} × {}\n",
            label.label,
            label.sessions,
            format_duration(label.focus_seconds)
        ));
    }
    out
}

fn render_permission(status: PermissionStatus) -> &'static str {
    match status {
        PermissionStatus::Authorized => "Spotify control is allowed",
        PermissionStatus::Denied => {
            "Spotify control is blocked; run `focusbar spotify permission --settings`"
        }
        PermissionStatus::NotDetermined => "Spotify control has not been granted yet",
        PermissionStatus::TargetNotRunning => "Spotify is not running",
    }
}

fn render_mirror(mirror: &PlaybackMirror) -> String {
    render_player(&mirror.snapshot(), mirror.last_error().as_ref())
}

fn render_player(snapshot: &PlayerSnapshot, last_error: Option<&PlaybackError>) -> String {
    let playback = &snapshot.playback;
    let line = match (&playback.track, playback.connected) {
        (_, false) => render_permission(snapshot.permission).to_string(),
        (None, true) => "Spotify is stopped".to_string(),
        (Some(track), true) => format!(
            "{} {} · {} [{}/{}]",
            if playback.is_playing { "▶" } else { "⏸" },
            track.name,
            track.artist,
            clock(playback.position_seconds),
            clock(playback.duration_seconds),
        ),
    };
    match last_error {
        Some(err) => format!("{line} ({err})"),
        None => line,
    }
}

fn clock(seconds: f64) -> String {
    let whole = seconds.max(0.0) as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}
