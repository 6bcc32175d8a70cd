use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{SessionRecord, UNLABELED};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    #[default]
    Countdown,
    Stopwatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub mode: TimerMode,
    pub label: String,
    pub target_ms: u64,
    pub active_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    /// Active time banked by earlier running stretches. The current stretch is
    /// measured from `running_anchor`.
    #[serde(skip)]
    active_ms_baseline: u64,
    #[serde(skip)]
    running_anchor: Option<Instant>,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            status: TimerStatus::Idle,
            mode: TimerMode::Countdown,
            label: UNLABELED.to_string(),
            target_ms: 0,
            active_ms: 0,
            started_at: None,
            active_ms_baseline: 0,
            running_anchor: None,
        }
    }
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.status != TimerStatus::Idle
    }

    pub fn begin(
        &mut self,
        mode: TimerMode,
        target: Duration,
        label: String,
        started_at: DateTime<Utc>,
        now: Instant,
    ) {
        *self = Self {
            status: TimerStatus::Running,
            mode,
            label,
            target_ms: match mode {
                TimerMode::Countdown => target.as_millis() as u64,
                TimerMode::Stopwatch => 0,
            },
            active_ms: 0,
            started_at: Some(started_at),
            active_ms_baseline: 0,
            running_anchor: Some(now),
        };
    }

    pub fn active_ms_at(&self, now: Instant) -> u64 {
        match (self.status, self.running_anchor) {
            (TimerStatus::Running, Some(anchor)) => self
                .active_ms_baseline
                .saturating_add(now.saturating_duration_since(anchor).as_millis() as u64),
            _ => self.active_ms,
        }
    }

    /// Countdown: time left, never negative. Stopwatch: time elapsed.
    pub fn remaining_ms_at(&self, now: Instant) -> i64 {
        match (self.status, self.mode) {
            (TimerStatus::Idle, _) => 0,
            (_, TimerMode::Countdown) => {
                (self.target_ms as i64 - self.active_ms_at(now) as i64).max(0)
            }
            (_, TimerMode::Stopwatch) => self.active_ms_at(now) as i64,
        }
    }

    pub fn sync(&mut self, now: Instant) {
        self.active_ms = self.active_ms_at(now);
    }

    pub fn pause(&mut self, now: Instant) -> bool {
        if self.status != TimerStatus::Running {
            return false;
        }
        self.sync(now);
        self.active_ms_baseline = self.active_ms;
        self.running_anchor = None;
        self.status = TimerStatus::Paused;
        true
    }

    pub fn resume(&mut self, now: Instant) -> bool {
        if self.status != TimerStatus::Paused {
            return false;
        }
        self.running_anchor = Some(now);
        self.status = TimerStatus::Running;
        true
    }

    /// Closes the session into a record and returns to idle. `None` when idle.
    pub fn finish(&mut self, ended_at: DateTime<Utc>, now: Instant) -> Option<SessionRecord> {
        if !self.is_active() {
            return None;
        }
        self.sync(now);
        let mut active_ms = self.active_ms;
        if self.mode == TimerMode::Countdown {
            active_ms = active_ms.min(self.target_ms);
        }
        let started_at = self.started_at.unwrap_or(ended_at);
        let record = SessionRecord::new(
            started_at,
            ended_at,
            active_ms / 1000,
            std::mem::take(&mut self.label),
        );
        self.reset();
        Some(record)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
