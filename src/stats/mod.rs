//! Session statistics, computed fresh from the stored history on every query.

mod window;

pub use window::CalendarWindow;

use std::collections::BTreeMap;

use chrono::{DateTime, Local, TimeZone, Weekday};
use serde::Serialize;

use crate::{models::SessionRecord, store::SessionStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelTotal {
    pub label: String,
    pub sessions: u64,
    pub focus_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatistics {
    pub total_sessions: u64,
    pub total_focus_seconds: u64,
    pub average_session_seconds: u64,
    pub today_sessions: u64,
    pub today_focus_seconds: u64,
    pub week_sessions: u64,
    pub week_focus_seconds: u64,
    /// Busiest label first.
    pub labels: Vec<LabelTotal>,
}

/// Aggregates `records` relative to `now`; day and week boundaries follow the time
/// zone of `now`.
pub fn compute<Tz: TimeZone>(
    records: &[SessionRecord],
    now: &DateTime<Tz>,
    week_start: Weekday,
) -> SessionStatistics {
    let today = CalendarWindow::day_of(now);
    let week = CalendarWindow::week_of(now, week_start);

    let mut stats = SessionStatistics::default();
    let mut labels: BTreeMap<&str, LabelTotal> = BTreeMap::new();

    for record in records {
        stats.total_sessions += 1;
        stats.total_focus_seconds = stats
            .total_focus_seconds
            .saturating_add(record.duration_seconds);

        if today.contains(&record.start_time) {
            stats.today_sessions += 1;
            stats.today_focus_seconds = stats
                .today_focus_seconds
                .saturating_add(record.duration_seconds);
        }
        if week.contains(&record.start_time) {
            stats.week_sessions += 1;
            stats.week_focus_seconds = stats
                .week_focus_seconds
                .saturating_add(record.duration_seconds);
        }

        let entry = labels
            .entry(record.label.as_str())
            .or_insert_with(|| LabelTotal {
                label: record.label.clone(),
                ..LabelTotal::default()
            });
        entry.sessions += 1;
        entry.focus_seconds = entry.focus_seconds.saturating_add(record.duration_seconds);
    }

    stats.average_session_seconds = stats
        .total_focus_seconds
        .checked_div(stats.total_sessions)
        .unwrap_or(0);

    // BTreeMap order gives the label tie-break; the stable sort keeps it.
    let mut labels: Vec<LabelTotal> = labels.into_values().collect();
    labels.sort_by(|a, b| b.focus_seconds.cmp(&a.focus_seconds));
    stats.labels = labels;

    stats
}

pub fn compute_local(records: &[SessionRecord], week_start: Weekday) -> SessionStatistics {
    compute(records, &Local::now(), week_start)
}

/// Read-only view over the session store.
#[derive(Clone)]
pub struct StatisticsService {
    store: SessionStore,
    week_start: Weekday,
}

impl StatisticsService {
    pub fn new(store: SessionStore, week_start: Weekday) -> Self {
        Self { store, week_start }
    }

    pub async fn get_statistics(&self) -> SessionStatistics {
        let records = self.store.fetch_all().await;
        compute_local(&records, self.week_start)
    }

    pub async fn sessions_today(&self) -> Vec<SessionRecord> {
        let today = CalendarWindow::day_of(&Local::now());
        self.store.fetch_in_range(today.start, today.end).await
    }

    pub async fn sessions_this_week(&self) -> Vec<SessionRecord> {
        let week = CalendarWindow::week_of(&Local::now(), self.week_start);
        self.store.fetch_in_range(week.start, week.end).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};

    fn zone() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn record(local: (i32, u32, u32, u32), seconds: u64, label: &str) -> SessionRecord {
        let (y, m, d, h) = local;
        let start = zone()
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        SessionRecord::new(start, start + Duration::seconds(seconds as i64), seconds, label)
    }

    #[test]
    fn empty_history_has_zero_average() {
        let now = zone().with_ymd_and_hms(2025, 6, 4, 12, 0, 0).unwrap();
        let stats = compute(&[], &now, Weekday::Mon);
        assert_eq!(stats, SessionStatistics::default());
    }

    #[test]
    fn two_sessions_today() {
        let now = zone().with_ymd_and_hms(2025, 6, 4, 18, 0, 0).unwrap();
        let records = vec![
            record((2025, 6, 4, 9), 1800, "Deep Work"),
            record((2025, 6, 4, 14), 3600, "Deep Work"),
        ];
        let stats = compute(&records, &now, Weekday::Mon);
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_focus_seconds, 5400);
        assert_eq!(stats.average_session_seconds, 2700);
        assert_eq!(stats.today_sessions, 2);
        assert_eq!(stats.today_focus_seconds, 5400);
        assert_eq!(stats.week_sessions, 2);
    }

    #[test]
    fn windows_use_the_local_calendar() {
        // Wednesday 2025-06-04, week starting Monday 2025-06-02.
        let now = zone().with_ymd_and_hms(2025, 6, 4, 0, 30, 0).unwrap();
        let records = vec![
            record((2025, 6, 4, 0), 600, "a"),  // local midnight, today
            record((2025, 6, 3, 23), 600, "a"), // yesterday, this week
            record((2025, 6, 2, 0), 600, "b"),  // first instant of the week
            record((2025, 6, 1, 23), 600, "b"), // previous Sunday
            record((2025, 6, 9, 0), 600, "b"),  // next week
        ];
        let stats = compute(&records, &now, Weekday::Mon);
        assert_eq!(stats.today_sessions, 1);
        assert_eq!(stats.week_sessions, 3);
        assert_eq!(stats.total_sessions, 5);

        let sunday_weeks = compute(&records, &now, Weekday::Sun);
        assert_eq!(sunday_weeks.week_sessions, 4);
    }

    #[test]
    fn average_rounds_down() {
        let now = zone().with_ymd_and_hms(2025, 6, 4, 18, 0, 0).unwrap();
        let records = vec![
            record((2025, 6, 4, 9), 100, "a"),
            record((2025, 6, 4, 10), 101, "a"),
        ];
        assert_eq!(compute(&records, &now, Weekday::Mon).average_session_seconds, 100);
    }

    #[test]
    fn labels_are_ranked_by_focus_time() {
        let now = zone().with_ymd_and_hms(2025, 6, 4, 18, 0, 0).unwrap();
        let records = vec![
            record((2025, 6, 4, 9), 600, "Reading"),
            record((2025, 6, 4, 10), 1200, "Coding"),
            record((2025, 6, 4, 11), 600, "Admin"),
            record((2025, 6, 4, 12), 300, "Coding"),
        ];
        let labels = compute(&records, &now, Weekday::Mon).labels;
        let order: Vec<_> = labels.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(order, vec!["Coding", "Admin", "Reading"]);
        assert_eq!(labels[0].sessions, 2);
        assert_eq!(labels[0].focus_seconds, 1500);
    }
}
