use chrono::{Duration, FixedOffset, TimeZone, Utc, Weekday};
use focusbar_lib::{
    models::SessionRecord,
    stats::{self, CalendarWindow, StatisticsService},
    store::SessionStore,
};

fn session(start: chrono::DateTime<Utc>, seconds: u64, label: &str) -> SessionRecord {
    SessionRecord::new(start, start + Duration::seconds(seconds as i64), seconds, label)
}

#[tokio::test]
async fn service_reports_todays_sessions() {
    let store = SessionStore::in_memory().unwrap();
    let now = Utc::now();
    store
        .save(&session(now - Duration::seconds(2), 1800, "Deep Work"))
        .await;
    store.save(&session(now - Duration::seconds(1), 3600, "")).await;

    let service = StatisticsService::new(store.clone(), Weekday::Mon);
    let stats = service.get_statistics().await;

    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.total_focus_seconds, 5400);
    assert_eq!(stats.average_session_seconds, 2700);
    assert_eq!(stats.today_sessions, 2);
    assert_eq!(stats.labels[0].label, "Unlabeled");
    assert_eq!(service.sessions_today().await.len(), 2);
    assert_eq!(service.sessions_this_week().await.len(), 2);
}

#[tokio::test]
async fn empty_history_has_zero_average() {
    let store = SessionStore::in_memory().unwrap();
    let stats = StatisticsService::new(store, Weekday::Mon)
        .get_statistics()
        .await;
    assert_eq!(stats.total_sessions, 0);
    assert_eq!(stats.average_session_seconds, 0);
    assert!(stats.labels.is_empty());
}

#[tokio::test]
async fn week_boundaries_follow_the_stored_history() {
    let zone = FixedOffset::west_opt(5 * 3600).unwrap();
    // Wednesday 2024-05-15 10:00 local.
    let now = zone.with_ymd_and_hms(2024, 5, 15, 10, 0, 0).unwrap();
    let monday = zone
        .with_ymd_and_hms(2024, 5, 13, 0, 30, 0)
        .unwrap()
        .with_timezone(&Utc);
    let last_sunday = zone
        .with_ymd_and_hms(2024, 5, 12, 23, 30, 0)
        .unwrap()
        .with_timezone(&Utc);

    let store = SessionStore::in_memory().unwrap();
    store.save(&session(last_sunday, 600, "Reading")).await;
    store.save(&session(monday, 900, "Reading")).await;

    let week = CalendarWindow::week_of(&now, Weekday::Mon);
    let in_week = store.fetch_in_range(week.start, week.end).await;
    assert_eq!(in_week.len(), 1);
    assert_eq!(in_week[0].start_time, monday);

    let records = store.fetch_all().await;
    let by_monday = stats::compute(&records, &now, Weekday::Mon);
    assert_eq!(by_monday.week_sessions, 1);
    assert_eq!(by_monday.today_sessions, 0);

    let by_sunday = stats::compute(&records, &now, Weekday::Sun);
    assert_eq!(by_sunday.week_sessions, 2);
    assert_eq!(by_sunday.week_focus_seconds, 1500);
}
