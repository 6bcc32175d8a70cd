use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

/// Half-open `[start, end)` span of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CalendarWindow {
    /// The calendar day containing `now`, in the zone of `now`.
    pub fn day_of<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let zone = now.timezone();
        let date = now.date_naive();
        Self {
            start: start_of_day(&zone, date),
            end: start_of_day(&zone, date + Duration::days(1)),
        }
    }

    /// The calendar week containing `now`, beginning on `week_start`.
    pub fn week_of<Tz: TimeZone>(now: &DateTime<Tz>, week_start: Weekday) -> Self {
        let zone = now.timezone();
        let date = now.date_naive();
        let offset = (7 + date.weekday().num_days_from_monday()
            - week_start.num_days_from_monday())
            % 7;
        let first = date - Duration::days(i64::from(offset));
        Self {
            start: start_of_day(&zone, first),
            end: start_of_day(&zone, first + Duration::days(7)),
        }
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start <= *instant && *instant < self.end
    }
}

/// First valid instant of `date`. A midnight skipped by a DST change resolves to the
/// first hour that exists.
fn start_of_day<Tz: TimeZone>(zone: &Tz, date: NaiveDate) -> DateTime<Utc> {
    (0..24)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .find_map(|time| zone.from_local_datetime(&date.and_time(time)).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}
