use chrono::Duration;
use chrono::{DateTime, Datelike, Local, NaiveDate, SecondsFormat, TimeZone, Timelike, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn default_for(now: DateTime<Local>) -> Self {
        Self {
            start: default_start(now),
            end: default_end(now),
        }
    }

    pub fn from_dates(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, String> {
        if start_date > end_date {
            return Err("Start date cannot be after end date.".to_string());
        }
        Ok(Self {
            start: local_datetime(start_date, 0, 0, 0, 0).with_timezone(&Utc),
            end: local_datetime(end_date, 23, 59, 59, 999).with_timezone(&Utc),
        })
    }

    /// Strict on both ends: an instant equal to a bound is outside.
    pub fn strictly_contains(&self, instant: DateTime<Utc>) -> bool {
        self.start < instant && instant < self.end
    }

    pub fn label(&self) -> String {
        let start = self.start.with_timezone(&Local).date_naive();
        let end = self.end.with_timezone(&Local).date_naive();
        if start == end {
            format!("{}", start.format("%Y-%m-%d"))
        } else {
            format!("{} → {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
        }
    }
}

pub fn default_start(now: DateTime<Local>) -> DateTime<Utc> {
    let day = (now - Duration::days(14)).date_naive();
    local_datetime(day, 0, 0, 0, 0).with_timezone(&Utc)
}

pub fn default_end(now: DateTime<Local>) -> DateTime<Utc> {
    local_datetime(now.date_naive(), 23, 59, 59, 999).with_timezone(&Utc)
}

pub fn to_iso_string(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| "Invalid date format. Use YYYY-MM-DD.".to_string())
}

pub fn parse_local_datetime(value: &str) -> Result<DateTime<Utc>, String> {
    if let Some(instant) = parse_iso(value) {
        return Ok(instant);
    }
    let naive = chrono::NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M"))
        .map_err(|_| "Invalid date-time format. Use YYYY-MM-DDTHH:MM[:SS].".to_string())?;
    let local = Local.from_local_datetime(&naive);
    local
        .earliest()
        .or_else(|| local.latest())
        .map(|instant| instant.with_timezone(&Utc))
        .ok_or_else(|| "Date-time does not exist in the local time zone.".to_string())
}

pub fn to_local_datetime_string(instant: DateTime<Utc>) -> String {
    let local = instant.with_timezone(&Local);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        local.year(),
        local.month(),
        local.day(),
        local.hour(),
        local.minute(),
        local.second()
    )
}

pub fn show_time_difference(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let seconds = (end - start).num_seconds().abs();
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    if hours > 0 {
        if minutes > 0 {
            return format!("{hours}hr {minutes}min");
        }
        return format!("{hours}hr");
    }
    format!("{minutes} min")
}

pub fn elapsed_clock(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

fn local_datetime(
    date: NaiveDate,
    hour: u32,
    minute: u32,
    second: u32,
    milli: u32,
) -> DateTime<Local> {
    let result = Local.with_ymd_and_hms(date.year(), date.month(), date.day(), hour, minute, second);
    let base = result
        .earliest()
        .or_else(|| result.latest())
        .unwrap_or_else(Local::now);
    base + Duration::milliseconds(i64::from(milli))
}
