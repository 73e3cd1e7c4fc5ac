//! Query ranges for time entries

use crate::{Error, Result};
use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Half-open range `[start, end)` over entry start times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EntryRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(Error::Validation(
                "Range end must be after range start".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Today in the local timezone
    pub fn today() -> Result<Self> {
        Self::today_in(&Local::now())
    }

    /// Current week (Monday start) in the local timezone
    pub fn this_week() -> Result<Self> {
        Self::this_week_in(&Local::now())
    }

    /// Current calendar month in the local timezone
    pub fn this_month() -> Result<Self> {
        Self::this_month_in(&Local::now())
    }

    /// The last `days` days including today, in the local timezone
    pub fn last_days(days: u32) -> Result<Self> {
        Self::last_days_in(&Local::now(), days)
    }

    pub fn today_in<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Self> {
        let date = now.date_naive();
        Self::between_dates(&now.timezone(), date, next_day(date)?)
    }

    pub fn this_week_in<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Self> {
        let date = now.date_naive();
        let days_from_monday = date.weekday().num_days_from_monday();
        let monday = date
            .checked_sub_days(Days::new(u64::from(days_from_monday)))
            .ok_or_else(|| Error::InvalidData(format!("No week start for {}", date)))?;
        let next_monday = monday
            .checked_add_days(Days::new(7))
            .ok_or_else(|| Error::InvalidData(format!("No week end for {}", date)))?;
        Self::between_dates(&now.timezone(), monday, next_monday)
    }

    pub fn this_month_in<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Self> {
        let date = now.date_naive();
        let first = date
            .with_day(1)
            .ok_or_else(|| Error::InvalidData(format!("No month start for {}", date)))?;
        let next_first = if date.month() == 12 {
            NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
        }
        .ok_or_else(|| Error::InvalidData(format!("No month end for {}", date)))?;
        Self::between_dates(&now.timezone(), first, next_first)
    }

    pub fn last_days_in<Tz: TimeZone>(now: &DateTime<Tz>, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(Error::Validation("Day count must be at least 1".to_string()));
        }
        let date = now.date_naive();
        let first = date
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| Error::InvalidData(format!("{} days before {}", days, date)))?;
        Self::between_dates(&now.timezone(), first, next_day(date)?)
    }

    /// Resolve a preset name: `today`, `week`, `month`, or `<n>d`.
    pub fn preset(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "today" | "day" => Self::today(),
            "week" => Self::this_week(),
            "month" => Self::this_month(),
            other => {
                let days = other
                    .strip_suffix('d')
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or_else(|| {
                        Error::Validation(format!(
                            "Unknown range '{}'. Use today, week, month or <n>d",
                            name
                        ))
                    })?;
                Self::last_days(days)
            }
        }
    }

    fn between_dates<Tz: TimeZone>(tz: &Tz, first: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::new(start_of_day(tz, first)?, start_of_day(tz, end)?)
    }
}

fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| Error::InvalidData(format!("No day after {}", date)))
}

fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidData(format!("No local midnight on {}", date)))
}
