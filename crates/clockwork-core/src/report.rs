//! Reports and calendar grouping over time entries

use crate::models::entry::format_duration;
use crate::models::TimeEntry;
use crate::Result;
use chrono::{Local, NaiveDate, TimeZone};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;

pub const NO_PROJECT: &str = "No project";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub total_entries: usize,
    pub total_seconds: u64,
    pub avg_seconds: u64,
    pub by_project: Vec<ProjectTotal>,
    pub by_day: Vec<DayTotal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectTotal {
    pub project_id: Option<String>,
    pub name: String,
    pub seconds: u64,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub seconds: u64,
    pub entries: usize,
}

impl Report {
    /// Build a report grouping days in the local timezone
    pub fn build(entries: &[TimeEntry]) -> Self {
        Self::build_in(entries, &Local)
    }

    pub fn build_in<Tz: TimeZone>(entries: &[TimeEntry], tz: &Tz) -> Self {
        let total_seconds: u64 = entries.iter().map(|e| e.duration_seconds).sum();

        let mut projects: HashMap<Option<&str>, ProjectTotal> = HashMap::new();
        for entry in entries {
            let total = projects
                .entry(entry.project_id.as_deref())
                .or_insert_with(|| ProjectTotal {
                    project_id: entry.project_id.clone(),
                    name: entry.project_label().unwrap_or(NO_PROJECT).to_string(),
                    seconds: 0,
                    entries: 0,
                });
            total.seconds += entry.duration_seconds;
            total.entries += 1;
        }

        let mut by_project: Vec<ProjectTotal> = projects.into_values().collect();
        by_project.sort_by(|a, b| b.seconds.cmp(&a.seconds).then_with(|| a.name.cmp(&b.name)));

        Self {
            total_entries: entries.len(),
            total_seconds,
            avg_seconds: if entries.is_empty() {
                0
            } else {
                total_seconds / entries.len() as u64
            },
            by_project,
            by_day: calendar_days(entries, tz),
        }
    }

    pub fn total_formatted(&self) -> String {
        format_duration(self.total_seconds)
    }
}

/// Per-day totals keyed by the local date of each entry's start time
pub fn calendar_days<Tz: TimeZone>(entries: &[TimeEntry], tz: &Tz) -> Vec<DayTotal> {
    let mut days: BTreeMap<NaiveDate, DayTotal> = BTreeMap::new();
    for entry in entries {
        let date = entry.start_time.with_timezone(tz).date_naive();
        let day = days.entry(date).or_insert(DayTotal {
            date,
            seconds: 0,
            entries: 0,
        });
        day.seconds += entry.duration_seconds;
        day.entries += 1;
    }
    days.into_values().collect()
}

/// CSV-friendly representation of a TimeEntry
#[derive(Debug, Serialize)]
struct EntryCsv<'a> {
    id: &'a str,
    date: String,
    start: String,
    end: String,
    duration_seconds: u64,
    duration: String,
    description: &'a str,
    project: &'a str,
}

/// Write entries as CSV, one row per entry, times in the local timezone.
pub fn write_csv<W: Write>(writer: W, entries: &[TimeEntry]) -> Result<()> {
    write_csv_in(writer, entries, &Local)
}

pub fn write_csv_in<W: Write, Tz: TimeZone>(writer: W, entries: &[TimeEntry], tz: &Tz) -> Result<()>
where
    Tz::Offset: std::fmt::Display,
{
    let mut writer = csv::Writer::from_writer(writer);

    for entry in entries {
        let start = entry.start_time.with_timezone(tz);
        let row = EntryCsv {
            id: &entry.id,
            date: start.format("%Y-%m-%d").to_string(),
            start: start.format("%H:%M:%S").to_string(),
            end: entry
                .end_time
                .map(|t| t.with_timezone(tz).format("%H:%M:%S").to_string())
                .unwrap_or_default(),
            duration_seconds: entry.duration_seconds,
            duration: entry.duration_formatted(),
            description: &entry.description,
            project: entry.project_label().unwrap_or_default(),
        };
        writer.serialize(row)?;
    }

    writer.flush()?;
    Ok(())
}
