use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;

use super::archive::GtfsArchive;
use super::error::PipelineError;
use super::records::{CalendarDate, Exception, ServiceId, WeeklyCalendar};

/// calendar.txt day columns, indexed the GTFS way: 0 = Sunday .. 6 = Saturday.
pub const DAY_COLUMNS: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Weekday index of `date` with Sunday as 0. chrono counts from Monday by default,
/// which would select the wrong column.
pub fn gtfs_day_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_sunday() as usize
}

pub fn day_column(date: NaiveDate) -> &'static str {
    DAY_COLUMNS[gtfs_day_index(date)]
}

/// Which table describes service days in this archive.
#[derive(Debug, Clone, PartialEq)]
pub enum CalendarSource {
    Weekly,
    Exceptions,
    /// Neither canonical table exists; a table whose name mentions "calendar"
    /// is read with the exception scheme.
    Guessed(String),
}

impl CalendarSource {
    pub fn probe(archive: &GtfsArchive) -> Option<CalendarSource> {
        if archive.has_table(WeeklyCalendar::TABLE) {
            return Some(CalendarSource::Weekly);
        }
        if archive.has_table(CalendarDate::TABLE) {
            return Some(CalendarSource::Exceptions);
        }
        archive
            .find_table_containing("calendar")
            .map(|name| CalendarSource::Guessed(name.to_string()))
    }

    pub fn table(&self) -> &str {
        match self {
            CalendarSource::Weekly => WeeklyCalendar::TABLE,
            CalendarSource::Exceptions => CalendarDate::TABLE,
            CalendarSource::Guessed(name) => name.as_str(),
        }
    }
}

/// Service ids running on `date`. An empty set is an error: it nearly always means
/// the feed and the date do not line up, not that nothing runs.
pub fn active_service_ids(
    archive: &mut GtfsArchive,
    source: &CalendarSource,
    date: NaiveDate,
) -> Result<HashSet<ServiceId>, PipelineError> {
    let active = match source {
        CalendarSource::Weekly => {
            let column = day_column(date);
            log::info!(
                "Mapping active service ids from {} using column {column:?}",
                WeeklyCalendar::TABLE
            );
            let rows = archive.read_table(WeeklyCalendar::TABLE, WeeklyCalendar::REQUIRED)?;
            weekly_services(rows, column)
        }
        CalendarSource::Exceptions | CalendarSource::Guessed(_) => {
            let table = source.table();
            let date_str = date.format("%Y%m%d").to_string();
            log::info!("Mapping active service ids from {table} for date {date_str}");
            let rows = archive.read_table(table, CalendarDate::REQUIRED)?;
            exception_services(rows, &date_str)
        }
    };

    log::debug!("Found {} active service ids for {date}", active.len());
    if active.is_empty() {
        return Err(PipelineError::EmptyActiveServices { date });
    }
    Ok(active)
}

fn weekly_services(rows: Vec<WeeklyCalendar>, day_column: &str) -> HashSet<ServiceId> {
    rows.into_iter()
        .filter(|row| row.runs_on(day_column))
        .map(|row| row.service_id)
        .collect()
}

/// Services added on `date`, less any removed on the same date. No weekly baseline
/// is assumed, so removals only cancel additions.
fn exception_services(rows: Vec<CalendarDate>, date: &str) -> HashSet<ServiceId> {
    let mut added = HashSet::new();
    let mut removed = HashSet::new();
    for row in rows.into_iter().filter(|row| row.date.trim() == date) {
        match row.exception() {
            Some(Exception::Added) => {
                added.insert(row.service_id);
            }
            Some(Exception::Removed) => {
                removed.insert(row.service_id);
            }
            None => log::warn!(
                "Ignoring exception type {:?} for service {}",
                row.exception_type,
                row.service_id.0
            ),
        }
    }
    added.retain(|service_id| !removed.contains(service_id));
    added
}
