use chrono::{Days, NaiveDate};
use std::path::Path;

use super::error::PipelineError;
use super::pipeline::{DaySchedule, FeedContext};
use super::schedule::{ScheduleLine, write_schedule};

pub const WEEK_DAYS: u32 = 7;

#[derive(Debug)]
pub struct WeeklyOutcome {
    /// Day offset 0, when it produced a schedule.
    pub first_day: Option<DaySchedule>,
    pub days_written: Vec<u32>,
    pub line_count: usize,
}

/// Derives the schedule for `days` consecutive dates from `start` and writes them
/// as one file, each line keyed by its day offset.
///
/// A day with no active services or no qualifying trips is skipped with a warning;
/// any other error aborts the run. Nothing at all for the window is an error.
pub fn run_weekly(
    feed: &mut FeedContext,
    start: NaiveDate,
    days: u32,
    output: &Path,
) -> Result<WeeklyOutcome, PipelineError> {
    let mut all_lines: Vec<ScheduleLine> = Vec::new();
    let mut days_written = Vec::new();
    let mut first_day = None;

    for day_offset in 0..days {
        let Some(date) = start.checked_add_days(Days::new(day_offset.into())) else {
            log::warn!("Day offset {day_offset} from {start} is out of range, stopping");
            break;
        };
        log::info!("Starting day offset {day_offset} ({date})");

        let day = match feed.derive_day(date) {
            Ok(day) => day,
            Err(e) if e.skips_day() => {
                log::warn!("Skipping day offset {day_offset} due to error: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };

        let lines = day.schedule.to_lines(&feed.stops, None);
        log::info!("Day offset {day_offset}: {} schedule lines", lines.len());
        all_lines.extend(lines.into_iter().map(|line| line.with_day_offset(day_offset)));
        days_written.push(day_offset);
        if day_offset == 0 {
            first_day = Some(day);
        }
    }

    if all_lines.is_empty() {
        log::error!("No schedule data generated for the entire window");
        return Err(PipelineError::EmptyWindow { start, days });
    }

    write_schedule(output, &all_lines)?;
    log::info!(
        "Wrote {} combined schedule lines for day offsets {days_written:?}",
        all_lines.len()
    );
    Ok(WeeklyOutcome {
        first_day,
        days_written,
        line_count: all_lines.len(),
    })
}
