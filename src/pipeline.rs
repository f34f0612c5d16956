use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::archive::GtfsArchive;
use super::calendar::{self, CalendarSource};
use super::config::Config;
use super::departures;
use super::error::PipelineError;
use super::records::{TripId, WeeklyCalendar};
use super::route_map;
use super::schedule::{LineName, Schedule, write_schedule};
use super::stops::StopIndex;
use super::trips::{self, TargetLineTrips};
use super::utils::remove_output;
use super::weekly;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// One service day, `<line>|<code>|<name>:<times>`
    Daily,
    /// Seven days from the start date, `<line>|<code>|<name>|<day_offset>:<times>`
    Weekly,
}

#[derive(Debug)]
pub struct RunOptions {
    pub gtfs_path: PathBuf,
    pub mode: Mode,
    pub date: NaiveDate,
    pub schedule_output: PathBuf,
    pub routes_output: Option<PathBuf>,
}

/// What a run produced, for whoever commits the output files.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub commit_message: String,
    pub files_to_commit: Vec<String>,
    pub schedule_lines: usize,
    pub route_lines: Option<usize>,
}

/// Everything about the feed that does not depend on the service day. The archive
/// stays open for the life of the context.
pub struct FeedContext {
    pub archive: GtfsArchive,
    pub stops: StopIndex,
    calendar: CalendarSource,
    line_trips: TargetLineTrips,
    visiting_target_stops: Option<HashSet<TripId>>,
}

/// Qualifying trips and their origin departures for one date.
#[derive(Debug)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub trips: HashMap<TripId, LineName>,
    pub schedule: Schedule,
}

impl FeedContext {
    pub fn open(gtfs_path: &Path, config: &Config) -> Result<Self, PipelineError> {
        log::info!("Opening GTFS archive {}", gtfs_path.display());
        let mut archive = GtfsArchive::open(gtfs_path)?;
        archive.log_contents();

        let calendar = match CalendarSource::probe(&archive) {
            Some(CalendarSource::Guessed(table)) => {
                log::warn!(
                    "Neither calendar.txt nor calendar_dates.txt is in the archive. \
                     Reading {table} as date exceptions."
                );
                CalendarSource::Guessed(table)
            }
            Some(source) => source,
            None => {
                return Err(PipelineError::MissingTable {
                    table: WeeklyCalendar::TABLE.to_string(),
                });
            }
        };

        let stops = StopIndex::load(&mut archive)?;
        let target_stops = stops.resolve_codes(&config.target_stop_codes);
        let line_trips = TargetLineTrips::load(&mut archive, config)?;
        log::info!("{} trips run on the target lines", line_trips.len());
        let visiting_target_stops = trips::trips_visiting(&mut archive, &target_stops)?;

        Ok(FeedContext {
            archive,
            stops,
            calendar,
            line_trips,
            visiting_target_stops,
        })
    }

    /// Runs calendar resolution, trip filtering and departure extraction for `date`.
    pub fn derive_day(&mut self, date: NaiveDate) -> Result<DaySchedule, PipelineError> {
        log::info!(
            "Processing {date}, GTFS day index {} (0 = Sunday)",
            calendar::gtfs_day_index(date)
        );
        let active = calendar::active_service_ids(&mut self.archive, &self.calendar, date)?;
        let trips =
            self.line_trips
                .qualifying(&active, self.visiting_target_stops.as_ref(), date)?;
        let schedule = departures::extract(&mut self.archive, &trips)?;
        Ok(DaySchedule {
            date,
            trips,
            schedule,
        })
    }
}

/// Single day run: a failure is fatal.
pub fn run_daily(
    feed: &mut FeedContext,
    date: NaiveDate,
    output: &Path,
) -> Result<(DaySchedule, usize), PipelineError> {
    let day = feed.derive_day(date)?;
    let lines = day.schedule.to_lines(&feed.stops, None);
    write_schedule(output, &lines)?;
    log::info!(
        "Schedule generated and written for {} lines",
        day.schedule.line_count()
    );
    Ok((day, lines.len()))
}

/// Produces the schedule file and, when asked, the routes file.
///
/// Any fatal error removes the schedule and routes files at the output paths,
/// including ones left by an earlier successful run, so stale output is never
/// committed.
pub fn run(options: &RunOptions, config: &Config) -> Result<RunSummary, PipelineError> {
    let (mut feed, first_day, schedule_lines) = match generate_schedule(options, config) {
        Ok(generated) => generated,
        Err(e) => {
            log::error!("Schedule generation failed: {e}");
            remove_output(&options.schedule_output);
            if let Some(routes_path) = &options.routes_output {
                remove_output(routes_path);
            }
            return Err(e);
        }
    };
    let mut files_to_commit = vec![file_name(&options.schedule_output)];

    let route_lines = match (&options.routes_output, first_day) {
        (Some(routes_path), Some(day)) => {
            match route_map::write_routes(&mut feed, &day, &options.schedule_output, routes_path) {
                Ok(count) => {
                    files_to_commit.push(file_name(routes_path));
                    Some(count)
                }
                Err(e) => {
                    log::error!("Route mapping failed: {e}");
                    remove_output(routes_path);
                    None
                }
            }
        }
        (Some(routes_path), None) => {
            log::warn!("No schedule for the first day, routes file not generated");
            remove_output(routes_path);
            None
        }
        (None, _) => None,
    };

    Ok(RunSummary {
        commit_message: commit_message(options),
        files_to_commit,
        schedule_lines,
        route_lines,
    })
}

impl RunSummary {
    /// Nothing to commit.
    pub fn failed(options: &RunOptions) -> Self {
        RunSummary {
            commit_message: commit_message(options),
            files_to_commit: Vec::new(),
            schedule_lines: 0,
            route_lines: None,
        }
    }
}

fn commit_message(options: &RunOptions) -> String {
    let kind = match options.mode {
        Mode::Daily => "Daily",
        Mode::Weekly => "Weekly",
    };
    format!("GTFS {kind} Schedule Update for {}", options.date)
}

fn generate_schedule(
    options: &RunOptions,
    config: &Config,
) -> Result<(FeedContext, Option<DaySchedule>, usize), PipelineError> {
    let mut feed = FeedContext::open(&options.gtfs_path, config)?;
    match options.mode {
        Mode::Daily => {
            let (day, count) = run_daily(&mut feed, options.date, &options.schedule_output)?;
            Ok((feed, Some(day), count))
        }
        Mode::Weekly => {
            let week = weekly::run_weekly(
                &mut feed,
                options.date,
                weekly::WEEK_DAYS,
                &options.schedule_output,
            )?;
            log::info!("Weekly schedule covers day offsets {:?}", week.days_written);
            Ok((feed, week.first_day, week.line_count))
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
