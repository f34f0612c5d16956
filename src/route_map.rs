use indicatif::ProgressIterator;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::archive::GtfsArchive;
use super::error::PipelineError;
use super::pipeline::{DaySchedule, FeedContext};
use super::records::{MinutesPastMidnight, StopId, StopTime, TripId};
use super::schedule::{LineName, ScheduleLine, clean_field, read_schedule};
use super::stops::StopIndex;
use super::time_ranges::{TimeBand, collapse};
use super::utils::{progress_spinner_for_rows, write_lines_atomically};

/// (line, origin stop code, departure) as they appear in the schedule file.
type DepartureKey = (String, String, MinutesPastMidnight);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct RouteKey {
    line: LineName,
    origin_name: String,
    path: String,
}

/// One line of the routes file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteBand {
    line: LineName,
    origin_name: String,
    band: TimeBand,
    path: String,
}

impl fmt::Display for RouteBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | from {} | to {} | {}",
            self.line, self.origin_name, self.band.start, self.band.end, self.path
        )
    }
}

/// Writes the routes file: the first day's departures from the schedule file,
/// grouped by the full stop path of the trips behind them and collapsed into
/// time bands.
pub fn write_routes(
    feed: &mut FeedContext,
    first_day: &DaySchedule,
    schedule_path: &Path,
    routes_path: &Path,
) -> Result<usize, PipelineError> {
    log::info!(
        "Mapping full routes of {} trips on {} into {}",
        first_day.trips.len(),
        first_day.date,
        routes_path.display()
    );
    let schedule_lines = read_schedule(schedule_path)?;
    let paths = trip_paths(&mut feed.archive, &feed.stops, &first_day.trips)?;
    let bands = route_bands(&schedule_lines, &paths);
    write_lines_atomically(routes_path, &bands)?;
    log::info!("Wrote {} route bands to {}", bands.len(), routes_path.display());
    Ok(bands.len())
}

/// Full stop path of every trip in `trips`, keyed the way the schedule file
/// identifies the trip's origin departure.
fn trip_paths(
    archive: &mut GtfsArchive,
    stops: &StopIndex,
    trips: &HashMap<TripId, LineName>,
) -> Result<HashMap<DepartureKey, BTreeSet<String>>, PipelineError> {
    let mut visits: HashMap<TripId, Vec<(u32, StopId, String)>> = HashMap::new();
    let progress = progress_spinner_for_rows(StopTime::TABLE);
    for stop_time in archive
        .rows::<StopTime>(StopTime::TABLE, StopTime::REQUIRED)?
        .progress_with(progress)
    {
        let stop_time = stop_time?;
        if trips.contains_key(&stop_time.trip_id) {
            visits.entry(stop_time.trip_id).or_default().push((
                stop_time.stop_sequence,
                stop_time.stop_id,
                stop_time.departure_time,
            ));
        }
    }

    let mut paths: HashMap<DepartureKey, BTreeSet<String>> = HashMap::new();
    for (trip_id, mut visited) in visits {
        visited.sort_by_key(|(stop_sequence, _, _)| *stop_sequence);
        let Some((_, origin_id, departure)) = visited.first() else {
            continue;
        };
        let departure = match MinutesPastMidnight::from_str(departure) {
            Ok(departure) => departure,
            Err(e) => {
                log::warn!("Skipping path of trip {}: {e}", trip_id.0);
                continue;
            }
        };
        let origin_code = stops
            .get(origin_id)
            .map(|info| info.code.clone())
            .unwrap_or_else(|| origin_id.0.clone());
        let path = visited
            .iter()
            .map(|(_, stop_id, _)| describe_stop(stops, stop_id))
            .collect::<Vec<_>>()
            .join(", ");

        let line = &trips[&trip_id];
        paths
            .entry((clean_field(&line.0), clean_field(&origin_code), departure))
            .or_default()
            .insert(path);
    }
    log::debug!("Built {} distinct origin departures with paths", paths.len());
    Ok(paths)
}

fn describe_stop(stops: &StopIndex, stop_id: &StopId) -> String {
    match stops.get(stop_id) {
        Some(info) => format!("{} ({})", info.name, info.code),
        None => stop_id.0.clone(),
    }
}

/// Day offset 0 lines only; a daily file has no offsets and counts as day 0.
fn route_bands(
    schedule_lines: &[ScheduleLine],
    paths: &HashMap<DepartureKey, BTreeSet<String>>,
) -> Vec<RouteBand> {
    let mut groups: BTreeMap<RouteKey, Vec<MinutesPastMidnight>> = BTreeMap::new();
    let mut unmatched = 0;
    for line in schedule_lines
        .iter()
        .filter(|line| line.day_offset.unwrap_or(0) == 0)
    {
        for time in line.times.iter() {
            let key = (line.line.clone(), line.stop_code.clone(), *time);
            let Some(route_paths) = paths.get(&key) else {
                unmatched += 1;
                continue;
            };
            for path in route_paths {
                groups
                    .entry(RouteKey {
                        line: LineName::new(&line.line),
                        origin_name: line.stop_name.clone(),
                        path: path.clone(),
                    })
                    .or_default()
                    .push(*time);
            }
        }
    }
    if unmatched > 0 {
        log::warn!("{unmatched} schedule departures matched no trip path and were dropped");
    }

    let mut bands = Vec::new();
    for (key, times) in groups {
        for band in collapse(&times) {
            bands.push(RouteBand {
                line: key.line.clone(),
                origin_name: key.origin_name.clone(),
                band,
                path: key.path.clone(),
            });
        }
    }
    bands
}
