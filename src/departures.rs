use indicatif::ProgressIterator;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::str::FromStr;

use super::archive::GtfsArchive;
use super::error::PipelineError;
use super::records::{MinutesPastMidnight, StopId, StopTime, TripId};
use super::schedule::{LineName, Schedule};
use super::utils::progress_spinner_for_rows;

/// The lowest stop_sequence seen so far for a trip and the events recorded at it.
/// Ties (pathological feeds) keep every event.
#[derive(Debug)]
struct TripOrigin {
    stop_sequence: u32,
    events: Vec<(StopId, String)>,
}

/// Scans stop_times.txt once and groups the origin departure of every qualifying
/// trip by line and stop.
pub fn extract(
    archive: &mut GtfsArchive,
    qualifying: &HashMap<TripId, LineName>,
) -> Result<Schedule, PipelineError> {
    log::info!(
        "Extracting origin departure times for {} trips from {}",
        qualifying.len(),
        StopTime::TABLE
    );
    let progress = progress_spinner_for_rows(StopTime::TABLE);
    let stop_times = archive
        .rows::<StopTime>(StopTime::TABLE, StopTime::REQUIRED)?
        .progress_with(progress);
    origin_departures(stop_times, qualifying)
}

pub fn origin_departures<I>(
    stop_times: I,
    qualifying: &HashMap<TripId, LineName>,
) -> Result<Schedule, PipelineError>
where
    I: IntoIterator<Item = Result<StopTime, PipelineError>>,
{
    let mut origins: HashMap<TripId, TripOrigin> = HashMap::new();
    for stop_time in stop_times {
        let stop_time = stop_time?;
        if qualifying.contains_key(&stop_time.trip_id) {
            record_if_origin(&mut origins, stop_time);
        }
    }

    let mut schedule = Schedule::default();
    for (trip_id, origin) in origins {
        let line = &qualifying[&trip_id];
        for (stop_id, departure_time) in origin.events {
            match MinutesPastMidnight::from_str(&departure_time) {
                Ok(time) => schedule.push(line.clone(), stop_id, time),
                Err(e) => log::warn!("Skipping origin of trip {}: {e}", trip_id.0),
            }
        }
    }
    log::debug!("Extracted departures for {} lines", schedule.line_count());
    Ok(schedule)
}

fn record_if_origin(origins: &mut HashMap<TripId, TripOrigin>, stop_time: StopTime) {
    let StopTime {
        trip_id,
        stop_id,
        stop_sequence,
        departure_time,
    } = stop_time;
    match origins.entry(trip_id) {
        Entry::Vacant(entry) => {
            entry.insert(TripOrigin {
                stop_sequence,
                events: vec![(stop_id, departure_time)],
            });
        }
        Entry::Occupied(mut entry) => {
            let origin = entry.get_mut();
            match stop_sequence.cmp(&origin.stop_sequence) {
                Ordering::Less => {
                    origin.stop_sequence = stop_sequence;
                    origin.events = vec![(stop_id, departure_time)];
                }
                Ordering::Equal => origin.events.push((stop_id, departure_time)),
                Ordering::Greater => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_feed::{self, TestFeed};

    fn stop_time(trip: &str, stop: &str, sequence: u32, departure: &str) -> StopTime {
        StopTime {
            trip_id: TripId(trip.to_string()),
            stop_id: StopId(stop.to_string()),
            stop_sequence: sequence,
            departure_time: departure.to_string(),
        }
    }

    fn qualifying(trips: &[(&str, &str)]) -> HashMap<TripId, LineName> {
        trips
            .iter()
            .map(|(trip, line)| (TripId(trip.to_string()), LineName::new(line)))
            .collect()
    }

    fn times(schedule: &Schedule, line: &str, stop: &str) -> Vec<String> {
        schedule
            .times(&LineName::new(line), &StopId(stop.to_string()))
            .unwrap_or_default()
            .iter()
            .map(|time| time.to_string())
            .collect()
    }

    #[test]
    fn test_origin_is_minimum_sequence_not_first_row() {
        let rows = vec![
            stop_time("T1", "B", 2, "07:20:00"),
            stop_time("T1", "C", 3, "07:30:00"),
            stop_time("T1", "A", 1, "07:05:00"),
        ];
        let schedule =
            origin_departures(rows.into_iter().map(Ok), &qualifying(&[("T1", "20")])).unwrap();
        assert_eq!(times(&schedule, "20", "A"), vec!["07:05"]);
        assert!(schedule.times(&LineName::new("20"), &StopId("B".to_string())).is_none());
    }

    #[test]
    fn test_origin_sequence_need_not_be_one() {
        let rows = vec![
            stop_time("T1", "B", 7, "07:20:00"),
            stop_time("T1", "A", 5, "07:05:00"),
        ];
        let schedule =
            origin_departures(rows.into_iter().map(Ok), &qualifying(&[("T1", "20")])).unwrap();
        assert_eq!(times(&schedule, "20", "A"), vec!["07:05"]);
    }

    #[test]
    fn test_non_qualifying_trips_ignored() {
        let rows = vec![
            stop_time("T1", "A", 1, "07:05:00"),
            stop_time("T9", "A", 1, "09:00:00"),
        ];
        let schedule =
            origin_departures(rows.into_iter().map(Ok), &qualifying(&[("T1", "20")])).unwrap();
        assert_eq!(times(&schedule, "20", "A"), vec!["07:05"]);
    }

    #[test]
    fn test_duplicates_kept_until_written() {
        let rows = vec![
            stop_time("T1", "A", 1, "07:05:00"),
            stop_time("T2", "A", 1, "07:05:00"),
            stop_time("T3", "A", 1, "bad"),
        ];
        let schedule = origin_departures(
            rows.into_iter().map(Ok),
            &qualifying(&[("T1", "20"), ("T2", "20"), ("T3", "20")]),
        )
        .unwrap();
        assert_eq!(times(&schedule, "20", "A"), vec!["07:05", "07:05"]);
    }

    #[test]
    fn test_extract_from_archive() {
        let feed = TestFeed::new(&[("stop_times.txt", test_feed::STOP_TIMES)]);
        let mut archive = GtfsArchive::open(&feed.path).unwrap();
        let schedule = extract(&mut archive, &qualifying(&[("T1", "20")])).unwrap();
        assert_eq!(times(&schedule, "20", "A"), vec!["07:05"]);
    }

    #[test]
    fn test_extract_without_stop_times_table() {
        let feed = TestFeed::new(&[("stops.txt", test_feed::STOPS)]);
        let mut archive = GtfsArchive::open(&feed.path).unwrap();
        let result = extract(&mut archive, &qualifying(&[("T1", "20")]));
        assert!(matches!(result, Err(PipelineError::MissingTable { .. })));
    }
}
