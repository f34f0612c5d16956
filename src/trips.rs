use chrono::NaiveDate;
use indicatif::ProgressIterator;
use std::collections::{HashMap, HashSet};

use super::archive::GtfsArchive;
use super::config::Config;
use super::error::PipelineError;
use super::records::{Route, RouteId, ServiceId, StopId, StopTime, Trip, TripId};
use super::schedule::LineName;
use super::utils::progress_spinner_for_rows;

#[derive(Clone, Debug)]
pub struct LineTrip {
    pub trip_id: TripId,
    pub service_id: ServiceId,
    pub line: LineName,
}

/// Trips of the configured lines, before any date or stop filtering. Loaded once
/// per run and narrowed per service day.
#[derive(Debug, Default)]
pub struct TargetLineTrips {
    trips: Vec<LineTrip>,
}

impl TargetLineTrips {
    pub fn load(archive: &mut GtfsArchive, config: &Config) -> Result<Self, PipelineError> {
        let route_lines = route_lines(archive)?;

        log::info!("Mapping trips of target lines from {}", Trip::TABLE);
        let mut trips = Vec::new();
        for trip in archive.rows::<Trip>(Trip::TABLE, Trip::REQUIRED)? {
            let trip = trip?;
            let Some(line) = route_lines.get(&trip.route_id) else {
                continue;
            };
            if config.is_target_line(&line.0) {
                trips.push(LineTrip {
                    trip_id: trip.trip_id,
                    service_id: trip.service_id,
                    line: line.clone(),
                });
            }
        }
        log::debug!("Found {} trips on target lines", trips.len());
        Ok(TargetLineTrips { trips })
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    /// Trips that run on `date` (service id in `active`) and, when a stop filter is
    /// in force, visit one of the target stops.
    pub fn qualifying(
        &self,
        active: &HashSet<ServiceId>,
        visiting_target_stops: Option<&HashSet<TripId>>,
        date: NaiveDate,
    ) -> Result<HashMap<TripId, LineName>, PipelineError> {
        let qualifying: HashMap<TripId, LineName> = self
            .trips
            .iter()
            .filter(|trip| active.contains(&trip.service_id))
            .filter(|trip| {
                visiting_target_stops.is_none_or(|visiting| visiting.contains(&trip.trip_id))
            })
            .map(|trip| (trip.trip_id.clone(), trip.line.clone()))
            .collect();

        log::info!(
            "Identified {} relevant trips on {date} after filtering by lines, services and stops",
            qualifying.len()
        );
        if qualifying.is_empty() {
            return Err(PipelineError::NoQualifyingTrips { date });
        }
        Ok(qualifying)
    }
}

/// route_id to public line label, for every route in the feed.
pub fn route_lines(archive: &mut GtfsArchive) -> Result<HashMap<RouteId, LineName>, PipelineError> {
    log::info!("Mapping route ids from {}", Route::TABLE);
    archive
        .rows::<Route>(Route::TABLE, Route::REQUIRED)?
        .map(|route| route.map(|route| (route.route_id, LineName::new(&route.route_short_name))))
        .collect()
}

/// Trips that call at any of `target_stops`. `None` when there is nothing to filter
/// on, meaning no trip is excluded on geography.
pub fn trips_visiting(
    archive: &mut GtfsArchive,
    target_stops: &HashSet<StopId>,
) -> Result<Option<HashSet<TripId>>, PipelineError> {
    if target_stops.is_empty() {
        log::warn!("No target stop ids resolved. Proceeding without geographic filtering.");
        return Ok(None);
    }

    log::info!("Filtering trips by target stop ids: {target_stops:?}");
    let mut visiting = HashSet::new();
    let progress = progress_spinner_for_rows(StopTime::TABLE);
    for stop_time in archive
        .rows::<StopTime>(StopTime::TABLE, StopTime::REQUIRED)?
        .progress_with(progress)
    {
        let stop_time = stop_time?;
        if target_stops.contains(&stop_time.stop_id) {
            visiting.insert(stop_time.trip_id);
        }
    }
    log::debug!("Identified {} trips that pass through the target stops", visiting.len());
    Ok(Some(visiting))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_feed::{self, TestFeed};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn config(lines: &[&str]) -> Config {
        Config {
            target_lines: lines.iter().map(|line| line.to_string()).collect(),
            target_stop_codes: Default::default(),
        }
    }

    fn services(ids: &[&str]) -> HashSet<ServiceId> {
        ids.iter().map(|id| ServiceId(id.to_string())).collect()
    }

    const TRIPS: &str = "route_id,service_id,trip_id\n\
R20,S1,T1\n\
R20,S2,T2\n\
R20A,S1,T3\n\
R99,S1,T4\n";

    const STOP_TIMES: &str = "trip_id,departure_time,stop_id,stop_sequence\n\
T1,07:05:00,A,1\n\
T1,07:20:00,B,2\n\
T3,08:00:00,C,1\n\
T4,09:00:00,B,1\n";

    fn feed() -> TestFeed {
        TestFeed::new(&[
            ("routes.txt", test_feed::ROUTES),
            ("trips.txt", TRIPS),
            ("stops.txt", test_feed::STOPS),
            ("stop_times.txt", STOP_TIMES),
        ])
    }

    #[test]
    fn test_joins_lines_and_services() {
        let feed = feed();
        let mut archive = GtfsArchive::open(&feed.path).unwrap();
        let trips = TargetLineTrips::load(&mut archive, &config(&["20", "20A"])).unwrap();
        assert_eq!(trips.len(), 3);

        let qualifying = trips.qualifying(&services(&["S1"]), None, date()).unwrap();
        assert_eq!(qualifying.len(), 2);
        assert_eq!(qualifying[&TripId("T1".to_string())], LineName::new("20"));
        assert_eq!(qualifying[&TripId("T3".to_string())], LineName::new("20A"));
    }

    #[test]
    fn test_stop_filter_narrows_trips() {
        let feed = feed();
        let mut archive = GtfsArchive::open(&feed.path).unwrap();
        let trips = TargetLineTrips::load(&mut archive, &config(&["20", "20A"])).unwrap();
        let target_stops = HashSet::from([StopId("B".to_string())]);
        let visiting = trips_visiting(&mut archive, &target_stops).unwrap().unwrap();

        let qualifying = trips
            .qualifying(&services(&["S1"]), Some(&visiting), date())
            .unwrap();
        assert_eq!(qualifying.keys().collect::<Vec<_>>(), vec![&TripId("T1".to_string())]);
    }

    #[test]
    fn test_unresolved_stop_filter_excludes_nothing() {
        let feed = feed();
        let mut archive = GtfsArchive::open(&feed.path).unwrap();
        let trips = TargetLineTrips::load(&mut archive, &config(&["20", "20A"])).unwrap();

        let stops = crate::stops::StopIndex::load(&mut archive).unwrap();
        let unknown_codes = ["99999".to_string()].into_iter().collect();
        let target_stops = stops.resolve_codes(&unknown_codes);
        let visiting = trips_visiting(&mut archive, &target_stops).unwrap();
        assert!(visiting.is_none());

        let filtered = trips
            .qualifying(&services(&["S1"]), visiting.as_ref(), date())
            .unwrap();
        let unfiltered = trips.qualifying(&services(&["S1"]), None, date()).unwrap();
        assert_eq!(filtered, unfiltered);
    }

    #[test]
    fn test_no_qualifying_trips_is_an_error() {
        let feed = feed();
        let mut archive = GtfsArchive::open(&feed.path).unwrap();
        let trips = TargetLineTrips::load(&mut archive, &config(&["20"])).unwrap();
        let result = trips.qualifying(&services(&["S9"]), None, date());
        assert!(matches!(result, Err(PipelineError::NoQualifyingTrips { .. })));
    }
}
