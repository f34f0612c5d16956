use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
pub struct RouteId(pub String);

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
pub struct TripId(pub String);

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
pub struct ServiceId(pub String);

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
pub struct StopId(pub String);

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row of routes.txt
#[derive(Debug, Deserialize)]
pub struct Route {
    pub route_id: RouteId,
    #[serde(default)]
    pub route_short_name: String,
}

impl Route {
    pub const TABLE: &'static str = "routes.txt";
    pub const REQUIRED: &'static [&'static str] = &["route_id", "route_short_name"];
}

/// Row of trips.txt
#[derive(Debug, Deserialize)]
pub struct Trip {
    pub route_id: RouteId,
    pub service_id: ServiceId,
    pub trip_id: TripId,
}

impl Trip {
    pub const TABLE: &'static str = "trips.txt";
    pub const REQUIRED: &'static [&'static str] = &["route_id", "service_id", "trip_id"];
}

/// Row of stops.txt. A blank `stop_code` is common for stations and platforms.
#[derive(Debug, Deserialize)]
pub struct Stop {
    pub stop_id: StopId,
    #[serde(default)]
    pub stop_code: String,
    #[serde(default)]
    pub stop_name: String,
}

impl Stop {
    pub const TABLE: &'static str = "stops.txt";
    pub const REQUIRED: &'static [&'static str] = &["stop_id", "stop_code", "stop_name"];
}

/// Row of stop_times.txt. The departure time is kept raw so one bad value only
/// costs that event, not the whole scan.
#[derive(Debug, Deserialize)]
pub struct StopTime {
    pub trip_id: TripId,
    pub stop_id: StopId,
    pub stop_sequence: u32,
    #[serde(default)]
    pub departure_time: String,
}

impl StopTime {
    pub const TABLE: &'static str = "stop_times.txt";
    pub const REQUIRED: &'static [&'static str] =
        &["trip_id", "stop_id", "stop_sequence", "departure_time"];
}

/// Row of calendar.txt, the weekly recurrence scheme. Flags are "1" or "0".
#[derive(Debug, Deserialize)]
pub struct WeeklyCalendar {
    pub service_id: ServiceId,
    pub sunday: String,
    pub monday: String,
    pub tuesday: String,
    pub wednesday: String,
    pub thursday: String,
    pub friday: String,
    pub saturday: String,
}

impl WeeklyCalendar {
    pub const TABLE: &'static str = "calendar.txt";
    pub const REQUIRED: &'static [&'static str] = &[
        "service_id",
        "sunday",
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
    ];

    /// Reads the flag of a weekday column by its GTFS name.
    pub fn runs_on(&self, day_column: &str) -> bool {
        let flag = match day_column {
            "sunday" => &self.sunday,
            "monday" => &self.monday,
            "tuesday" => &self.tuesday,
            "wednesday" => &self.wednesday,
            "thursday" => &self.thursday,
            "friday" => &self.friday,
            "saturday" => &self.saturday,
            _ => return false,
        };
        flag.trim() == "1"
    }
}

/// Row of calendar_dates.txt, the date exception scheme.
#[derive(Debug, Deserialize)]
pub struct CalendarDate {
    pub service_id: ServiceId,
    /// YYYYMMDD
    pub date: String,
    pub exception_type: String,
}

impl CalendarDate {
    pub const TABLE: &'static str = "calendar_dates.txt";
    pub const REQUIRED: &'static [&'static str] = &["service_id", "date", "exception_type"];

    pub fn exception(&self) -> Option<Exception> {
        match self.exception_type.trim() {
            "1" => Some(Exception::Added),
            "2" => Some(Exception::Removed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    Added,
    Removed,
}

/// A value for time past midnight in minutes, seconds discarded.
/// For example 8am is 480 minutes past midnight. GTFS allows hours past 24 for
/// trips running after midnight, so no upper bound is enforced.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct MinutesPastMidnight(pub u32);

impl FromStr for MinutesPastMidnight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(':');
        let (Some(hours), Some(minutes)) = (parts.next(), parts.next()) else {
            return Err(format!("Invalid time: {s:?}"));
        };
        let hours = hours
            .parse::<u32>()
            .map_err(|_| format!("Invalid hours in time: {s:?}"))?;
        let minutes = minutes
            .parse::<u32>()
            .map_err(|_| format!("Invalid minutes in time: {s:?}"))?;
        if minutes >= 60 {
            return Err(format!("Invalid minutes in time: {s:?}"));
        }
        hours
            .checked_mul(60)
            .and_then(|total| total.checked_add(minutes))
            .map(MinutesPastMidnight)
            .ok_or_else(|| format!("Time out of range: {s:?}"))
    }
}

impl fmt::Display for MinutesPastMidnight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}
