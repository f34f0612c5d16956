//! Small GTFS zip archives built on the fly for tests.

use std::io::Write;
use std::path::PathBuf;

use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const ROUTES: &str = "route_id,agency_id,route_short_name,route_type\n\
R20,1,20,3\n\
R20A,1,20A,3\n\
R99,1,99,3\n";

pub const TRIPS: &str = "route_id,service_id,trip_id\n\
R20,S1,T1\n";

/// 2024-03-04 is a Monday.
pub const CALENDAR: &str =
    "service_id,sunday,monday,tuesday,wednesday,thursday,friday,saturday,start_date,end_date\n\
S1,0,1,0,0,0,0,0,20240101,20241231\n";

pub const STOPS: &str = "stop_id,stop_code,stop_name,stop_lat,stop_lon\n\
A,1001,Central Station,32.0,34.8\n\
B,1002,Market,32.1,34.8\n\
C,,Depot Platform,32.2,34.8\n\
D,1004,Harbour,32.3,34.8\n";

pub const STOP_TIMES: &str = "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
T1,07:05:00,07:05:00,A,1\n\
T1,07:20:00,07:20:00,B,2\n";

pub struct TestFeed {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestFeed {
    pub fn new(tables: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gtfs.zip");
        let mut zip = ZipWriter::new(std::fs::File::create(&path).unwrap());
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in tables {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        TestFeed { dir, path }
    }

    /// The one-line feed: route "20", trip T1 on Mondays from stop A at 07:05.
    pub fn standard() -> Self {
        Self::new(&[
            ("routes.txt", ROUTES),
            ("trips.txt", TRIPS),
            ("calendar.txt", CALENDAR),
            ("stops.txt", STOPS),
            ("stop_times.txt", STOP_TIMES),
        ])
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
