use fs_err::read_to_string;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::error::PipelineError;
use super::records::{MinutesPastMidnight, StopId};
use super::stops::StopIndex;
use super::utils::write_lines_atomically;

/// A line's public label (route_short_name).
///
/// Lines order by their leading number, so "20" < "20A" < "22" < "163", and fall
/// back to the label text; labels without a leading number come last.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LineName(pub String);

impl LineName {
    pub fn new(label: &str) -> Self {
        LineName(label.trim().to_string())
    }

    fn numeric_prefix(&self) -> Option<u64> {
        let digits: String = self.0.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    fn sort_key(&self) -> (bool, u64, &str) {
        match self.numeric_prefix() {
            Some(number) => (false, number, &self.0),
            None => (true, 0, &self.0),
        }
    }
}

impl Ord for LineName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for LineName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Origin departures grouped by line and stop for one service day. Times are
/// appended as found; `to_lines` deduplicates and sorts them.
#[derive(Debug, Default)]
pub struct Schedule {
    groups: BTreeMap<LineName, BTreeMap<StopId, Vec<MinutesPastMidnight>>>,
}

impl Schedule {
    pub fn push(&mut self, line: LineName, stop_id: StopId, time: MinutesPastMidnight) {
        self.groups
            .entry(line)
            .or_default()
            .entry(stop_id)
            .or_default()
            .push(time);
    }

    pub fn line_count(&self) -> usize {
        self.groups.len()
    }

    #[cfg(test)]
    pub fn times(&self, line: &LineName, stop_id: &StopId) -> Option<&[MinutesPastMidnight]> {
        self.groups
            .get(line)
            .and_then(|stops| stops.get(stop_id))
            .map(Vec::as_slice)
    }

    pub fn to_lines(&self, stops: &StopIndex, day_offset: Option<u32>) -> Vec<ScheduleLine> {
        let mut lines = Vec::new();
        for (line, by_stop) in self.groups.iter() {
            for (stop_id, times) in by_stop.iter() {
                let (stop_code, stop_name) = match stops.get(stop_id) {
                    Some(info) => (info.code.clone(), info.name.clone()),
                    None => {
                        log::warn!("Stop {stop_id} of line {line} is not in the stop index");
                        (stop_id.0.clone(), String::new())
                    }
                };
                lines.push(ScheduleLine::new(
                    &line.0,
                    &stop_code,
                    &stop_name,
                    day_offset,
                    times.clone(),
                ));
            }
        }
        lines
    }
}

/// One record of the schedule file:
///
/// ```text
/// <line>|<stop_code>|<stop_name>:<HH:MM>,<HH:MM>,...
/// <line>|<stop_code>|<stop_name>|<day_offset>:<HH:MM>,<HH:MM>,...
/// ```
///
/// The weekly file carries the day offset; the daily file does not. Both the
/// writer and every reader of the file go through this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleLine {
    pub line: String,
    pub stop_code: String,
    pub stop_name: String,
    pub day_offset: Option<u32>,
    /// Sorted and deduplicated.
    pub times: Vec<MinutesPastMidnight>,
}

impl ScheduleLine {
    pub fn new(
        line: &str,
        stop_code: &str,
        stop_name: &str,
        day_offset: Option<u32>,
        mut times: Vec<MinutesPastMidnight>,
    ) -> Self {
        times.sort_unstable();
        times.dedup();
        ScheduleLine {
            line: clean_field(line),
            stop_code: clean_field(stop_code),
            stop_name: clean_field(stop_name),
            day_offset,
            times,
        }
    }

    pub fn with_day_offset(mut self, day_offset: u32) -> Self {
        self.day_offset = Some(day_offset);
        self
    }

    /// Parses one line of a schedule file; `line_number` is 1-based and only used
    /// in the error.
    pub fn parse(line_number: usize, text: &str) -> Result<Self, PipelineError> {
        text.parse().map_err(|_| PipelineError::MalformedLine {
            line_number,
            line: text.to_string(),
        })
    }
}

/// `|` and `:` delimit the format, so they cannot appear inside a field.
pub fn clean_field(value: &str) -> String {
    value.replace(['|', ':'], " ").trim().to_string()
}

impl fmt::Display for ScheduleLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.line, self.stop_code, self.stop_name)?;
        if let Some(day_offset) = self.day_offset {
            write!(f, "|{day_offset}")?;
        }
        f.write_str(":")?;
        for (i, time) in self.times.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{time}")?;
        }
        Ok(())
    }
}

impl FromStr for ScheduleLine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, times) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("No ':' separator in {s:?}"))?;
        let fields: Vec<&str> = key.split('|').map(str::trim).collect();
        let day_offset = match fields.len() {
            3 => None,
            4 => Some(
                fields[3]
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid day offset {:?}", fields[3]))?,
            ),
            n => return Err(format!("Expected 3 or 4 key fields, found {n}")),
        };
        let times = times
            .split(',')
            .map(str::trim)
            .filter(|time| !time.is_empty())
            .map(MinutesPastMidnight::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if times.is_empty() {
            return Err(format!("No departure times in {s:?}"));
        }
        Ok(ScheduleLine::new(
            fields[0], fields[1], fields[2], day_offset, times,
        ))
    }
}

/// Writes the schedule file, replacing whatever was at `path`.
pub fn write_schedule(path: &Path, lines: &[ScheduleLine]) -> Result<(), PipelineError> {
    log::info!(
        "Writing {} schedule lines to {}. Existing file will be overwritten.",
        lines.len(),
        path.display()
    );
    write_lines_atomically(path, lines)?;
    Ok(())
}

/// Reads a schedule file back. Malformed lines are logged and skipped.
pub fn read_schedule(path: &Path) -> Result<Vec<ScheduleLine>, PipelineError> {
    let text = read_to_string(path)?;
    let mut lines = Vec::new();
    for (index, text_line) in text.lines().enumerate() {
        if text_line.trim().is_empty() {
            continue;
        }
        match ScheduleLine::parse(index + 1, text_line) {
            Ok(line) => lines.push(line),
            Err(e) => log::warn!("{e}. Skipping line."),
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Stop;

    fn time(s: &str) -> MinutesPastMidnight {
        MinutesPastMidnight::from_str(s).unwrap()
    }

    fn stop_index() -> StopIndex {
        let mut index = StopIndex::default();
        index.insert(Stop {
            stop_id: StopId("A".to_string()),
            stop_code: "1001".to_string(),
            stop_name: "Central Station".to_string(),
        });
        index
    }

    #[test]
    fn test_line_ordering() {
        let mut names: Vec<LineName> = ["163", "20A", "N12", "22", "20", "20א", "127", "Express"]
            .iter()
            .map(|name| LineName::new(name))
            .collect();
        names.sort();
        let sorted: Vec<&str> = names.iter().map(|name| name.0.as_str()).collect();
        assert_eq!(
            sorted,
            vec!["20", "20A", "20א", "22", "127", "163", "Express", "N12"]
        );
    }

    #[test]
    fn test_duplicate_times_written_once() {
        let mut schedule = Schedule::default();
        let line = LineName::new("20");
        let stop = StopId("A".to_string());
        for t in ["08:10", "07:05", "08:10"] {
            schedule.push(line.clone(), stop.clone(), time(t));
        }

        let lines = schedule.to_lines(&stop_index(), None);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].to_string(), "20|1001|Central Station:07:05,08:10");
    }

    #[test]
    fn test_unknown_stop_keeps_its_times() {
        let mut schedule = Schedule::default();
        schedule.push(LineName::new("20"), StopId("Z".to_string()), time("09:00"));
        let lines = schedule.to_lines(&stop_index(), Some(2));
        assert_eq!(lines[0].to_string(), "20|Z||2:09:00");
    }

    #[test]
    fn test_delimiters_removed_from_fields() {
        let line = ScheduleLine::new("20", "1001", "Terminal | Gate: 3", None, vec![time("06:00")]);
        assert_eq!(line.to_string(), "20|1001|Terminal   Gate  3:06:00");
    }

    #[test]
    fn test_parse_weekly_line() {
        let line = ScheduleLine::parse(1, "20|1001|Central Station|3:06:00,06:15").unwrap();
        assert_eq!(line.line, "20");
        assert_eq!(line.stop_name, "Central Station");
        assert_eq!(line.day_offset, Some(3));
        assert_eq!(line.times, vec![time("06:00"), time("06:15")]);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        for text in ["20|1001:06:00", "no separator", "20|1001|Name|x:06:00", "20|1001|Name:"] {
            assert!(matches!(
                ScheduleLine::parse(7, text),
                Err(PipelineError::MalformedLine { line_number: 7, .. })
            ));
        }
    }

    #[test]
    fn test_read_schedule_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule2.txt");
        fs_err::write(
            &path,
            "20|1001|Central Station|0:07:05\nbroken line\n\n22|1002|Market|1:08:00\n",
        )
        .unwrap();

        let lines = read_schedule(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].line, "22");
    }

    #[test]
    fn test_written_lines_read_back_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.txt");
        let lines = vec![
            ScheduleLine::new("20", "1001", "Central Station", Some(0), vec![time("07:05")]),
            ScheduleLine::new("22", "1002", "Market", Some(1), vec![time("08:00"), time("25:10")]),
        ];
        write_schedule(&path, &lines).unwrap();
        assert_eq!(read_schedule(&path).unwrap(), lines);
    }
}
