use super::records::MinutesPastMidnight;

/// A gap longer than this between consecutive departures starts a new band.
pub const BAND_GAP_MINUTES: u32 = 60;

/// First and last departure of a run of departures no more than
/// `BAND_GAP_MINUTES` apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeBand {
    pub start: MinutesPastMidnight,
    pub end: MinutesPastMidnight,
}

/// Collapses departures into bands. Only the envelope of each band survives.
pub fn collapse(times: &[MinutesPastMidnight]) -> Vec<TimeBand> {
    let mut sorted = times.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut bands: Vec<TimeBand> = Vec::new();
    for time in sorted {
        match bands.last_mut() {
            Some(band) if time.0 - band.end.0 <= BAND_GAP_MINUTES => band.end = time,
            _ => bands.push(TimeBand {
                start: time,
                end: time,
            }),
        }
    }
    bands
}
