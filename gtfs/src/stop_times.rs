use std::io::Read;

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct StopTimeRecord {
    pub trip_id: String,
    pub arrival_time: String,
    pub departure_time: String,
    pub stop_id: String,
    pub stop_sequence: u32,
}

/// Streaming iterator over stop_times.txt, the largest resource in a feed.
/// The file is grouped by trip (one contiguous run of rows per trip), not
/// globally sorted; callers that care about runs detect trip-ID changes.
/// Malformed rows are logged and skipped.
pub struct StopTimes<R: Read> {
    records: csv::DeserializeRecordsIntoIter<R, StopTimeRecord>,
}

impl<R: Read> StopTimes<R> {
    pub fn new(reader: R) -> Self {
        Self {
            records: crate::csv_reader(reader).into_deserialize(),
        }
    }
}

impl<R: Read> Iterator for StopTimes<R> {
    type Item = StopTimeRecord;

    fn next(&mut self) -> Option<StopTimeRecord> {
        loop {
            match self.records.next()? {
                Ok(rec) => return Some(rec),
                Err(err) => warn!("Skipping malformed stop_time row: {err}"),
            }
        }
    }
}

/// Converts an HH:MM:SS timestamp to seconds since midnight. Hours past 23
/// are legal; GTFS uses them for service running past midnight.
pub fn parse_time_of_day(raw: &str) -> Result<u32> {
    let mut parts = raw.trim().split(':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(s), None) => {
            let hours: u32 = h.parse()?;
            let minutes: u32 = m.parse()?;
            let seconds: u32 = s.parse()?;
            Ok(seconds + 60 * minutes + 3600 * hours)
        }
        _ => bail!("Not an HH:MM:SS timestamp: {raw}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_times() {
        assert_eq!(parse_time_of_day("00:00:00").unwrap(), 0);
        assert_eq!(parse_time_of_day("08:30:15").unwrap(), 8 * 3600 + 30 * 60 + 15);
        // Next-day service keeps counting.
        assert_eq!(parse_time_of_day("25:01:00").unwrap(), 25 * 3600 + 60);
        assert!(parse_time_of_day("8:30").is_err());
        assert!(parse_time_of_day("a:b:c").is_err());
        assert!(parse_time_of_day("1:2:3:4").is_err());
    }

    #[test]
    fn streams_rows_and_skips_bad_ones() {
        let raw = "\
trip_id,arrival_time,departure_time,stop_id,stop_sequence
6053989,06:16:00,06:16:00,212140,1
6053989,06:17:30,06:17:30,907933,garbage
6053989,06:19:00,06:19:00,212054,2
";
        let recs: Vec<_> = StopTimes::new(raw.as_bytes()).collect();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].stop_id, "212140");
        assert_eq!(recs[1].stop_sequence, 2);
    }
}
