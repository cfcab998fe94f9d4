use std::collections::HashSet;
use std::io::Read;

use anyhow::Result;
use chrono::Weekday;
use serde::{Deserialize, Deserializer};

/// Collects the service IDs that run on the given day of the week, from the
/// feed's calendar resource. No ordering; duplicates collapse in the set.
pub fn service_ids_on<R: Read>(day: Weekday, reader: R) -> Result<HashSet<String>> {
    let mut service_ids = HashSet::new();
    for rec in crate::csv_reader(reader).deserialize() {
        let rec: Record = match rec {
            Ok(rec) => rec,
            Err(err) => {
                warn!("Skipping malformed calendar row: {err}");
                continue;
            }
        };
        if rec.runs_on(day) {
            service_ids.insert(rec.service_id);
        }
    }
    Ok(service_ids)
}

#[derive(Deserialize)]
struct Record {
    service_id: String,
    #[serde(deserialize_with = "parse_bool")]
    monday: bool,
    #[serde(deserialize_with = "parse_bool")]
    tuesday: bool,
    #[serde(deserialize_with = "parse_bool")]
    wednesday: bool,
    #[serde(deserialize_with = "parse_bool")]
    thursday: bool,
    #[serde(deserialize_with = "parse_bool")]
    friday: bool,
    #[serde(deserialize_with = "parse_bool")]
    saturday: bool,
    #[serde(deserialize_with = "parse_bool")]
    sunday: bool,
}

impl Record {
    fn runs_on(&self, day: Weekday) -> bool {
        match day {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }
}

fn parse_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let n = <u8>::deserialize(d)?;
    if n == 1 {
        return Ok(true);
    }
    if n == 0 {
        return Ok(false);
    }
    Err(serde::de::Error::custom(format!("Unknown bool value {n}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALENDAR: &str = "\
service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date
5,1,1,1,1,1,0,0,20180219,20180420
3,0,0,0,0,0,1,0,20180219,20180420
4,0,0,0,0,0,0,1,20180219,20180420
";

    #[test]
    fn weekday_service() {
        let ids = service_ids_on(Weekday::Mon, CALENDAR.as_bytes()).unwrap();
        assert_eq!(ids, HashSet::from(["5".to_string()]));
    }

    #[test]
    fn weekend_service() {
        let ids = service_ids_on(Weekday::Sat, CALENDAR.as_bytes()).unwrap();
        assert_eq!(ids, HashSet::from(["3".to_string()]));
        let ids = service_ids_on(Weekday::Sun, CALENDAR.as_bytes()).unwrap();
        assert_eq!(ids, HashSet::from(["4".to_string()]));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let calendar = "\
service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday
5,1,1,1,1,1,0,0
6,what,1,1,1,1,0,0
7,1,0,0,0,0,0,0
";
        let ids = service_ids_on(Weekday::Mon, calendar.as_bytes()).unwrap();
        assert_eq!(ids, HashSet::from(["5".to_string(), "7".to_string()]));
    }
}
