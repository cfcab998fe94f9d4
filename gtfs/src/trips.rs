use std::collections::BTreeMap;
use std::io::Read;

use anyhow::Result;
use serde::Deserialize;

pub struct TripRecord {
    pub trip_id: String,
    pub route_id: String,
    pub service_id: String,
    pub shape_id: Option<String>,
    /// direction_id 0 in GTFS. Outbound/inbound labels are arbitrary; what
    /// matters is that the two directions traverse stops in opposite order.
    pub outbound: bool,
}

/// Reads every trip row, keyed by trip ID. Malformed rows and duplicate IDs
/// are logged and skipped (the first occurrence of an ID wins).
pub fn load_trips<R: Read>(reader: R) -> Result<BTreeMap<String, TripRecord>> {
    let mut trips = BTreeMap::new();
    for rec in crate::csv_reader(reader).deserialize() {
        let rec: Record = match rec {
            Ok(rec) => rec,
            Err(err) => {
                warn!("Skipping malformed trip row: {err}");
                continue;
            }
        };
        if trips.contains_key(&rec.trip_id) {
            warn!("Duplicate trip {}; keeping the first row", rec.trip_id);
            continue;
        }
        trips.insert(
            rec.trip_id.clone(),
            TripRecord {
                trip_id: rec.trip_id,
                route_id: rec.route_id,
                service_id: rec.service_id,
                shape_id: rec.shape_id.filter(|id| !id.is_empty()),
                outbound: rec.direction_id == "0",
            },
        );
    }
    Ok(trips)
}

#[derive(Deserialize)]
struct Record {
    trip_id: String,
    route_id: String,
    service_id: String,
    direction_id: String,
    shape_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load() {
        let raw = "\
route_id,service_id,trip_id,direction_id,shape_id
7634,5,6053989,0,63698
7634,5,6053990,1,63699
8747,3,6060000,0,
";
        let trips = load_trips(raw.as_bytes()).unwrap();
        assert_eq!(trips.len(), 3);
        assert!(trips["6053989"].outbound);
        assert!(!trips["6053990"].outbound);
        assert_eq!(trips["6053989"].shape_id.as_deref(), Some("63698"));
        // An empty shape_id means the trip has no geometry.
        assert_eq!(trips["6060000"].shape_id, None);
    }
}
