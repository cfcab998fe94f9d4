use std::io::Read;

use anyhow::Result;
use geo::Point;
use serde::Deserialize;

pub struct StopRecord {
    pub stop_id: String,
    pub stop_name: String,
    /// x is longitude, y is latitude.
    pub position: Point<f64>,
}

/// Reads every stop row. Stop names can contain commas inside double quotes
/// ("PEACHTREE ST SW @ MARTIN L KING,JR DR"); the CSV layer reassembles
/// those. Rows that don't parse are logged and skipped.
pub fn load_stops<R: Read>(reader: R) -> Result<Vec<StopRecord>> {
    let mut stops = Vec::new();
    for rec in crate::csv_reader(reader).deserialize() {
        let rec: Record = match rec {
            Ok(rec) => rec,
            Err(err) => {
                warn!("Skipping malformed stop row: {err}");
                continue;
            }
        };
        stops.push(StopRecord {
            stop_id: rec.stop_id,
            stop_name: rec.stop_name,
            position: Point::new(rec.stop_lon, rec.stop_lat),
        });
    }
    Ok(stops)
}

#[derive(Deserialize)]
struct Record {
    stop_id: String,
    stop_name: String,
    stop_lat: f64,
    stop_lon: f64,
}
