use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Read;

use anyhow::Result;
use geo::Point;
use serde::Deserialize;

/// Finds the starting coordinate of every shape: the point with the lowest
/// shape_pt_sequence, regardless of file order. Buses spawn there.
pub fn load_starting_points<R: Read>(reader: R) -> Result<HashMap<String, Point<f64>>> {
    let mut starts: HashMap<String, (u32, Point<f64>)> = HashMap::new();
    for rec in crate::csv_reader(reader).deserialize() {
        let rec: Record = match rec {
            Ok(rec) => rec,
            Err(err) => {
                warn!("Skipping malformed shape row: {err}");
                continue;
            }
        };
        let pt = Point::new(rec.shape_pt_lon, rec.shape_pt_lat);
        match starts.entry(rec.shape_id) {
            Entry::Occupied(mut entry) => {
                if rec.shape_pt_sequence <= entry.get().0 {
                    entry.insert((rec.shape_pt_sequence, pt));
                }
            }
            Entry::Vacant(entry) => {
                entry.insert((rec.shape_pt_sequence, pt));
            }
        }
    }
    Ok(starts
        .into_iter()
        .map(|(shape_id, (_, pt))| (shape_id, pt))
        .collect())
}

#[derive(Deserialize)]
struct Record {
    shape_id: String,
    shape_pt_lat: f64,
    shape_pt_lon: f64,
    shape_pt_sequence: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_sequence_wins_regardless_of_file_order() {
        let raw = "\
shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence
63698,33.921202,-84.344649,3
63698,33.900000,-84.300000,1
63698,33.910000,-84.320000,2
63699,33.752636,-84.417759,1
";
        let starts = load_starting_points(raw.as_bytes()).unwrap();
        assert_eq!(starts.len(), 2);
        assert_eq!(starts["63698"], Point::new(-84.3, 33.9));
        assert_eq!(starts["63699"], Point::new(-84.417759, 33.752636));
    }
}
