use std::io::Read;

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RouteRecord {
    pub route_id: String,
    pub route_short_name: String,
    pub route_long_name: String,
}

/// Reads every route row, skipping (and logging) any that don't parse.
pub fn load_routes<R: Read>(reader: R) -> Result<Vec<RouteRecord>> {
    let mut routes = Vec::new();
    for rec in crate::csv_reader(reader).deserialize() {
        match rec {
            Ok(rec) => routes.push(rec),
            Err(err) => warn!("Skipping malformed route row: {err}"),
        }
    }
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load() {
        let raw = "\
route_id,route_short_name,route_long_name,route_type
7634,1,Centennial Oly. Park/Coronet Way,3
8747,RED,RED-North South North Springs Line,1
";
        let routes = load_routes(raw.as_bytes()).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].route_id, "7634");
        assert_eq!(routes[0].route_short_name, "1");
        assert_eq!(routes[1].route_long_name, "RED-North South North Springs Line");
    }
}
