#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod calendar;
mod routes;
mod shapes;
mod stop_times;
mod stops;
mod trips;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use anyhow::Result;
use zip::ZipArchive;

pub use calendar::service_ids_on;
pub use routes::{load_routes, RouteRecord};
pub use shapes::load_starting_points;
pub use stop_times::{parse_time_of_day, StopTimeRecord, StopTimes};
pub use stops::{load_stops, StopRecord};
pub use trips::{load_trips, TripRecord};

/// A GTFS feed archive. Entries are addressed by base file name, no matter
/// what directory prefix the feed was zipped with.
pub struct FeedArchive<R: Read + Seek> {
    archive: ZipArchive<R>,
    /// Base file name -> full entry path.
    entries: BTreeMap<String, String>,
}

impl FeedArchive<File> {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read + Seek> FeedArchive<R> {
    pub fn new(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;
        let mut entries = BTreeMap::new();
        for full_name in archive.file_names() {
            // Directory entries and macOS resource-fork junk aren't feed
            // resources.
            if full_name.ends_with('/') || full_name.starts_with("__MACOSX") {
                continue;
            }
            if let Some(base) = full_name.rsplit('/').next() {
                entries.insert(base.to_string(), full_name.to_string());
            }
        }
        Ok(Self { archive, entries })
    }

    /// Opens a fresh stream over one feed resource. A missing entry is an
    /// error; a whole stage of the import can't run without its source file.
    pub fn open(&mut self, name: &str) -> Result<zip::read::ZipFile<'_>> {
        let full_name = self
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("{name} is missing from the feed"))?;
        self.archive
            .by_name(&full_name)
            .map_err(|err| anyhow!("{name}: {err}"))
    }
}

/// All feed resources share one dialect: comma-delimited, double quotes
/// around values with embedded commas, sometimes a stray blank line at the
/// end. The csv crate handles all of that; headers are resolved once here
/// rather than per row.
pub(crate) fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read, Write};

    use super::FeedArchive;

    fn archive_with(entries: Vec<(&str, &str)>) -> FeedArchive<Cursor<Vec<u8>>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default();
        for (name, body) in entries {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        let mut cursor = zip.finish().unwrap();
        cursor.set_position(0);
        FeedArchive::new(cursor).unwrap()
    }

    #[test]
    fn entries_found_under_directory_prefix() {
        let mut archive = archive_with(vec![
            ("gtfs022118/calendar.txt", "service_id,monday\n5,1\n"),
            ("__MACOSX/gtfs022118/._calendar.txt", "junk"),
        ]);
        let mut body = String::new();
        archive
            .open("calendar.txt")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert!(body.starts_with("service_id"));
    }

    #[test]
    fn missing_entry_is_an_error() {
        let mut archive = archive_with(vec![("routes.txt", "route_id\n1\n")]);
        assert!(archive.open("stops.txt").is_err());
    }
}
