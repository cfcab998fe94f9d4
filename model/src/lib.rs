#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod bus;
mod event;
mod import;
mod route;
mod stop;
mod store;

use std::io::{Read, Seek};
use std::str::FromStr;

use anyhow::Result;
use chrono::Weekday;
use gtfs::FeedArchive;

pub use bus::Bus;
pub use event::Event;
pub use import::import_feed;
pub use route::Route;
pub use stop::Stop;
pub use store::{Store, StoreError, StoreResult};

impl Store {
    /// Creates a fresh store at the default path and fills it with one day of
    /// service from the feed.
    pub fn from_feed<R: Read + Seek>(archive: &mut FeedArchive<R>, day: Weekday) -> Result<Self> {
        let store = Self::create_default()?;
        import_feed(&store, archive, day)?;
        Ok(store)
    }

    /// `from_feed`, with the day given as a name like "monday".
    pub fn from_feed_named_day<R: Read + Seek>(
        archive: &mut FeedArchive<R>,
        day: &str,
    ) -> Result<Self> {
        Self::from_feed(archive, parse_weekday(day)?)
    }
}

/// Parses a day name, case-insensitively and ignoring surrounding whitespace.
/// Both full names ("monday") and abbreviations ("mon") work.
pub fn parse_weekday(name: &str) -> Result<Weekday> {
    Weekday::from_str(name.trim()).map_err(|_| anyhow!("{name} is not a day of the week"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_weekday_names() {
        assert_eq!(parse_weekday("monday").unwrap(), Weekday::Mon);
        assert_eq!(parse_weekday(" Saturday ").unwrap(), Weekday::Sat);
        assert_eq!(parse_weekday("SUN").unwrap(), Weekday::Sun);
        assert!(parse_weekday("notaday").is_err());
    }
}
