use serde::{Deserialize, Serialize};

use crate::Stop;

/// A bus route. The stop list is a derived view of the routeToStop linkage
/// table, ordered by stop index; `Store::extend_route` and
/// `Store::remove_from_route` keep the two in sync, so there's no public way
/// to grow or shrink the list directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub short_name: String,
    pub name: String,
    stops: Vec<Stop>,
}

impl Route {
    pub fn new(id: String, short_name: String, name: String) -> Self {
        Self {
            id,
            short_name,
            name,
            stops: Vec::new(),
        }
    }

    pub(crate) fn with_stops(
        id: String,
        short_name: String,
        name: String,
        stops: Vec<Stop>,
    ) -> Self {
        Self {
            id,
            short_name,
            name,
            stops,
        }
    }

    /// In the order the route visits them.
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub(crate) fn extend(&mut self, stop: Stop) {
        self.stops.push(stop);
    }

    pub(crate) fn remove_stop(&mut self, stop_id: &str) {
        if let Some(idx) = self.stops.iter().position(|s| s.id == stop_id) {
            self.stops.remove(idx);
        }
    }
}
