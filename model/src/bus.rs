use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Route, Stop};

/// One scheduled vehicle run (a GTFS trip). The route reference is
/// non-owning; the store resolves it by ID when the bus is read back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: String,
    route: Option<Route>,
    pub outbound: bool,
    /// Index into the route's stop list of the stop the bus is at or last
    /// visited. None before the bus reaches its first stop.
    current_stop: Option<usize>,
    pub latitude: f64,
    pub longitude: f64,
    pub passengers: u32,
    pub passenger_capacity: u32,
    pub fuel: f64,
    pub fuel_capacity: f64,
    pub speed: f64,
}

impl Bus {
    pub const DEFAULT_PASSENGER_CAPACITY: u32 = 50;
    pub const DEFAULT_FUEL_CAPACITY: f64 = 100.0;

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        route: Option<Route>,
        outbound: bool,
        latitude: f64,
        longitude: f64,
        passengers: u32,
        passenger_capacity: u32,
        fuel: f64,
        fuel_capacity: f64,
        speed: f64,
    ) -> Self {
        Self {
            id,
            route,
            outbound,
            current_stop: None,
            latitude,
            longitude,
            passengers,
            passenger_capacity,
            fuel,
            fuel_capacity,
            speed,
        }
    }

    pub(crate) fn from_row(mut bus: Bus, current_stop: i64) -> Self {
        if current_stop >= 0 {
            bus.current_stop = Some(current_stop as usize);
        }
        bus
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn set_route(&mut self, route: Option<Route>) {
        self.route = route;
        // A stale index can't survive a route change.
        if let Some(idx) = self.current_stop {
            if self.route.as_ref().map_or(true, |r| idx >= r.stops().len()) {
                self.current_stop = None;
            }
        }
    }

    pub fn current_stop_index(&self) -> Option<usize> {
        self.current_stop
    }

    /// Fails unless the index points inside the bus's route. None (not yet at
    /// any stop) is always accepted.
    pub fn set_current_stop_index(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(idx) = index {
            let route = match &self.route {
                Some(route) => route,
                None => bail!("bus {} has no route, so it can't be at stop index {idx}", self.id),
            };
            if idx >= route.stops().len() {
                bail!(
                    "stop index {idx} is out of range for route {} ({} stops)",
                    route.id,
                    route.stops().len()
                );
            }
        }
        self.current_stop = index;
        Ok(())
    }

    /// The stop the bus is at or most recently visited.
    pub fn current_stop(&self) -> Option<&Stop> {
        self.route.as_ref()?.stops().get(self.current_stop?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(route: Option<Route>) -> Bus {
        Bus::new(
            "0".to_string(),
            route,
            true,
            0.0,
            0.0,
            0,
            0,
            0.0,
            0.0,
            0.0,
        )
    }

    fn route_with_two_stops() -> (Route, Stop, Stop) {
        let first = Stop::new("0".to_string(), "0".to_string(), 0.0, 0.0);
        let second = Stop::new("1".to_string(), "1".to_string(), 1.0, 1.0);
        let route = Route::with_stops(
            "0".to_string(),
            "0".to_string(),
            "0".to_string(),
            vec![first.clone(), second.clone()],
        );
        (route, first, second)
    }

    #[test]
    fn set_current_stop_index_with_no_route() {
        let mut bus = bus(None);
        assert!(bus.set_current_stop_index(None).is_ok());
        assert!(bus.set_current_stop_index(Some(0)).is_err());
    }

    #[test]
    fn set_current_stop_index_too_large() {
        let (route, _, _) = route_with_two_stops();
        let mut bus = bus(Some(route));
        assert!(bus.set_current_stop_index(Some(2)).is_err());
        assert_eq!(bus.current_stop_index(), None);
    }

    #[test]
    fn set_current_stop_index_walks_the_route() {
        let (route, first, second) = route_with_two_stops();
        let mut bus = bus(Some(route));
        assert_eq!(bus.current_stop(), None);

        bus.set_current_stop_index(Some(0)).unwrap();
        assert_eq!(bus.current_stop_index(), Some(0));
        assert_eq!(bus.current_stop(), Some(&first));

        bus.set_current_stop_index(Some(1)).unwrap();
        assert_eq!(bus.current_stop_index(), Some(1));
        assert_eq!(bus.current_stop(), Some(&second));

        bus.set_current_stop_index(None).unwrap();
        assert_eq!(bus.current_stop(), None);
    }

    #[test]
    fn route_change_clears_stale_index() {
        let (route, _, _) = route_with_two_stops();
        let mut bus = bus(Some(route));
        bus.set_current_stop_index(Some(1)).unwrap();

        bus.set_route(None);
        assert_eq!(bus.current_stop_index(), None);
    }
}
