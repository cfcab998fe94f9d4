use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use crate::{Bus, Event, Route, Stop};

#[derive(Debug, Error)]
pub enum StoreError {
    /// An insert hit an existing primary key.
    #[error("conflict: a {entity} with id {key} already exists")]
    Conflict { entity: &'static str, key: String },
    /// An update or delete matched no row.
    #[error("no {entity} matching {key}")]
    NotFound { entity: &'static str, key: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

const SCHEMA: &str = "
DROP TABLE IF EXISTS bus;
CREATE TABLE bus (id TEXT PRIMARY KEY, route TEXT, outbound INTEGER, currentStop INTEGER, latitude REAL, longitude REAL, passengers INTEGER, passengerCapacity INTEGER, fuel REAL, fuelCapacity REAL, speed REAL);
DROP TABLE IF EXISTS route;
CREATE TABLE route (id TEXT PRIMARY KEY, shortName TEXT, name TEXT);
DROP TABLE IF EXISTS routeToStop;
CREATE TABLE routeToStop (routeId TEXT, stopId TEXT, stopIndex INTEGER);
DROP TABLE IF EXISTS stop;
CREATE TABLE stop (id TEXT PRIMARY KEY, name TEXT, riders INTEGER, previousRiders INTEGER, latitude REAL, longitude REAL);
DROP TABLE IF EXISTS event;
CREATE TABLE event (busId TEXT, stopId TEXT, arrivalTime INTEGER, departureTime INTEGER);
";

/// Handle to the relational store. All reads and writes go through here; one
/// handle owns one SQLite connection, everything is synchronous and blocking,
/// and callers needing concurrency must synchronize externally.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Where `create_default` puts the store, relative to the working
    /// directory.
    pub const DEFAULT_PATH: &'static str = "bus_sim.db";

    /// Creates a store at the given path, wiping whatever was there.
    pub fn create<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let store = Self::open(path)?;
        store.clear()?;
        Ok(store)
    }

    pub fn create_default() -> StoreResult<Self> {
        Self::create(Self::DEFAULT_PATH)
    }

    /// Opens an existing store without touching its contents.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// An empty store that never touches disk.
    pub fn in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.clear()?;
        Ok(store)
    }

    /// Drops and recreates all five tables.
    pub fn clear(&self) -> StoreResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn insert(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        entity: &'static str,
        key: &str,
    ) -> StoreResult<()> {
        match self.conn.execute(sql, params) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Conflict {
                    entity,
                    key: key.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn require_match(
        affected: usize,
        entity: &'static str,
        key: impl ToString,
    ) -> StoreResult<()> {
        if affected == 0 {
            return Err(StoreError::NotFound {
                entity,
                key: key.to_string(),
            });
        }
        Ok(())
    }

    pub fn add_route(&self, route: &Route) -> StoreResult<()> {
        self.insert(
            "INSERT INTO route (id, shortName, name) VALUES (?1, ?2, ?3)",
            params![route.id, route.short_name, route.name],
            "route",
            &route.id,
        )
    }

    pub fn add_stop(&self, stop: &Stop) -> StoreResult<()> {
        self.insert(
            "INSERT INTO stop (id, name, riders, previousRiders, latitude, longitude) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                stop.id,
                stop.name,
                stop.riders(),
                stop.previous_riders(),
                stop.latitude,
                stop.longitude
            ],
            "stop",
            &stop.id,
        )
    }

    pub fn add_bus(&self, bus: &Bus) -> StoreResult<()> {
        self.insert(
            "INSERT INTO bus (id, route, outbound, currentStop, latitude, longitude, \
             passengers, passengerCapacity, fuel, fuelCapacity, speed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                bus.id,
                bus.route().map(|r| r.id.as_str()),
                bus.outbound,
                stop_index_to_db(bus.current_stop_index()),
                bus.latitude,
                bus.longitude,
                bus.passengers,
                bus.passenger_capacity,
                bus.fuel,
                bus.fuel_capacity,
                bus.speed
            ],
            "bus",
            &bus.id,
        )
    }

    pub fn add_event(&self, event: &Event) -> StoreResult<()> {
        // Events have no primary key, so there's no conflict to detect.
        self.conn.execute(
            "INSERT INTO event (busId, stopId, arrivalTime, departureTime) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.bus_id,
                event.stop_id,
                event.arrival_time,
                event.departure_time
            ],
        )?;
        Ok(())
    }

    /// Full-row overwrite of a route's name fields. The stop list is managed
    /// through `extend_route`/`remove_from_route` instead.
    pub fn update_route(&self, route: &Route) -> StoreResult<()> {
        let affected = self.conn.execute(
            "UPDATE route SET shortName = ?1, name = ?2 WHERE id = ?3",
            params![route.short_name, route.name, route.id],
        )?;
        Self::require_match(affected, "route", &route.id)
    }

    pub fn update_stop(&self, stop: &Stop) -> StoreResult<()> {
        let affected = self.conn.execute(
            "UPDATE stop SET name = ?1, riders = ?2, previousRiders = ?3, \
             latitude = ?4, longitude = ?5 WHERE id = ?6",
            params![
                stop.name,
                stop.riders(),
                stop.previous_riders(),
                stop.latitude,
                stop.longitude,
                stop.id
            ],
        )?;
        Self::require_match(affected, "stop", &stop.id)
    }

    pub fn update_bus(&self, bus: &Bus) -> StoreResult<()> {
        let affected = self.conn.execute(
            "UPDATE bus SET route = ?1, outbound = ?2, currentStop = ?3, latitude = ?4, \
             longitude = ?5, passengers = ?6, passengerCapacity = ?7, fuel = ?8, \
             fuelCapacity = ?9, speed = ?10 WHERE id = ?11",
            params![
                bus.route().map(|r| r.id.as_str()),
                bus.outbound,
                stop_index_to_db(bus.current_stop_index()),
                bus.latitude,
                bus.longitude,
                bus.passengers,
                bus.passenger_capacity,
                bus.fuel,
                bus.fuel_capacity,
                bus.speed,
                bus.id
            ],
        )?;
        Self::require_match(affected, "bus", &bus.id)
    }

    /// Replaces one event with another. The old event's full tuple locates
    /// the row, since events have no surrogate key.
    pub fn update_event(&self, old: &Event, new: &Event) -> StoreResult<()> {
        let affected = self.conn.execute(
            "UPDATE event SET busId = ?1, stopId = ?2, arrivalTime = ?3, departureTime = ?4 \
             WHERE busId = ?5 AND stopId = ?6 AND arrivalTime = ?7 AND departureTime = ?8",
            params![
                new.bus_id,
                new.stop_id,
                new.arrival_time,
                new.departure_time,
                old.bus_id,
                old.stop_id,
                old.arrival_time,
                old.departure_time
            ],
        )?;
        Self::require_match(affected, "event", format!("bus {} at stop {}", old.bus_id, old.stop_id))
    }

    pub fn get_route(&self, id: &str) -> StoreResult<Option<Route>> {
        let header = self
            .conn
            .query_row(
                "SELECT id, shortName, name FROM route WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        match header {
            Some((id, short_name, name)) => {
                let stops = self.get_stops_on_route(&id)?;
                Ok(Some(Route::with_stops(id, short_name, name, stops)))
            }
            None => Ok(None),
        }
    }

    pub fn get_stop(&self, id: &str) -> StoreResult<Option<Stop>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, riders, previousRiders, latitude, longitude \
                 FROM stop WHERE id = ?1",
                params![id],
                row_to_stop,
            )
            .optional()?)
    }

    pub fn get_bus(&self, id: &str) -> StoreResult<Option<Bus>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {BUS_COLUMNS} FROM bus WHERE id = ?1"),
                params![id],
                RawBus::from_row,
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(self.hydrate_bus(raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_all_routes(&self) -> StoreResult<Vec<Route>> {
        let mut stmt = self.conn.prepare("SELECT id FROM route")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut routes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(route) = self.get_route(&id)? {
                routes.push(route);
            }
        }
        Ok(routes)
    }

    pub fn get_all_stops(&self) -> StoreResult<Vec<Stop>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, riders, previousRiders, latitude, longitude FROM stop")?;
        let stops = stmt
            .query_map([], row_to_stop)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stops)
    }

    /// Stops on a route, ordered by their position along it. Route replay
    /// depends on this ordering, so it's a hard guarantee.
    pub fn get_stops_on_route(&self, route_id: &str) -> StoreResult<Vec<Stop>> {
        let mut stmt = self
            .conn
            .prepare("SELECT stopId FROM routeToStop WHERE routeId = ?1 ORDER BY stopIndex")?;
        let ids = stmt
            .query_map(params![route_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut stops = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_stop(&id)? {
                Some(stop) => stops.push(stop),
                None => warn!("routeToStop references stop {id}, which doesn't exist"),
            }
        }
        Ok(stops)
    }

    pub fn get_all_buses(&self) -> StoreResult<Vec<Bus>> {
        let mut stmt = self.conn.prepare(&format!("SELECT {BUS_COLUMNS} FROM bus"))?;
        let raws = stmt
            .query_map([], RawBus::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(|raw| self.hydrate_bus(raw)).collect()
    }

    pub fn get_all_buses_on_route(&self, route_id: &str) -> StoreResult<Vec<Bus>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {BUS_COLUMNS} FROM bus WHERE route = ?1"))?;
        let raws = stmt
            .query_map(params![route_id], RawBus::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(|raw| self.hydrate_bus(raw)).collect()
    }

    pub fn get_all_events(&self) -> StoreResult<Vec<Event>> {
        self.query_events("SELECT busId, stopId, arrivalTime, departureTime FROM event", [])
    }

    pub fn events_with_bus(&self, bus_id: &str) -> StoreResult<Vec<Event>> {
        self.query_events(
            "SELECT busId, stopId, arrivalTime, departureTime FROM event WHERE busId = ?1",
            params![bus_id],
        )
    }

    pub fn events_with_stop(&self, stop_id: &str) -> StoreResult<Vec<Event>> {
        self.query_events(
            "SELECT busId, stopId, arrivalTime, departureTime FROM event WHERE stopId = ?1",
            params![stop_id],
        )
    }

    pub fn events_with_arrival_time(&self, arrival_time: u32) -> StoreResult<Vec<Event>> {
        self.query_events(
            "SELECT busId, stopId, arrivalTime, departureTime FROM event WHERE arrivalTime = ?1",
            params![arrival_time],
        )
    }

    pub fn events_with_departure_time(&self, departure_time: u32) -> StoreResult<Vec<Event>> {
        self.query_events(
            "SELECT busId, stopId, arrivalTime, departureTime FROM event WHERE departureTime = ?1",
            params![departure_time],
        )
    }

    /// Appends a stop to the end of a route. The linkage row is written
    /// first; the in-memory list only changes once that succeeds, so the two
    /// views can't diverge.
    pub fn extend_route(&self, route: &mut Route, stop: Stop) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO routeToStop (routeId, stopId, stopIndex) VALUES (?1, ?2, ?3)",
            params![route.id, stop.id, route.stops().len() as i64],
        )?;
        route.extend(stop);
        Ok(())
    }

    /// Unlinks a stop from a route and closes the gap: every later stop on
    /// the route shifts down one index, keeping indices contiguous from 0.
    pub fn remove_from_route_by_id(&self, route_id: &str, stop_id: &str) -> StoreResult<()> {
        let index: i64 = self
            .conn
            .query_row(
                "SELECT stopIndex FROM routeToStop WHERE routeId = ?1 AND stopId = ?2",
                params![route_id, stop_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "routeToStop",
                key: format!("route {route_id}, stop {stop_id}"),
            })?;
        self.conn.execute(
            "DELETE FROM routeToStop WHERE routeId = ?1 AND stopId = ?2",
            params![route_id, stop_id],
        )?;
        self.conn.execute(
            "UPDATE routeToStop SET stopIndex = stopIndex - 1 WHERE routeId = ?1 AND stopIndex > ?2",
            params![route_id, index],
        )?;
        Ok(())
    }

    /// Like `remove_from_route_by_id`, also fixing up the in-memory route.
    pub fn remove_from_route(&self, route: &mut Route, stop: &Stop) -> StoreResult<()> {
        self.remove_from_route_by_id(&route.id, &stop.id)?;
        route.remove_stop(&stop.id);
        Ok(())
    }

    pub fn remove_route(&self, route: &Route) -> StoreResult<()> {
        let affected = self
            .conn
            .execute("DELETE FROM route WHERE id = ?1", params![route.id])?;
        self.conn.execute(
            "DELETE FROM routeToStop WHERE routeId = ?1",
            params![route.id],
        )?;
        Self::require_match(affected, "route", &route.id)
    }

    pub fn remove_bus(&self, bus: &Bus) -> StoreResult<()> {
        let affected = self
            .conn
            .execute("DELETE FROM bus WHERE id = ?1", params![bus.id])?;
        Self::require_match(affected, "bus", &bus.id)
    }

    pub fn remove_event(&self, event: &Event) -> StoreResult<()> {
        let affected = self.conn.execute(
            "DELETE FROM event WHERE busId = ?1 AND stopId = ?2 AND arrivalTime = ?3 \
             AND departureTime = ?4",
            params![
                event.bus_id,
                event.stop_id,
                event.arrival_time,
                event.departure_time
            ],
        )?;
        Self::require_match(
            affected,
            "event",
            format!("bus {} at stop {}", event.bus_id, event.stop_id),
        )
    }

    /// Deletes a stop entirely: collects every route that visits it first,
    /// then unlinks it from each (re-indexing the remainders) and drops the
    /// stop row. Runs in one transaction, so a failure partway rolls back.
    pub fn remove_stop(&self, stop_id: &str) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let route_ids: Vec<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT routeId FROM routeToStop WHERE stopId = ?1")?;
            let ids = stmt
                .query_map(params![stop_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        for route_id in route_ids {
            self.remove_from_route_by_id(&route_id, stop_id)?;
        }
        let affected = self
            .conn
            .execute("DELETE FROM stop WHERE id = ?1", params![stop_id])?;
        Self::require_match(affected, "stop", stop_id)?;
        tx.commit()?;
        Ok(())
    }

    /// One transaction, one prepared statement, many rows. The importer
    /// chunks its input at 10,000 rows, so one call is one batch; a failed
    /// batch loses only itself, since earlier batches already committed.
    pub fn add_stops_bulk(&self, stops: &[Stop]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = self.conn.prepare(
                "INSERT INTO stop (id, name, riders, previousRiders, latitude, longitude) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for stop in stops {
                stmt.execute(params![
                    stop.id,
                    stop.name,
                    stop.riders(),
                    stop.previous_riders(),
                    stop.latitude,
                    stop.longitude
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub(crate) fn add_buses_bulk(&self, buses: &[ImportedBus<'_>]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = self.conn.prepare(
                "INSERT INTO bus (id, route, outbound, currentStop, latitude, longitude, \
                 passengers, passengerCapacity, fuel, fuelCapacity, speed) \
                 VALUES (?1, ?2, ?3, -1, ?4, ?5, 0, ?6, ?7, ?8, 0.0)",
            )?;
            for bus in buses {
                stmt.execute(params![
                    bus.id,
                    bus.route_id,
                    bus.outbound,
                    bus.latitude,
                    bus.longitude,
                    Bus::DEFAULT_PASSENGER_CAPACITY,
                    Bus::DEFAULT_FUEL_CAPACITY,
                    Bus::DEFAULT_FUEL_CAPACITY
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn add_events_bulk(&self, events: &[Event]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = self.conn.prepare(
                "INSERT INTO event (busId, stopId, arrivalTime, departureTime) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for event in events {
                stmt.execute(params![
                    event.bus_id,
                    event.stop_id,
                    event.arrival_time,
                    event.departure_time
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Writes a route's whole ordered stop membership at once, indexed
    /// 0..n-1 in the order given.
    pub fn add_route_stops_bulk(&self, route_id: &str, stop_ids: &[String]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = self.conn.prepare(
                "INSERT INTO routeToStop (routeId, stopId, stopIndex) VALUES (?1, ?2, ?3)",
            )?;
            for (index, stop_id) in stop_ids.iter().enumerate() {
                stmt.execute(params![route_id, stop_id, index as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query_events(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<Event>> {
        let mut stmt = self.conn.prepare(sql)?;
        let events = stmt
            .query_map(params, |row| {
                Ok(Event {
                    bus_id: row.get(0)?,
                    stop_id: row.get(1)?,
                    arrival_time: row.get(2)?,
                    departure_time: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    fn hydrate_bus(&self, raw: RawBus) -> StoreResult<Bus> {
        let route = match &raw.route_id {
            Some(route_id) => self.get_route(route_id)?,
            None => None,
        };
        let bus = Bus::new(
            raw.id,
            route,
            raw.outbound,
            raw.latitude,
            raw.longitude,
            raw.passengers,
            raw.passenger_capacity,
            raw.fuel,
            raw.fuel_capacity,
            raw.speed,
        );
        Ok(Bus::from_row(bus, raw.current_stop))
    }
}

/// A bus row as the import pipeline produces it: everything not in the feed
/// takes its starting default.
pub struct ImportedBus<'a> {
    pub id: &'a str,
    pub route_id: &'a str,
    pub outbound: bool,
    pub latitude: f64,
    pub longitude: f64,
}

const BUS_COLUMNS: &str = "id, route, outbound, currentStop, latitude, longitude, \
                           passengers, passengerCapacity, fuel, fuelCapacity, speed";

struct RawBus {
    id: String,
    route_id: Option<String>,
    outbound: bool,
    current_stop: i64,
    latitude: f64,
    longitude: f64,
    passengers: u32,
    passenger_capacity: u32,
    fuel: f64,
    fuel_capacity: f64,
    speed: f64,
}

impl RawBus {
    fn from_row(row: &Row) -> rusqlite::Result<RawBus> {
        Ok(RawBus {
            id: row.get(0)?,
            route_id: row.get(1)?,
            outbound: row.get(2)?,
            current_stop: row.get(3)?,
            latitude: row.get(4)?,
            longitude: row.get(5)?,
            passengers: row.get(6)?,
            passenger_capacity: row.get(7)?,
            fuel: row.get(8)?,
            fuel_capacity: row.get(9)?,
            speed: row.get(10)?,
        })
    }
}

fn row_to_stop(row: &Row) -> rusqlite::Result<Stop> {
    Ok(Stop::from_row(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn stop_index_to_db(index: Option<usize>) -> i64 {
    match index {
        Some(idx) => idx as i64,
        None => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::in_memory().unwrap()
    }

    fn stop(id: &str, name: &str, lat: f64) -> Stop {
        Stop::new(id.to_string(), name.to_string(), lat, lat)
    }

    fn route(id: &str) -> Route {
        Route::new(id.to_string(), id.to_string(), format!("route {id}"))
    }

    fn bus(id: &str, route: Option<Route>) -> Bus {
        Bus::new(
            id.to_string(),
            route,
            true,
            0.0,
            0.0,
            0,
            10,
            0.0,
            10.0,
            0.0,
        )
    }

    #[test]
    fn add_and_get_route() {
        let db = store();
        assert!(db.get_all_routes().unwrap().is_empty());

        let r = route("0");
        db.add_route(&r).unwrap();

        let routes = db.get_all_routes().unwrap();
        assert_eq!(routes, vec![r.clone()]);
        assert_eq!(db.get_route("0").unwrap(), Some(r));
        assert_eq!(db.get_route("missing").unwrap(), None);
    }

    #[test]
    fn duplicate_insert_is_a_conflict() {
        let db = store();
        db.add_route(&route("0")).unwrap();
        match db.add_route(&route("0")) {
            Err(StoreError::Conflict { entity, key }) => {
                assert_eq!(entity, "route");
                assert_eq!(key, "0");
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn add_and_get_bus() {
        let db = store();

        // A bus with no route is legal.
        let b1 = bus("0", None);
        db.add_bus(&b1).unwrap();
        assert_eq!(db.get_all_buses().unwrap(), vec![b1.clone()]);

        db.remove_bus(&b1).unwrap();
        assert!(db.get_all_buses().unwrap().is_empty());

        let r = route("0");
        db.add_route(&r).unwrap();
        let b2 = bus("1", Some(r));
        db.add_bus(&b2).unwrap();
        assert_eq!(db.get_bus("1").unwrap(), Some(b2));
    }

    #[test]
    fn reads_are_idempotent() {
        let db = store();
        let r = route("0");
        db.add_route(&r).unwrap();
        db.add_bus(&bus("7", Some(r))).unwrap();

        let first = db.get_bus("7").unwrap();
        let second = db.get_bus("7").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn add_and_get_stop() {
        let db = store();
        let s = stop("0", "stop 0", 0.0);
        db.add_stop(&s).unwrap();
        assert_eq!(db.get_all_stops().unwrap(), vec![s.clone()]);
        assert_eq!(db.get_stop("0").unwrap(), Some(s));
    }

    #[test]
    fn add_and_remove_event() {
        let db = store();
        let e = Event::new("0".to_string(), "0".to_string(), 0, 0);

        db.add_event(&e).unwrap();
        assert_eq!(db.get_all_events().unwrap(), vec![e.clone()]);

        db.remove_event(&e).unwrap();
        assert!(db.get_all_events().unwrap().is_empty());

        // Removing it again matches nothing.
        assert!(matches!(
            db.remove_event(&e),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn update_bus() {
        let db = store();
        let r = route("1");
        db.add_route(&r).unwrap();
        let mut b = bus("0", Some(r));
        db.add_bus(&b).unwrap();
        assert_eq!(db.get_bus("0").unwrap(), Some(b.clone()));

        b.fuel = 5.0;
        b.passengers = 5;
        assert_ne!(db.get_bus("0").unwrap(), Some(b.clone()));

        db.update_bus(&b).unwrap();
        assert_eq!(db.get_bus("0").unwrap(), Some(b));
    }

    #[test]
    fn update_route() {
        let db = store();
        let mut r = route("1");
        db.add_route(&r).unwrap();

        r.short_name = "2".to_string();
        r.name = "Route 2".to_string();
        assert_ne!(db.get_route("1").unwrap(), Some(r.clone()));

        db.update_route(&r).unwrap();
        assert_eq!(db.get_route("1").unwrap(), Some(r));
    }

    #[test]
    fn update_stop() {
        let db = store();
        let mut s = stop("1", "Stop 1", 10.0);
        db.add_stop(&s).unwrap();

        s.set_riders(5);
        assert_ne!(db.get_stop("1").unwrap(), Some(s.clone()));

        db.update_stop(&s).unwrap();
        assert_eq!(db.get_stop("1").unwrap(), Some(s));
    }

    #[test]
    fn update_event() {
        let db = store();
        let old = Event::new("1".to_string(), "1".to_string(), 1, 3);
        db.add_event(&old).unwrap();

        let mut new = old.clone();
        new.arrival_time = 10;
        db.update_event(&old, &new).unwrap();

        assert_eq!(db.get_all_events().unwrap(), vec![new]);
    }

    #[test]
    fn extend_route_appends() {
        let db = store();
        let mut r = route("1");
        db.add_route(&r).unwrap();
        assert!(db.get_route("1").unwrap().unwrap().stops().is_empty());

        let s = stop("1", "Stop 1", 10.0);
        db.add_stop(&s).unwrap();

        db.extend_route(&mut r, s.clone()).unwrap();
        // In-memory and persisted views agree.
        assert_eq!(r.stops(), &[s.clone()]);
        let persisted = db.get_route("1").unwrap().unwrap();
        assert_eq!(persisted.stops(), &[s]);
    }

    #[test]
    fn remove_stop_cascades_and_reindexes() {
        let db = store();
        let stops = [stop("0", "0", 0.0), stop("1", "1", 1.0), stop("2", "2", 2.0)];
        for s in &stops {
            db.add_stop(s).unwrap();
        }
        let mut r = route("0");
        db.add_route(&r).unwrap();
        db.extend_route(&mut r, stops[0].clone()).unwrap();
        db.extend_route(&mut r, stops[1].clone()).unwrap();
        assert_eq!(db.get_all_stops().unwrap().len(), 3);
        assert_eq!(db.get_stops_on_route("0").unwrap().len(), 2);

        db.remove_stop("0").unwrap();
        assert_eq!(db.get_all_stops().unwrap().len(), 2);
        assert_eq!(db.get_stops_on_route("0").unwrap(), vec![stops[1].clone()]);

        // The survivor slid down to index 0, so appending again lines up.
        let mut r = db.get_route("0").unwrap().unwrap();
        db.extend_route(&mut r, stops[2].clone()).unwrap();
        assert_eq!(
            db.get_stops_on_route("0").unwrap(),
            vec![stops[1].clone(), stops[2].clone()]
        );
    }

    #[test]
    fn remove_from_route_keeps_views_in_sync() {
        let db = store();
        let stops = [stop("0", "0", 0.0), stop("1", "1", 1.0)];
        for s in &stops {
            db.add_stop(s).unwrap();
        }
        let mut r = route("0");
        db.add_route(&r).unwrap();
        db.extend_route(&mut r, stops[0].clone()).unwrap();
        db.extend_route(&mut r, stops[1].clone()).unwrap();

        db.remove_from_route(&mut r, &stops[0]).unwrap();
        assert_eq!(db.get_stops_on_route("0").unwrap(), vec![stops[1].clone()]);
        assert_eq!(r.stops(), &[stops[1].clone()]);

        db.extend_route(&mut r, stops[0].clone()).unwrap();
        assert_eq!(db.get_stops_on_route("0").unwrap().len(), 2);
        assert_eq!(r.stops().len(), 2);
    }

    #[test]
    fn remove_route_drops_linkage() {
        let db = store();
        let s = stop("0", "0", 0.0);
        db.add_stop(&s).unwrap();
        let mut r = route("0");
        db.add_route(&r).unwrap();
        db.extend_route(&mut r, s).unwrap();

        db.remove_route(&r).unwrap();
        assert_eq!(db.get_route("0").unwrap(), None);
        assert!(db.get_stops_on_route("0").unwrap().is_empty());
    }

    #[test]
    fn buses_filtered_by_route() {
        let db = store();
        let a = route("0");
        let b = route("1");
        db.add_route(&a).unwrap();
        db.add_route(&b).unwrap();
        db.add_bus(&bus("0", Some(a))).unwrap();
        db.add_bus(&bus("1", Some(b.clone()))).unwrap();
        db.add_bus(&bus("2", Some(b))).unwrap();
        assert_eq!(db.get_all_buses().unwrap().len(), 3);

        let on_route = db.get_all_buses_on_route("1").unwrap();
        let mut ids: Vec<&str> = on_route.iter().map(|b| b.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn events_filtered_by_predicate() {
        let db = store();
        let a = Event::new("0".to_string(), "0".to_string(), 0, 0);
        let b = Event::new("1".to_string(), "2".to_string(), 3, 4);
        let c = Event::new("2".to_string(), "5".to_string(), 3, 5);
        for e in [&a, &b, &c] {
            db.add_event(e).unwrap();
        }

        let arrived = db.events_with_arrival_time(3).unwrap();
        assert_eq!(arrived.len(), 2);
        assert!(arrived.contains(&b) && arrived.contains(&c));

        assert_eq!(db.events_with_bus("0").unwrap(), vec![a.clone()]);
        assert_eq!(db.events_with_stop("2").unwrap(), vec![b.clone()]);
        assert_eq!(db.events_with_departure_time(5).unwrap(), vec![c]);
    }

    #[test]
    fn bulk_inserts() {
        let db = store();
        let stops: Vec<Stop> = (0..25).map(|i| stop(&i.to_string(), "s", i as f64)).collect();
        db.add_stops_bulk(&stops).unwrap();
        assert_eq!(db.get_all_stops().unwrap().len(), 25);

        db.add_route(&route("7634")).unwrap();
        db.add_buses_bulk(&[ImportedBus {
            id: "6053989",
            route_id: "7634",
            outbound: false,
            latitude: 33.921202,
            longitude: -84.344649,
        }])
        .unwrap();
        let b = db.get_bus("6053989").unwrap().unwrap();
        assert!(!b.outbound);
        assert_eq!(b.current_stop_index(), None);
        assert_eq!(b.passengers, 0);
        assert_eq!(b.passenger_capacity, Bus::DEFAULT_PASSENGER_CAPACITY);
        assert_eq!(b.fuel, Bus::DEFAULT_FUEL_CAPACITY);
        assert_eq!(b.fuel_capacity, Bus::DEFAULT_FUEL_CAPACITY);
        assert_eq!(b.speed, 0.0);

        let ids: Vec<String> = (0..3).map(|i| i.to_string()).collect();
        db.add_route_stops_bulk("7634", &ids).unwrap();
        let ordered = db.get_stops_on_route("7634").unwrap();
        assert_eq!(
            ordered.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["0", "1", "2"]
        );
    }
}
