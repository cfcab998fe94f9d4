use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Read, Seek};

use anyhow::Result;
use chrono::Weekday;
use geo::Point;
use gtfs::{FeedArchive, StopTimes, TripRecord};

use crate::store::ImportedBus;
use crate::{Event, Route, Stop, Store};

/// Rows per bulk insert. Each batch commits on its own, so a failure partway
/// through a huge feed keeps everything already written.
const BATCH_SIZE: usize = 10_000;

/// Materializes one day of service from a GTFS feed into the store: routes
/// and stops, one bus per scheduled trip, that trip's timetable as events,
/// and each route's ordered stop list.
///
/// The caller is expected to start from an empty store; nothing here clears
/// existing rows, and re-importing over old data will hit key conflicts.
pub fn import_feed<R: Read + Seek>(
    store: &Store,
    archive: &mut FeedArchive<R>,
    day: Weekday,
) -> Result<()> {
    let service_ids = gtfs::service_ids_on(day, archive.open("calendar.txt")?)?;
    let trips = gtfs::load_trips(archive.open("trips.txt")?)?;

    let active_trips: BTreeMap<&str, &TripRecord> = trips
        .values()
        .filter(|trip| service_ids.contains(&trip.service_id))
        .map(|trip| (trip.trip_id.as_str(), trip))
        .collect();
    let active_routes: HashSet<&str> = active_trips
        .values()
        .map(|trip| trip.route_id.as_str())
        .collect();
    info!(
        "{} of {} trips (on {} routes) run on {day}",
        active_trips.len(),
        trips.len(),
        active_routes.len()
    );

    import_routes(store, archive, &active_routes)?;
    import_stops(store, archive)?;
    // The later stages key off the trips that actually got a bus, not the
    // whole active set; a trip dropped here must not leave stop orderings or
    // events referencing a bus that doesn't exist.
    let placed_trips = import_buses(store, archive, &active_trips)?;
    import_route_stops(store, archive, &active_trips, &placed_trips)?;
    import_events(store, archive, &placed_trips)?;
    Ok(())
}

/// Only routes with at least one trip running that day make it in.
fn import_routes<R: Read + Seek>(
    store: &Store,
    archive: &mut FeedArchive<R>,
    active_routes: &HashSet<&str>,
) -> Result<()> {
    let mut imported = 0;
    for rec in gtfs::load_routes(archive.open("routes.txt")?)? {
        if !active_routes.contains(rec.route_id.as_str()) {
            continue;
        }
        let route = Route::new(rec.route_id, rec.route_short_name, rec.route_long_name);
        match store.add_route(&route) {
            Ok(()) => imported += 1,
            Err(err) => warn!("Couldn't import route {}: {err}", route.id),
        }
    }
    info!("Imported {imported} routes");
    Ok(())
}

/// Every stop comes in, even ones no active route visits; a stop's existence
/// doesn't depend on the day's schedule.
fn import_stops<R: Read + Seek>(store: &Store, archive: &mut FeedArchive<R>) -> Result<()> {
    let stops: Vec<Stop> = gtfs::load_stops(archive.open("stops.txt")?)?
        .into_iter()
        .map(|rec| Stop::new(rec.stop_id, rec.stop_name, rec.position.y(), rec.position.x()))
        .collect();
    for batch in stops.chunks(BATCH_SIZE) {
        if let Err(err) = store.add_stops_bulk(batch) {
            error!("Couldn't import a batch of {} stops: {err}", batch.len());
        }
    }
    info!("Imported {} stops", stops.len());
    Ok(())
}

/// One bus per active trip, spawned at its shape's starting point. Trips
/// without usable geometry can't be placed anywhere, so they get no bus.
/// Returns the ids of the trips whose bus actually made it into the store.
fn import_buses<R: Read + Seek>(
    store: &Store,
    archive: &mut FeedArchive<R>,
    active_trips: &BTreeMap<&str, &TripRecord>,
) -> Result<HashSet<String>> {
    let starts: HashMap<String, Point<f64>> =
        gtfs::load_starting_points(archive.open("shapes.txt")?)?;

    let mut buses = Vec::new();
    for trip in active_trips.values() {
        let shape_id = match &trip.shape_id {
            Some(id) => id,
            None => {
                warn!("Trip {} has no shape; skipping its bus", trip.trip_id);
                continue;
            }
        };
        let start = match starts.get(shape_id) {
            Some(pt) => pt,
            None => {
                warn!(
                    "Trip {} references shape {shape_id}, which has no points; skipping its bus",
                    trip.trip_id
                );
                continue;
            }
        };
        buses.push(ImportedBus {
            id: &trip.trip_id,
            route_id: &trip.route_id,
            outbound: trip.outbound,
            latitude: start.y(),
            longitude: start.x(),
        });
    }

    let mut placed = HashSet::new();
    for batch in buses.chunks(BATCH_SIZE) {
        match store.add_buses_bulk(batch) {
            Ok(()) => placed.extend(batch.iter().map(|bus| bus.id.to_string())),
            Err(err) => error!("Couldn't import a batch of {} buses: {err}", batch.len()),
        }
    }
    info!("Imported {} buses", placed.len());
    Ok(placed)
}

/// Derives each route's ordered stop list from the first placed trip seen for
/// it. stop_times.txt groups rows by trip (one contiguous run of rows per
/// trip), so a trip-ID change marks the end of a run.
fn import_route_stops<R: Read + Seek>(
    store: &Store,
    archive: &mut FeedArchive<R>,
    active_trips: &BTreeMap<&str, &TripRecord>,
    placed_trips: &HashSet<String>,
) -> Result<()> {
    let mut completed_routes: HashSet<String> = HashSet::new();
    let mut current_trip: Option<String> = None;
    // stop_sequence -> stop_id for the run in progress.
    let mut sequence: BTreeMap<u32, String> = BTreeMap::new();

    for rec in StopTimes::new(archive.open("stop_times.txt")?) {
        if current_trip.as_deref() != Some(rec.trip_id.as_str()) {
            if let Some(trip_id) = current_trip.take() {
                flush_route_stops(
                    store,
                    active_trips,
                    placed_trips,
                    &mut completed_routes,
                    &trip_id,
                    std::mem::take(&mut sequence),
                );
            }
            current_trip = Some(rec.trip_id.clone());
        }
        if sequence.contains_key(&rec.stop_sequence) {
            warn!(
                "Trip {} repeats stop_sequence {}; keeping the first row",
                rec.trip_id, rec.stop_sequence
            );
            continue;
        }
        sequence.insert(rec.stop_sequence, rec.stop_id);
    }
    if let Some(trip_id) = current_trip {
        flush_route_stops(
            store,
            active_trips,
            placed_trips,
            &mut completed_routes,
            &trip_id,
            sequence,
        );
    }

    info!("Linked stops for {} routes", completed_routes.len());
    Ok(())
}

fn flush_route_stops(
    store: &Store,
    active_trips: &BTreeMap<&str, &TripRecord>,
    placed_trips: &HashSet<String>,
    completed_routes: &mut HashSet<String>,
    trip_id: &str,
    sequence: BTreeMap<u32, String>,
) {
    // Only trips with a bus in the store get a say; a run for a skipped trip
    // must not define a route's order.
    let trip = match active_trips.get(trip_id) {
        Some(trip) if placed_trips.contains(trip_id) => trip,
        _ => return,
    };
    // The first placed trip seen for a route defines its stop order; later
    // trips on the same route are variations on the same sequence.
    if !completed_routes.insert(trip.route_id.clone()) {
        return;
    }
    let mut stop_ids: Vec<String> = sequence.into_values().collect();
    // Inbound trips list the same stops in reverse; both directions share one
    // canonical outbound order.
    if !trip.outbound {
        stop_ids.reverse();
    }
    if let Err(err) = store.add_route_stops_bulk(&trip.route_id, &stop_ids) {
        error!("Couldn't link stops for route {}: {err}", trip.route_id);
    }
}

/// A second pass over stop_times.txt turns each placed trip's timetable rows
/// into events. Rows with unparseable times are logged and dropped.
fn import_events<R: Read + Seek>(
    store: &Store,
    archive: &mut FeedArchive<R>,
    placed_trips: &HashSet<String>,
) -> Result<()> {
    let mut batch = Vec::new();
    let mut imported = 0;
    for rec in StopTimes::new(archive.open("stop_times.txt")?) {
        if !placed_trips.contains(rec.trip_id.as_str()) {
            continue;
        }
        let arrival = match gtfs::parse_time_of_day(&rec.arrival_time) {
            Ok(t) => t,
            Err(err) => {
                warn!("Trip {} at stop {}: {err}", rec.trip_id, rec.stop_id);
                continue;
            }
        };
        let departure = match gtfs::parse_time_of_day(&rec.departure_time) {
            Ok(t) => t,
            Err(err) => {
                warn!("Trip {} at stop {}: {err}", rec.trip_id, rec.stop_id);
                continue;
            }
        };
        batch.push(Event::new(rec.trip_id, rec.stop_id, arrival, departure));
        if batch.len() == BATCH_SIZE {
            flush_events(store, &mut batch, &mut imported);
        }
    }
    if !batch.is_empty() {
        flush_events(store, &mut batch, &mut imported);
    }
    info!("Imported {imported} events");
    Ok(())
}

fn flush_events(store: &Store, batch: &mut Vec<Event>, imported: &mut usize) {
    match store.add_events_bulk(batch) {
        Ok(()) => *imported += batch.len(),
        Err(err) => error!("Couldn't import a batch of {} events: {err}", batch.len()),
    }
    batch.clear();
}
