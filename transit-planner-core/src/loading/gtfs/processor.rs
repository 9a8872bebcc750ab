//! Conversion of raw GTFS rows into typed timetable records

use std::path::Path;

use log::{info, warn};

use super::{
    parser::{FieldTime, deserialize_gtfs_file, parse_field_time},
    raw_types::{FeedRoute, FeedStop, FeedStopTime, FeedTransfer, FeedTrip},
};
use crate::{
    Error,
    loading::{LoadReport, TimetableConfig},
    model::{Route, Stop, StopTime, Timetable, Transfer, TransportMode, Trip},
};

/// Load and merge the timetables of every configured GTFS directory
///
/// # Errors
///
/// Returns an error when no directory is configured or when one of the
/// required files (`stops.txt`, `routes.txt`, `trips.txt`, `stop_times.txt`)
/// cannot be opened. `transfers.txt` is optional.
pub fn load_timetable(config: &TimetableConfig) -> Result<(Timetable, LoadReport), Error> {
    if config.gtfs_dirs.is_empty() {
        return Err(Error::InvalidData(
            "No GTFS directories provided in the configuration".to_string(),
        ));
    }

    let mut timetable = Timetable::default();
    let mut report = LoadReport::default();

    for dir in &config.gtfs_dirs {
        info!("Reading timetable from {}", dir.display());
        load_directory(dir, &mut timetable, &mut report)?;
    }

    info!(
        "Loaded {} stops, {} routes, {} trips, {} stop times, {} transfers",
        timetable.stops.len(),
        timetable.routes.len(),
        timetable.trips.len(),
        timetable.stop_times.len(),
        timetable.transfers.len()
    );
    if report.malformed_times > 0 || report.dropped_rows > 0 {
        warn!(
            "Timetable had {} malformed times (defaulted to 00:00:00) and {} dropped rows",
            report.malformed_times, report.dropped_rows
        );
    }

    Ok((timetable, report))
}

fn load_directory(dir: &Path, timetable: &mut Timetable, report: &mut LoadReport) -> Result<(), Error> {
    let (stops, skipped) = deserialize_gtfs_file::<FeedStop>(&dir.join("stops.txt"))?;
    report.dropped_rows += skipped;
    timetable.stops.extend(stops.into_iter().map(convert_stop));

    let (routes, skipped) = deserialize_gtfs_file::<FeedRoute>(&dir.join("routes.txt"))?;
    report.dropped_rows += skipped;
    timetable.routes.extend(routes.into_iter().map(convert_route));

    let (trips, skipped) = deserialize_gtfs_file::<FeedTrip>(&dir.join("trips.txt"))?;
    report.dropped_rows += skipped;
    timetable.trips.extend(trips.into_iter().map(|trip| Trip {
        trip_id: trip.trip_id,
        route_id: trip.route_id,
    }));

    let (stop_times, skipped) =
        deserialize_gtfs_file::<FeedStopTime>(&dir.join("stop_times.txt"))?;
    report.dropped_rows += skipped;
    timetable.stop_times.reserve(stop_times.len());
    for row in stop_times {
        if let Some(stop_time) = convert_stop_time(row, report) {
            timetable.stop_times.push(stop_time);
        }
    }

    let transfers_path = dir.join("transfers.txt");
    if transfers_path.exists() {
        let (transfers, skipped) = deserialize_gtfs_file::<FeedTransfer>(&transfers_path)?;
        report.dropped_rows += skipped;
        timetable
            .transfers
            .extend(transfers.into_iter().filter_map(convert_transfer));
    }

    Ok(())
}

fn convert_stop(feed_stop: FeedStop) -> Stop {
    let lat = feed_stop.stop_lat.parse::<f64>().unwrap_or_else(|e| {
        warn!("Invalid stop_lat '{}': {}", feed_stop.stop_lat, e);
        0.0
    });
    let lon = feed_stop.stop_lon.parse::<f64>().unwrap_or_else(|e| {
        warn!("Invalid stop_lon '{}': {}", feed_stop.stop_lon, e);
        0.0
    });
    let name = if feed_stop.stop_name.is_empty() {
        feed_stop.stop_id.clone()
    } else {
        feed_stop.stop_name
    };

    Stop {
        stop_id: feed_stop.stop_id,
        name,
        lat,
        lon,
    }
}

fn convert_route(feed_route: FeedRoute) -> Route {
    let mode = feed_route
        .route_type
        .parse::<u16>()
        .map(TransportMode::from_route_type)
        .unwrap_or_else(|_| {
            warn!(
                "Invalid route_type '{}' for route {}",
                feed_route.route_type, feed_route.route_id
            );
            TransportMode::Unknown
        });

    Route {
        route_id: feed_route.route_id,
        short_name: feed_route.route_short_name,
        long_name: feed_route.route_long_name,
        mode,
    }
}

fn convert_stop_time(row: FeedStopTime, report: &mut LoadReport) -> Option<StopTime> {
    let Ok(sequence) = row.stop_sequence.parse::<u32>() else {
        warn!(
            "Dropping stop time of trip {} at {}: invalid stop_sequence '{}'",
            row.trip_id, row.stop_id, row.stop_sequence
        );
        report.dropped_rows += 1;
        return None;
    };

    let arrival = parse_field_time(&row.arrival_time);
    let departure = parse_field_time(&row.departure_time);
    report.malformed_times += [arrival, departure]
        .iter()
        .filter(|field| **field == FieldTime::Defaulted)
        .count();

    Some(StopTime {
        trip_id: row.trip_id,
        stop_id: row.stop_id,
        sequence,
        arrival: arrival.value(),
        departure: departure.value(),
    })
}

fn convert_transfer(row: FeedTransfer) -> Option<Transfer> {
    if row.from_stop_id.is_empty() || row.to_stop_id.is_empty() {
        return None;
    }
    let min_transfer_time = if row.min_transfer_time.is_empty() {
        None
    } else {
        row.min_transfer_time
            .parse::<u32>()
            .inspect_err(|e| {
                warn!(
                    "Invalid min_transfer_time '{}' for {} -> {}: {e}",
                    row.min_transfer_time, row.from_stop_id, row.to_stop_id
                );
            })
            .ok()
    };

    Some(Transfer {
        from_stop: row.from_stop_id,
        to_stop: row.to_stop_id,
        min_transfer_time,
    })
}
