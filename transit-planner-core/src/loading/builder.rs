use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use log::{debug, info, warn};
use petgraph::graph::NodeIndex;
use rayon::prelude::*;

use super::config::GraphConfig;
use crate::{
    Time,
    model::{EdgeKind, Route, StopNode, StopTime, Timetable, TransitEdge, TransitGraph, TransportMode},
};

/// Label carried by transfer edges in place of a route name
pub const TRANSFER_LABEL: &str = "Transfer";

/// One ride between consecutive stops of a trip
#[derive(Debug)]
struct RideSegment<'a> {
    from: &'a str,
    to: &'a str,
    duration: Time,
}

#[derive(Debug)]
struct TripSegments<'a> {
    trip_id: &'a str,
    route: Option<&'a Route>,
    segments: Vec<RideSegment<'a>>,
    dropped: usize,
}

/// Builds the transit graph from a timetable
///
/// Trips are handled in ascending trip-id order so that identical input
/// always yields an identical graph, including the modal-change penalties
/// which depend on the order edges leave a stop.
pub fn build_graph(timetable: &Timetable, config: &GraphConfig) -> TransitGraph {
    info!(
        "Building transit graph from {} stop times and {} transfers",
        timetable.stop_times.len(),
        timetable.transfers.len()
    );

    let routes_by_trip = timetable.routes_by_trip();

    let mut stop_times_by_trip: HashMap<&str, Vec<&StopTime>> = HashMap::new();
    for stop_time in &timetable.stop_times {
        stop_times_by_trip
            .entry(stop_time.trip_id.as_str())
            .or_default()
            .push(stop_time);
    }
    let mut trips: Vec<(&str, Vec<&StopTime>)> = stop_times_by_trip.into_iter().collect();
    trips.sort_unstable_by(|a, b| a.0.cmp(b.0));

    // Trips are independent; collect keeps the sorted order
    let derived: Vec<TripSegments<'_>> = trips
        .into_par_iter()
        .map(|(trip_id, stop_times)| {
            derive_trip_segments(trip_id, stop_times, routes_by_trip.get(trip_id).copied())
        })
        .collect();

    let mut graph = TransitGraph::default();
    for stop in &timetable.stops {
        graph.add_stop(StopNode {
            stop_id: stop.stop_id.clone(),
            name: stop.name.clone(),
            lat: stop.lat,
            lon: stop.lon,
        });
    }

    let mut unknown_stops: HashSet<String> = HashSet::new();
    let mut last_mode: HashMap<NodeIndex, TransportMode> = HashMap::new();
    let mut dropped = 0;
    let mut rides = 0;

    for trip in &derived {
        dropped += trip.dropped;
        let mode = trip.route.map_or(TransportMode::Unknown, |route| route.mode);
        let route_name = trip.route.map(Route::display_name).unwrap_or_default();
        let factor = config.mode_factor(mode);

        for segment in &trip.segments {
            let from = node_for(&mut graph, segment.from, &mut unknown_stops);
            let to = node_for(&mut graph, segment.to, &mut unknown_stops);

            let mut weight = scale_duration(segment.duration, factor);
            if last_mode.get(&from).is_some_and(|previous| *previous != mode) {
                weight = weight.saturating_add(config.modal_change_penalty);
            }

            let edge = TransitEdge {
                weight,
                duration: segment.duration,
                kind: EdgeKind::Ride {
                    trip_id: trip.trip_id.to_string(),
                    route_id: trip.route.map(|route| route.route_id.clone()),
                },
                mode,
                route_name: route_name.to_string(),
            };
            if graph.add_edge(from, to, edge).is_some() {
                last_mode.insert(from, mode);
                rides += 1;
            } else {
                debug!("Skipping self loop at {} on trip {}", segment.from, trip.trip_id);
            }
        }
    }

    let mut transfers = 0;
    for transfer in &timetable.transfers {
        let from = node_for(&mut graph, &transfer.from_stop, &mut unknown_stops);
        let to = node_for(&mut graph, &transfer.to_stop, &mut unknown_stops);
        let duration = transfer
            .min_transfer_time
            .unwrap_or(config.default_transfer_time);

        let edge = TransitEdge {
            weight: duration,
            duration,
            kind: EdgeKind::Transfer,
            mode: TransportMode::Unknown,
            route_name: TRANSFER_LABEL.to_string(),
        };
        if graph.add_edge(from, to, edge).is_some() {
            transfers += 1;
        }
    }

    if !unknown_stops.is_empty() {
        warn!(
            "{} stops referenced by the timetable are missing from the stops table",
            unknown_stops.len()
        );
    }
    if dropped > 0 {
        warn!("Dropped {dropped} ride segments with missing or negative durations");
    }
    info!(
        "Transit graph built: {} stops, {} ride edges, {} transfer edges",
        graph.node_count(),
        rides,
        transfers
    );

    graph
}

fn derive_trip_segments<'a>(
    trip_id: &'a str,
    mut stop_times: Vec<&'a StopTime>,
    route: Option<&'a Route>,
) -> TripSegments<'a> {
    stop_times.sort_by_key(|stop_time| stop_time.sequence);

    let mut segments = Vec::with_capacity(stop_times.len().saturating_sub(1));
    let mut dropped = 0;
    for (current, next) in stop_times.iter().copied().tuple_windows() {
        match ride_duration(current, next) {
            Some(duration) => segments.push(RideSegment {
                from: &current.stop_id,
                to: &next.stop_id,
                duration,
            }),
            None => dropped += 1,
        }
    }

    TripSegments {
        trip_id,
        route,
        segments,
        dropped,
    }
}

/// Arrival at the next stop minus departure from the current one, when both
/// are known and the difference is not negative
pub(crate) fn ride_duration(current: &StopTime, next: &StopTime) -> Option<Time> {
    let departure = current.departure?;
    let arrival = next.arrival?;
    arrival.checked_sub(departure)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_duration(duration: Time, factor: f64) -> Time {
    // float to int casts saturate, NaN becomes 0
    (f64::from(duration) * factor).round() as Time
}

fn node_for(graph: &mut TransitGraph, stop_id: &str, unknown: &mut HashSet<String>) -> NodeIndex {
    if let Some(idx) = graph.node_index(stop_id) {
        return idx;
    }
    if unknown.insert(stop_id.to_string()) {
        debug!("Stop {stop_id} is not in the stops table, adding a placeholder");
    }
    graph.add_stop(StopNode {
        stop_id: stop_id.to_string(),
        name: stop_id.to_string(),
        lat: 0.0,
        lon: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Stop, Transfer, Trip};

    fn stop(id: &str) -> Stop {
        Stop {
            stop_id: id.into(),
            name: format!("Stop {id}"),
            lat: 45.0,
            lon: 4.0,
        }
    }

    fn stop_time(trip: &str, stop: &str, seq: u32, arr: Option<Time>, dep: Option<Time>) -> StopTime {
        StopTime {
            trip_id: trip.into(),
            stop_id: stop.into(),
            sequence: seq,
            arrival: arr,
            departure: dep,
        }
    }

    fn route(id: &str, mode: TransportMode) -> Route {
        Route {
            route_id: id.into(),
            short_name: id.into(),
            long_name: format!("Route {id}"),
            mode,
        }
    }

    fn trip(id: &str, route: &str) -> Trip {
        Trip {
            trip_id: id.into(),
            route_id: route.into(),
        }
    }

    #[test]
    fn orders_by_sequence_and_drops_invalid_segments() {
        let timetable = Timetable {
            stops: vec![stop("A"), stop("B"), stop("C"), stop("D")],
            trips: vec![trip("T1", "M")],
            routes: vec![route("M", TransportMode::Metro)],
            stop_times: vec![
                stop_time("T1", "C", 3, Some(700), Some(700)),
                stop_time("T1", "A", 1, Some(0), Some(100)),
                stop_time("T1", "B", 2, Some(400), Some(800)),
                stop_time("T1", "D", 4, None, None),
            ],
            transfers: vec![],
        };

        let graph = build_graph(&timetable, &GraphConfig::default());

        // A->B is 300s, B->C would be negative, C->D has no arrival
        assert_eq!(graph.edge_count(), 1);
        let edges = graph.edges_between("A", "B");
        assert_eq!(edges[0].weight, 300);
        assert_eq!(edges[0].trip_id(), Some("T1"));
        assert_eq!(edges[0].route_name, "M");
    }

    #[test]
    fn scales_by_mode_and_penalizes_mode_changes() {
        let timetable = Timetable {
            stops: vec![stop("A"), stop("B"), stop("C")],
            trips: vec![trip("T1", "M"), trip("T2", "BUS")],
            routes: vec![
                route("M", TransportMode::Metro),
                route("BUS", TransportMode::Bus),
            ],
            stop_times: vec![
                stop_time("T1", "A", 1, Some(0), Some(0)),
                stop_time("T1", "B", 2, Some(600), Some(600)),
                stop_time("T2", "A", 1, Some(0), Some(0)),
                stop_time("T2", "C", 2, Some(600), Some(600)),
            ],
            transfers: vec![],
        };
        let config = GraphConfig::default();
        let graph = build_graph(&timetable, &config);

        let metro = graph.edges_between("A", "B")[0];
        let bus = graph.edges_between("A", "C")[0];
        assert_eq!(metro.weight, 600);
        assert_eq!(metro.mode, TransportMode::Metro);
        // T2 leaves A after T1 with a different mode
        assert_eq!(bus.weight, 720 + config.modal_change_penalty);
        assert_eq!(bus.duration, 600);
    }

    #[test]
    fn adds_transfers_with_fallback_and_skips_self_loops() {
        let timetable = Timetable {
            stops: vec![stop("A"), stop("B")],
            transfers: vec![
                Transfer {
                    from_stop: "A".into(),
                    to_stop: "B".into(),
                    min_transfer_time: Some(90),
                },
                Transfer {
                    from_stop: "B".into(),
                    to_stop: "X".into(),
                    min_transfer_time: None,
                },
                Transfer {
                    from_stop: "B".into(),
                    to_stop: "B".into(),
                    min_transfer_time: Some(30),
                },
            ],
            ..Timetable::default()
        };

        let graph = build_graph(&timetable, &GraphConfig::default());
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edges_between("A", "B")[0].weight, 90);
        assert_eq!(graph.edges_between("B", "X")[0].weight, 300);
        assert!(graph.edges_between("B", "X")[0].is_transfer());
        assert_eq!(graph.stop_name("X"), Some("X"));
    }

    #[test]
    fn trips_without_route_are_kept() {
        let timetable = Timetable {
            stops: vec![stop("A"), stop("B")],
            stop_times: vec![
                stop_time("ghost", "A", 1, None, Some(0)),
                stop_time("ghost", "B", 2, Some(60), None),
            ],
            ..Timetable::default()
        };
        let graph = build_graph(&timetable, &GraphConfig::default());
        let edge = graph.edges_between("A", "B")[0];
        assert_eq!(edge.mode, TransportMode::Unknown);
        assert_eq!(edge.route_name, "");
        assert_eq!(edge.weight, 60);
    }
}
