//! Typed timetable records
//!
//! Built once during ingestion; the graph builder and the schedule estimator
//! only ever read these.

use std::hash::{Hash, Hasher};

use geo::Point;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::TransportMode;
use crate::Time;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Stop {
    pub fn location(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
}

/// One visit of a trip at a stop. Times are `None` when the feed left them
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    pub stop_id: String,
    pub sequence: u32,
    pub arrival: Option<Time>,
    pub departure: Option<Time>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub short_name: String,
    pub long_name: String,
    pub mode: TransportMode,
}

impl Route {
    /// Short name when the feed provides one, long name otherwise
    pub fn display_name(&self) -> &str {
        if self.short_name.is_empty() {
            &self.long_name
        } else {
            &self.short_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transfer {
    pub from_stop: String,
    pub to_stop: String,
    pub min_transfer_time: Option<Time>,
}

/// 64-bit FNV-1a. Cache signatures outlive the process, so they need a hash
/// that does not change between toolchains or runs.
#[derive(Debug, Clone, Copy)]
pub struct SignatureHasher(u64);

impl Default for SignatureHasher {
    fn default() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }
}

impl Hasher for SignatureHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(0x0100_0000_01b3);
        }
    }

    // fixed width, whatever the target's pointer size
    fn write_usize(&mut self, n: usize) {
        self.write(&(n as u64).to_le_bytes());
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// The full set of input tables for one timetable version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub stops: Vec<Stop>,
    pub trips: Vec<Trip>,
    pub routes: Vec<Route>,
    pub stop_times: Vec<StopTime>,
    pub transfers: Vec<Transfer>,
}

impl Timetable {
    /// Content signature used to key the persisted graph cache.
    ///
    /// Row order is part of the signature.
    pub fn signature(&self) -> u64 {
        let mut hasher = SignatureHasher::default();
        self.stops.len().hash(&mut hasher);
        for stop in &self.stops {
            stop.stop_id.hash(&mut hasher);
            stop.name.hash(&mut hasher);
            stop.lat.to_bits().hash(&mut hasher);
            stop.lon.to_bits().hash(&mut hasher);
        }
        self.trips.hash(&mut hasher);
        self.routes.hash(&mut hasher);
        self.stop_times.hash(&mut hasher);
        self.transfers.hash(&mut hasher);
        hasher.finish()
    }

    /// Route owning each trip, for trips whose route is known
    pub fn routes_by_trip(&self) -> HashMap<&str, &Route> {
        let routes: HashMap<&str, &Route> = self
            .routes
            .iter()
            .map(|route| (route.route_id.as_str(), route))
            .collect();

        self.trips
            .iter()
            .filter_map(|trip| {
                routes
                    .get(trip.route_id.as_str())
                    .map(|route| (trip.trip_id.as_str(), *route))
            })
            .collect()
    }

    pub fn stops_by_id(&self) -> HashMap<&str, &Stop> {
        self.stops
            .iter()
            .map(|stop| (stop.stop_id.as_str(), stop))
            .collect()
    }
}
