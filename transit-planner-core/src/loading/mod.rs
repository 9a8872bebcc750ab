//! This module is responsible for reading timetable data, building the
//! transit graph from it and persisting the built graph.

mod builder;
mod cache;
mod config;
pub mod gtfs;

pub use builder::{TRANSFER_LABEL, build_graph};
pub(crate) use builder::ride_duration;
pub use cache::{GraphCache, cache_signature, load_or_build};
pub use config::{GraphConfig, TimetableConfig};
pub use gtfs::load_timetable;

/// Counters for input defects recovered during loading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Time fields that did not parse and were replaced with `00:00:00`
    pub malformed_times: usize,
    /// Rows skipped because they could not be read or converted
    pub dropped_rows: usize,
}
