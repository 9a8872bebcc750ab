//! Journey planning over a scheduled transit network.
//!
//! The crate turns a stop-level timetable into an immutable directed
//! multigraph of rides and transfers, searches it for minimum-cost paths and
//! materializes those paths into time-stamped itineraries.

pub mod error;
pub mod loading;
pub mod model;
pub mod prelude;
pub mod routing;
pub mod time;

pub use error::Error;
pub use loading::{
    GraphCache, GraphConfig, LoadReport, TimetableConfig, build_graph, load_or_build,
    load_timetable,
};
pub use model::{
    EdgeKind, Route, Stop, StopNode, StopTime, Timetable, Transfer, TransitEdge, TransitGraph,
    TransportMode, Trip,
};
pub use routing::{
    CongestionOverlay, CongestionScore, DepartureFrequencyScore, Itinerary, Journey,
    JourneyRequest, Leg, Path, ScheduleEstimator, WeightScheme, Weighting, find_path,
    flag_congested_stops, plan_journey,
};

/// Seconds since midnight of the service day. May exceed 86400 for
/// post-midnight service.
pub type Time = u32;
