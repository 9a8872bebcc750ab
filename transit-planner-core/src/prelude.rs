//! Everything a typical caller needs: load, build, plan

pub use crate::loading::{
    GraphCache, GraphConfig, LoadReport, TimetableConfig, build_graph, load_or_build,
    load_timetable,
};
pub use crate::model::{Timetable, TransitGraph, TransportMode};
pub use crate::routing::{
    CongestionScore, Itinerary, Journey, JourneyRequest, Leg, LegKind, Path, ScheduleEstimator,
    WeightScheme, Weighting, find_path, flag_congested_stops, plan_journey,
};
pub use crate::time::{format_time, parse_time};
pub use crate::{Error, Time};
