//! Per-query routing: edge weighting, path search and schedule estimation

pub mod congestion;
mod dijkstra;
mod journey;
pub mod schedule;
mod weighting;

pub use congestion::{
    CongestionOverlay, CongestionScore, DEFAULT_CONGESTION_FACTOR, DepartureFrequencyScore,
    flag_congested_stops,
};
pub use dijkstra::{Path, find_path};
pub use journey::{Journey, JourneyRequest, plan_journey};
pub use schedule::{Itinerary, Leg, LegKind, ScheduleEstimator, estimate};
pub use weighting::{WeightScheme, Weighting};
