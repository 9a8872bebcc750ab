//! Data model for journey planning
//!
//! Typed timetable records and the transit graph derived from them.

pub mod graph;
pub mod mode;
pub mod timetable;

pub use graph::{EdgeKind, StopNode, TransitEdge, TransitGraph};
pub use mode::TransportMode;
pub use timetable::{Route, SignatureHasher, Stop, StopTime, Timetable, Transfer, Trip};
