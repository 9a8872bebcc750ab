//! Reading GTFS-style CSV feeds into a typed timetable

mod parser;
mod processor;
mod raw_types;

pub use parser::deserialize_gtfs_file;
pub use processor::load_timetable;
pub use raw_types::{FeedRoute, FeedStop, FeedStopTime, FeedTransfer, FeedTrip};
