use std::time::Duration;

use tracing::info;
use transit_planner_core::{
    GraphCache, ScheduleEstimator, Timetable, TransitGraph, load_or_build, load_timetable,
};

use crate::config::ServerConfig;

/// Read-only data shared by every request
#[derive(Debug)]
pub struct AppState {
    pub graph: TransitGraph,
    pub estimator: ScheduleEstimator,
    pub query_timeout: Duration,
    pub congestion_factor: f64,
}

impl AppState {
    pub fn new(timetable: &Timetable, graph: TransitGraph, config: &ServerConfig) -> Self {
        Self {
            estimator: ScheduleEstimator::new(timetable, &config.graph),
            graph,
            query_timeout: Duration::from_millis(config.query_timeout_ms),
            congestion_factor: config.congestion_factor,
        }
    }

    /// Reads the feeds and builds the graph, going through the cache when one
    /// is configured. Blocking.
    pub fn load(config: &ServerConfig) -> Result<Self, transit_planner_core::Error> {
        let (timetable, report) = load_timetable(&config.timetable())?;
        info!(
            stops = timetable.stops.len(),
            stop_times = timetable.stop_times.len(),
            malformed_times = report.malformed_times,
            dropped_rows = report.dropped_rows,
            "timetable loaded"
        );

        let cache = config.cache_path.as_ref().map(GraphCache::new);
        let graph = load_or_build(cache.as_ref(), &timetable, &config.graph);
        Ok(Self::new(&timetable, graph, config))
    }
}
