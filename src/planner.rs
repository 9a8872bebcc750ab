use std::path::PathBuf;

use chrono::NaiveDateTime;
use pyo3::exceptions::{PyKeyError, PyLookupError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use rayon::prelude::*;

use transit_planner_core::prelude::*;
use transit_planner_core::routing::DepartureFrequencyScore;

use crate::convert::{itinerary_to_py, legs_to_py};

pub(crate) fn to_py_err(err: Error) -> PyErr {
    match err {
        Error::UnknownStop(_) => PyKeyError::new_err(err.to_string()),
        Error::NotFound { .. } => PyLookupError::new_err(err.to_string()),
        Error::InvalidData(_) | Error::MalformedTime(_) => PyValueError::new_err(err.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// TransitPlanner
///
/// Journey planner over one or more GTFS feeds. The transit graph is built
/// once when the planner is created, or loaded from `cache_path` when a cache
/// for the same feeds exists.
///
/// Example:
///
/// .. code-block:: python
///
///     planner = TransitPlanner(["data/gtfs"], cache_path="graph.bin")
///     path = planner.find_path("S1", "S9")
///     legs = planner.estimate(path, datetime(2025, 3, 14, 8, 0))
#[pyclass(name = "TransitPlanner")]
pub struct PyTransitPlanner {
    graph: TransitGraph,
    estimator: ScheduleEstimator,
    departures: DepartureFrequencyScore,
    congestion_factor: f64,
}

impl PyTransitPlanner {
    fn request(
        &self,
        start: &str,
        end: &str,
        departure: NaiveDateTime,
        flagged: Option<Vec<String>>,
    ) -> JourneyRequest {
        let mut request = JourneyRequest::new(start, end, departure);
        request.congestion_factor = self.congestion_factor;
        match flagged {
            Some(stops) => request.avoiding(stops),
            None => request,
        }
    }
}

#[pymethods]
impl PyTransitPlanner {
    /// Load the feeds in `gtfs_dirs` and build the transit graph.
    ///
    /// Raises ValueError when the feeds cannot be read. The GIL is released
    /// while loading.
    #[new]
    #[pyo3(signature = (gtfs_dirs, cache_path=None, congestion_factor=2.0))]
    fn new(
        py: Python<'_>,
        gtfs_dirs: Vec<PathBuf>,
        cache_path: Option<PathBuf>,
        congestion_factor: f64,
    ) -> PyResult<Self> {
        py.detach(|| {
            let (timetable, _) =
                load_timetable(&TimetableConfig { gtfs_dirs }).map_err(to_py_err)?;
            let config = GraphConfig::default();
            let cache = cache_path.map(GraphCache::new);
            let graph = load_or_build(cache.as_ref(), &timetable, &config);

            Ok(Self {
                estimator: ScheduleEstimator::new(&timetable, &config),
                departures: DepartureFrequencyScore::from_timetable(&timetable),
                graph,
                congestion_factor,
            })
        })
    }

    /// Cheapest stop sequence from `start` to `end`.
    ///
    /// Stops in `flagged` are treated as congested: edges touching them cost
    /// more, except at the start and end.
    #[pyo3(signature = (start, end, flagged=None))]
    fn find_path(
        &self,
        py: Python<'_>,
        start: &str,
        end: &str,
        flagged: Option<Vec<String>>,
    ) -> PyResult<Vec<String>> {
        let request = self.request(start, end, NaiveDateTime::default(), flagged);
        py.detach(|| {
            let weighting = request.weighting(&self.graph);
            find_path(
                &self.graph,
                start,
                end,
                |edge| weighting.edge_cost(edge),
                None,
            )
        })
        .map(|path| path.stops)
        .map_err(to_py_err)
    }

    /// Paths for many `(start, end)` pairs, searched in parallel. Pairs with
    /// no path give `None`.
    fn find_paths(&self, py: Python<'_>, pairs: Vec<(String, String)>) -> Vec<Option<Vec<String>>> {
        py.detach(|| {
            let weighting = Weighting::default();
            pairs
                .par_iter()
                .map(|(start, end)| {
                    find_path(&self.graph, start, end, |edge| weighting.edge_cost(edge), None)
                        .ok()
                        .map(|path| path.stops)
                })
                .collect()
        })
    }

    /// Time a stop sequence starting at `departure`; one dict per leg
    fn estimate<'py>(
        &self,
        py: Python<'py>,
        path: Vec<String>,
        departure: NaiveDateTime,
    ) -> PyResult<Vec<Bound<'py, PyDict>>> {
        let itinerary = self.estimator.estimate(&Path::from_stops(path), departure);
        legs_to_py(py, &itinerary.legs)
    }

    /// Find and time a journey in one call
    #[pyo3(signature = (start, end, departure, flagged=None))]
    fn plan<'py>(
        &self,
        py: Python<'py>,
        start: &str,
        end: &str,
        departure: NaiveDateTime,
        flagged: Option<Vec<String>>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let request = self.request(start, end, departure, flagged);
        let journey = py
            .detach(|| plan_journey(&self.graph, &self.estimator, &request))
            .map_err(to_py_err)?;
        let result = itinerary_to_py(py, &journey.itinerary)?;
        result.set_item("path", journey.path.stops)?;
        result.set_item("cost", journey.path.cost)?;
        Ok(result)
    }

    /// Stops with more than `threshold` scheduled departures during `hour`
    fn busy_stops(&self, hour: u32, threshold: f64) -> Vec<String> {
        let mut stops: Vec<String> = flag_congested_stops(
            &self.departures,
            self.graph.stops().map(|stop| stop.stop_id.as_str()),
            hour,
            threshold,
        )
        .into_iter()
        .collect();
        stops.sort_unstable();
        stops
    }

    fn stop_name(&self, stop_id: &str) -> Option<String> {
        self.graph.stop_name(stop_id).map(str::to_string)
    }

    fn stop_count(&self) -> usize {
        self.graph.node_count()
    }

    fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn __repr__(&self) -> String {
        format!(
            "TransitPlanner with {} stops and {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        )
    }
}
