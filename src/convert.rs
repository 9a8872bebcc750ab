use pyo3::prelude::*;
use pyo3::types::PyDict;

use transit_planner_core::{Itinerary, Leg};

/// Leg as a plain dict, keyed the way the dashboard reads it
pub(crate) fn leg_to_py<'py>(py: Python<'py>, leg: &Leg) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("from_stop", &leg.from_stop)?;
    dict.set_item("to_stop", &leg.to_stop)?;
    dict.set_item("stop_name", &leg.from_name)?;
    dict.set_item("departure", leg.departure)?;
    dict.set_item("arrival", leg.arrival)?;
    dict.set_item("duration_seconds", leg.duration_seconds)?;
    dict.set_item("duration_min", leg.duration_minutes)?;
    dict.set_item("wait_seconds", leg.wait_seconds)?;
    dict.set_item("route_name", &leg.route_name)?;
    dict.set_item("mode", leg.mode_label())?;
    dict.set_item("trip_id", &leg.trip_id)?;
    dict.set_item("lat", leg.lat)?;
    dict.set_item("lon", leg.lon)?;
    Ok(dict)
}

pub(crate) fn legs_to_py<'py>(py: Python<'py>, legs: &[Leg]) -> PyResult<Vec<Bound<'py, PyDict>>> {
    legs.iter().map(|leg| leg_to_py(py, leg)).collect()
}

pub(crate) fn itinerary_to_py<'py>(
    py: Python<'py>,
    itinerary: &Itinerary,
) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("legs", legs_to_py(py, &itinerary.legs)?)?;
    dict.set_item("total_duration", itinerary.total_duration)?;
    dict.set_item("mode_changes", itinerary.mode_changes)?;
    dict.set_item("unmatched_legs", itinerary.unmatched_legs)?;
    dict.set_item("penalized_duration", itinerary.penalized_duration)?;
    Ok(dict)
}
