use pyo3::prelude::*;

use planner::PyTransitPlanner;
use transit_planner_core::time::{format_time, parse_time};

mod convert;
pub mod planner;

/// Parse `HH:MM:SS` into seconds since midnight
#[pyfunction(name = "parse_time")]
fn py_parse_time(text: &str) -> PyResult<u32> {
    parse_time(text).map_err(planner::to_py_err)
}

/// Format seconds since midnight as `HH:MM:SS`
#[pyfunction(name = "format_time")]
fn py_format_time(seconds: u32) -> String {
    format_time(seconds)
}

/// A Python module implemented in Rust.
#[pymodule]
fn transit_planner(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();

    m.add_class::<PyTransitPlanner>()?;
    m.add_function(wrap_pyfunction!(py_parse_time, m)?)?;
    m.add_function(wrap_pyfunction!(py_format_time, m)?)?;
    Ok(())
}
