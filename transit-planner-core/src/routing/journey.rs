use std::time::Instant;

use chrono::NaiveDateTime;
use log::info;
use serde::{Deserialize, Serialize};

use super::{
    CongestionOverlay, Itinerary, Path, ScheduleEstimator, WeightScheme, Weighting,
    congestion::DEFAULT_CONGESTION_FACTOR, find_path,
};
use crate::{Error, TransitGraph};

/// Everything one journey query needs, passed explicitly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyRequest {
    pub from: String,
    pub to: String,
    pub departure: NaiveDateTime,
    #[serde(default)]
    pub scheme: WeightScheme,
    /// Penalize edges touching `flagged_stops`
    #[serde(default)]
    pub avoid_congestion: bool,
    #[serde(default)]
    pub flagged_stops: Vec<String>,
    #[serde(default = "default_congestion_factor")]
    pub congestion_factor: f64,
    #[serde(skip)]
    pub deadline: Option<Instant>,
}

fn default_congestion_factor() -> f64 {
    DEFAULT_CONGESTION_FACTOR
}

impl JourneyRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>, departure: NaiveDateTime) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            departure,
            scheme: WeightScheme::default(),
            avoid_congestion: false,
            flagged_stops: Vec::new(),
            congestion_factor: DEFAULT_CONGESTION_FACTOR,
            deadline: None,
        }
    }

    #[must_use]
    pub fn avoiding(mut self, flagged_stops: impl IntoIterator<Item = String>) -> Self {
        self.avoid_congestion = true;
        self.flagged_stops = flagged_stops.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Edge cost function for this request
    pub fn weighting(&self, graph: &TransitGraph) -> Weighting {
        let weighting = Weighting::new(self.scheme);
        if !self.avoid_congestion || self.flagged_stops.is_empty() {
            return weighting;
        }
        weighting.with_congestion(CongestionOverlay::new(
            graph,
            self.flagged_stops.iter().map(String::as_str),
            &self.from,
            &self.to,
            self.congestion_factor,
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journey {
    pub path: Path,
    pub itinerary: Itinerary,
}

/// Finds the cheapest path for `request` and times it against the timetable
///
/// # Errors
///
/// Same as [`find_path`]: [`Error::UnknownStop`] or [`Error::NotFound`].
pub fn plan_journey(
    graph: &TransitGraph,
    estimator: &ScheduleEstimator,
    request: &JourneyRequest,
) -> Result<Journey, Error> {
    let weighting = request.weighting(graph);
    let path = find_path(
        graph,
        &request.from,
        &request.to,
        |edge| weighting.edge_cost(edge),
        request.deadline,
    )?;
    let itinerary = estimator.estimate(&path, request.departure);

    info!(
        "Journey {} -> {}: {} stops, cost {}, {}s",
        request.from,
        request.to,
        path.len(),
        path.cost,
        itinerary.total_duration
    );

    Ok(Journey { path, itinerary })
}
