use petgraph::{graph::EdgeReference, visit::EdgeRef};
use serde::{Deserialize, Serialize};

use super::CongestionOverlay;
use crate::{Time, TransitEdge};

/// Which stored edge cost the path finder minimizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// Mode-scaled travel time plus modal-change penalties
    #[default]
    Composite,
    /// Raw scheduled durations
    TravelTime,
}

/// Edge cost function for one query: a scheme plus an optional congestion
/// overlay
#[derive(Debug, Clone, Default)]
pub struct Weighting {
    pub scheme: WeightScheme,
    pub congestion: Option<CongestionOverlay>,
}

impl Weighting {
    pub fn new(scheme: WeightScheme) -> Self {
        Self {
            scheme,
            congestion: None,
        }
    }

    #[must_use]
    pub fn with_congestion(mut self, overlay: CongestionOverlay) -> Self {
        self.congestion = Some(overlay);
        self
    }

    pub fn edge_cost(&self, edge: EdgeReference<'_, TransitEdge>) -> Time {
        let data = edge.weight();
        let base = match self.scheme {
            WeightScheme::Composite => data.weight,
            WeightScheme::TravelTime => data.duration,
        };
        match &self.congestion {
            Some(overlay) => overlay.apply(edge.source(), edge.target(), base),
            None => base,
        }
    }
}
