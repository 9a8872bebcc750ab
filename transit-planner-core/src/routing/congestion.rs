//! Congestion scores and the query-time congestion overlay

use fixedbitset::FixedBitSet;
use hashbrown::{HashMap, HashSet};
use log::debug;
use petgraph::graph::NodeIndex;

use crate::{Time, Timetable, TransitGraph};

/// Multiplier applied to edges touching a congested stop unless configured otherwise
pub const DEFAULT_CONGESTION_FACTOR: f64 = 2.0;

/// Load estimate for a stop at an hour of the day, supplied by a predictor
/// outside this crate. `None` means the predictor knows nothing about the stop.
pub trait CongestionScore {
    fn score(&self, stop_id: &str, hour: u32) -> Option<f64>;
}

impl<F> CongestionScore for F
where
    F: Fn(&str, u32) -> Option<f64>,
{
    fn score(&self, stop_id: &str, hour: u32) -> Option<f64> {
        self(stop_id, hour)
    }
}

/// Stops whose score at `hour` is strictly above `threshold`
pub fn flag_congested_stops<'a, S>(
    score: &S,
    stop_ids: impl IntoIterator<Item = &'a str>,
    hour: u32,
    threshold: f64,
) -> HashSet<String>
where
    S: CongestionScore + ?Sized,
{
    stop_ids
        .into_iter()
        .filter(|stop_id| score.score(stop_id, hour).is_some_and(|value| value > threshold))
        .map(str::to_string)
        .collect()
}

/// Baseline score: number of scheduled departures at a stop during an hour.
#[derive(Debug, Clone, Default)]
pub struct DepartureFrequencyScore {
    departures: HashMap<String, [u32; 24]>,
}

impl DepartureFrequencyScore {
    pub fn from_timetable(timetable: &Timetable) -> Self {
        let mut departures: HashMap<String, [u32; 24]> = HashMap::new();
        for stop_time in &timetable.stop_times {
            if let Some(departure) = stop_time.departure {
                let hour = (departure / 3600 % 24) as usize;
                departures
                    .entry_ref(stop_time.stop_id.as_str())
                    .or_insert([0; 24])[hour] += 1;
            }
        }
        Self { departures }
    }
}

impl CongestionScore for DepartureFrequencyScore {
    fn score(&self, stop_id: &str, hour: u32) -> Option<f64> {
        self.departures
            .get(stop_id)
            .map(|hours| f64::from(hours[(hour % 24) as usize]))
    }
}

/// Per-query re-weighting of edges touching congested stops.
///
/// The overlay only answers "what does this edge cost now"; the shared graph
/// is never modified. The query's start and end stops are exempt so that a
/// traveller can still leave from or arrive at a congested stop.
#[derive(Debug, Clone)]
pub struct CongestionOverlay {
    flagged: FixedBitSet,
    factor: f64,
}

impl CongestionOverlay {
    /// Flagged ids unknown to the graph are ignored. Factors below 1.0 are
    /// raised to 1.0 so the overlay can only make edges more expensive.
    pub fn new<'a>(
        graph: &TransitGraph,
        flagged: impl IntoIterator<Item = &'a str>,
        start: &str,
        end: &str,
        factor: f64,
    ) -> Self {
        let mut bits = FixedBitSet::with_capacity(graph.node_count());
        for stop_id in flagged {
            if stop_id == start || stop_id == end {
                continue;
            }
            match graph.node_index(stop_id) {
                Some(idx) => bits.insert(idx.index()),
                None => debug!("Ignoring congestion flag for unknown stop {stop_id}"),
            }
        }
        Self {
            flagged: bits,
            factor: factor.max(1.0),
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn is_flagged(&self, node: NodeIndex) -> bool {
        self.flagged.contains(node.index())
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged.count_ones(..)
    }

    /// Cost of an edge from `source` to `target` whose base cost is `base`
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn apply(&self, source: NodeIndex, target: NodeIndex, base: Time) -> Time {
        if self.is_flagged(source) || self.is_flagged(target) {
            (f64::from(base) * self.factor).round() as Time
        } else {
            base
        }
    }
}
