use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Time, TransportMode};

/// Where to read the timetable from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimetableConfig {
    /// Directories holding GTFS-style CSV files. Several feeds are merged.
    pub gtfs_dirs: Vec<PathBuf>,
}

/// Weighting parameters applied while deriving edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Multiplier on ride durations per mode. Modes without an entry use 1.0.
    pub mode_factors: BTreeMap<TransportMode, f64>,
    /// Flat penalty in seconds when consecutive departures from a stop change mode
    pub modal_change_penalty: Time,
    /// Transfer duration used when the feed gives none
    pub default_transfer_time: Time,
}

impl Default for GraphConfig {
    fn default() -> Self {
        let mode_factors = BTreeMap::from([
            (TransportMode::Tram, 1.0),
            (TransportMode::Metro, 1.0),
            (TransportMode::Train, 1.0),
            (TransportMode::Bus, 1.2),
            (TransportMode::Ferry, 1.1),
            (TransportMode::CableCar, 1.0),
            (TransportMode::Funicular, 1.0),
            (TransportMode::Trolleybus, 1.15),
            (TransportMode::Shuttle, 1.25),
            (TransportMode::Unknown, 1.0),
        ]);
        Self {
            mode_factors,
            modal_change_penalty: 300,
            default_transfer_time: 300,
        }
    }
}

impl GraphConfig {
    pub fn mode_factor(&self, mode: TransportMode) -> f64 {
        self.mode_factors.get(&mode).copied().unwrap_or(1.0)
    }

    /// Every factor must be finite and non-negative, otherwise edge weights
    /// could turn negative.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] naming the first offending mode.
    pub fn validate(&self) -> Result<(), Error> {
        for (mode, factor) in &self.mode_factors {
            if !factor.is_finite() || *factor < 0.0 {
                return Err(Error::InvalidData(format!(
                    "mode factor for {mode} must be a non-negative number, got {factor}"
                )));
            }
        }
        Ok(())
    }
}
