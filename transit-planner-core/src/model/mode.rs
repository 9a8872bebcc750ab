use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport mode of a route, keyed by the feed's `route_type` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Tram,
    Metro,
    Train,
    Bus,
    Ferry,
    CableCar,
    Funicular,
    Trolleybus,
    Shuttle,
    Unknown,
}

impl TransportMode {
    pub const ALL: [TransportMode; 10] = [
        TransportMode::Tram,
        TransportMode::Metro,
        TransportMode::Train,
        TransportMode::Bus,
        TransportMode::Ferry,
        TransportMode::CableCar,
        TransportMode::Funicular,
        TransportMode::Trolleybus,
        TransportMode::Shuttle,
        TransportMode::Unknown,
    ];

    pub fn from_route_type(code: u16) -> Self {
        match code {
            0 => TransportMode::Tram,
            1 => TransportMode::Metro,
            2 => TransportMode::Train,
            3 => TransportMode::Bus,
            4 => TransportMode::Ferry,
            5 => TransportMode::CableCar,
            6 => TransportMode::Funicular,
            7 => TransportMode::Trolleybus,
            11 => TransportMode::Shuttle,
            _ => TransportMode::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TransportMode::Tram => "Tram",
            TransportMode::Metro => "Metro",
            TransportMode::Train => "Train",
            TransportMode::Bus => "Bus",
            TransportMode::Ferry => "Ferry",
            TransportMode::CableCar => "Cable car",
            TransportMode::Funicular => "Funicular",
            TransportMode::Trolleybus => "Trolleybus",
            TransportMode::Shuttle => "Shuttle",
            TransportMode::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
