use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use transit_planner_core::{GraphConfig, TimetableConfig, routing::DEFAULT_CONGESTION_FACTOR};

/// Contents of the server's TOML configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub gtfs_dirs: Vec<PathBuf>,
    /// Where the built graph is persisted; no caching when absent
    pub cache_path: Option<PathBuf>,
    pub graph: GraphConfig,
    /// Factor applied when a request avoids congestion without naming one
    pub congestion_factor: f64,
    /// Upper bound for a single path search
    pub query_timeout_ms: u64,
    /// Requests served at the same time
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            gtfs_dirs: Vec::new(),
            cache_path: None,
            graph: GraphConfig::default(),
            congestion_factor: DEFAULT_CONGESTION_FACTOR,
            query_timeout_ms: 2_000,
            max_concurrent_requests: 64,
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        Self::from_toml(&text).map_err(|e| format!("{}: {e}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.gtfs_dirs.is_empty() {
            return Err("gtfs_dirs must name at least one directory".into());
        }
        if self.max_concurrent_requests == 0 {
            return Err("max_concurrent_requests must be positive".into());
        }
        self.graph.validate().map_err(|e| e.to_string())
    }

    pub fn timetable(&self) -> TimetableConfig {
        TimetableConfig {
            gtfs_dirs: self.gtfs_dirs.clone(),
        }
    }
}
