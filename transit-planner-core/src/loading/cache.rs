//! Persisted snapshot of a built transit graph
//!
//! The file holds a small header (format version and signature) followed by
//! the graph itself. Readers check the header before decoding the graph, so a
//! stale cache is rejected cheaply.

use std::fs;
use std::hash::{Hash, Hasher};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use log::{info, warn};
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{GraphConfig, build_graph};
use crate::{
    Error,
    model::{SignatureHasher, StopNode, Timetable, TransitEdge, TransitGraph},
};

const CACHE_FORMAT_VERSION: u32 = 1;

/// Fixed-width little-endian encoding. Reads are capped at `limit` bytes so a
/// damaged length prefix fails the decode instead of allocating.
fn cache_encoding(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(limit)
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheHeader {
    format_version: u32,
    signature: u64,
}

/// Graph cache stored at a single file path
#[derive(Debug, Clone)]
pub struct GraphCache {
    path: PathBuf,
}

impl GraphCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached graph if it was built from input with this signature
    ///
    /// # Errors
    ///
    /// [`Error::CacheUnavailable`] when the file is missing or cannot be
    /// decoded, [`Error::CacheStale`] when it was written by another format
    /// version or for another signature.
    pub fn load(&self, signature: u64) -> Result<TransitGraph, Error> {
        let unavailable =
            |reason: String| Error::CacheUnavailable(format!("{}: {reason}", self.path.display()));

        let bytes = fs::read(&self.path).map_err(|e| unavailable(e.to_string()))?;
        let limit = bytes.len() as u64;
        let mut reader = bytes.as_slice();

        let header: CacheHeader = cache_encoding(limit)
            .deserialize_from(&mut reader)
            .map_err(|e| unavailable(e.to_string()))?;
        if header.format_version != CACHE_FORMAT_VERSION {
            return Err(Error::CacheStale(format!(
                "format version {} (expected {CACHE_FORMAT_VERSION})",
                header.format_version
            )));
        }
        if header.signature != signature {
            return Err(Error::CacheStale(format!(
                "signature {:016x} (expected {signature:016x})",
                header.signature
            )));
        }

        let graph: DiGraph<StopNode, TransitEdge> = cache_encoding(limit)
            .deserialize_from(&mut reader)
            .map_err(|e| unavailable(e.to_string()))?;
        Ok(TransitGraph::from_graph(graph))
    }

    /// Write the graph next to its final location and rename it into place,
    /// so concurrent readers see either the old file or the complete new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be written or renamed.
    pub fn store(&self, graph: &TransitGraph, signature: u64) -> Result<(), Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            let header = CacheHeader {
                format_version: CACHE_FORMAT_VERSION,
                signature,
            };
            cache_encoding(u64::MAX).serialize_into(&mut writer, &header)?;
            cache_encoding(u64::MAX).serialize_into(&mut writer, graph.inner())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::IoError(e.error))?;

        info!("Graph cache written to {}", self.path.display());
        Ok(())
    }
}

/// Signature of the graph that `build_graph(timetable, config)` would produce
pub fn cache_signature(timetable: &Timetable, config: &GraphConfig) -> u64 {
    let mut hasher = SignatureHasher::default();
    timetable.signature().hash(&mut hasher);
    for (mode, factor) in &config.mode_factors {
        mode.hash(&mut hasher);
        factor.to_bits().hash(&mut hasher);
    }
    config.modal_change_penalty.hash(&mut hasher);
    config.default_transfer_time.hash(&mut hasher);
    hasher.finish()
}

/// Load the graph from the cache, or build it and refresh the cache
///
/// Cache problems never fail the call: a missing, corrupt or stale cache
/// leads to a rebuild, and a failed write is only logged.
pub fn load_or_build(
    cache: Option<&GraphCache>,
    timetable: &Timetable,
    config: &GraphConfig,
) -> TransitGraph {
    let signature = cache_signature(timetable, config);

    if let Some(cache) = cache {
        match cache.load(signature) {
            Ok(graph) => {
                info!(
                    "Loaded transit graph from cache {} ({} stops, {} edges)",
                    cache.path().display(),
                    graph.node_count(),
                    graph.edge_count()
                );
                return graph;
            }
            Err(e) => info!("Rebuilding transit graph: {e}"),
        }
    }

    let graph = build_graph(timetable, config);

    if let Some(cache) = cache {
        if let Err(e) = cache.store(&graph, signature) {
            warn!("Failed to write graph cache {}: {e}", cache.path().display());
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Stop, Transfer};

    fn timetable() -> Timetable {
        Timetable {
            stops: vec![
                Stop {
                    stop_id: "A".into(),
                    name: "Alpha".into(),
                    lat: 1.0,
                    lon: 2.0,
                },
                Stop {
                    stop_id: "B".into(),
                    name: "Beta".into(),
                    lat: 3.0,
                    lon: 4.0,
                },
            ],
            transfers: vec![Transfer {
                from_stop: "A".into(),
                to_stop: "B".into(),
                min_transfer_time: Some(120),
            }],
            ..Timetable::default()
        }
    }

    #[test]
    fn round_trips_graph() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GraphCache::new(dir.path().join("graph.bin"));
        let graph = build_graph(&timetable(), &GraphConfig::default());

        cache.store(&graph, 42).unwrap();
        let loaded = cache.load(42).unwrap();

        assert_eq!(loaded.node_count(), graph.node_count());
        assert_eq!(
            loaded.edges().collect::<Vec<_>>(),
            graph.edges().collect::<Vec<_>>()
        );
        assert_eq!(loaded.stop_by_name("Beta").unwrap().stop_id, "B");
    }

    #[test]
    fn reports_missing_stale_and_corrupt_caches() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GraphCache::new(dir.path().join("nested").join("graph.bin"));
        assert!(matches!(cache.load(1), Err(Error::CacheUnavailable(_))));

        let graph = build_graph(&timetable(), &GraphConfig::default());
        cache.store(&graph, 1).unwrap();
        assert!(matches!(cache.load(2), Err(Error::CacheStale(_))));

        fs::write(cache.path(), b"garbage").unwrap();
        assert!(matches!(cache.load(1), Err(Error::CacheUnavailable(_))));
    }

    #[test]
    fn huge_length_prefix_in_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GraphCache::new(dir.path().join("graph.bin"));
        let timetable = timetable();
        let config = GraphConfig::default();
        let signature = cache_signature(&timetable, &config);
        cache
            .store(&build_graph(&timetable, &config), signature)
            .unwrap();

        // header is 12 bytes, then the node count, then the first stop id length
        let mut bytes = fs::read(cache.path()).unwrap();
        bytes[20..28].copy_from_slice(&(1u64 << 40).to_le_bytes());
        fs::write(cache.path(), &bytes).unwrap();
        assert!(matches!(
            cache.load(signature),
            Err(Error::CacheUnavailable(_))
        ));

        bytes[12..20].copy_from_slice(&u64::MAX.to_le_bytes());
        fs::write(cache.path(), &bytes).unwrap();
        assert!(matches!(
            cache.load(signature),
            Err(Error::CacheUnavailable(_))
        ));

        let rebuilt = load_or_build(Some(&cache), &timetable, &config);
        assert_eq!(rebuilt.node_count(), 2);
        assert_eq!(cache.load(signature).unwrap().node_count(), 2);
    }

    #[test]
    fn load_or_build_refreshes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GraphCache::new(dir.path().join("graph.bin"));
        let timetable = timetable();
        let config = GraphConfig::default();

        let built = load_or_build(Some(&cache), &timetable, &config);
        assert!(cache.path().exists());
        let signature = cache_signature(&timetable, &config);
        assert_eq!(cache.load(signature).unwrap().edge_count(), built.edge_count());

        let mut changed = config.clone();
        changed.default_transfer_time = 60;
        assert_ne!(cache_signature(&timetable, &changed), signature);
    }
}
