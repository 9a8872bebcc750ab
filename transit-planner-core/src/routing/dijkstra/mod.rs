//! Shortest-path search over the transit graph

mod state;

use std::collections::BinaryHeap;
use std::time::Instant;

use fixedbitset::FixedBitSet;
use hashbrown::HashMap;
use log::debug;
use petgraph::{
    graph::{EdgeIndex, EdgeReference, NodeIndex},
    visit::EdgeRef,
};
use serde::{Deserialize, Serialize};

use state::State;

use crate::{EdgeKind, Error, Time, TransitEdge, TransitGraph};

/// How many heap pops happen between two deadline checks
const DEADLINE_CHECK_INTERVAL: usize = 64;

/// Ordered stops from start to end with the cost of the search that found them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub stops: Vec<String>,
    pub cost: u64,
    /// Graph edges chosen between consecutive stops
    #[serde(skip)]
    pub edges: Vec<EdgeIndex>,
    /// Ride or transfer behind each entry of `edges`
    #[serde(skip)]
    pub hops: Vec<EdgeKind>,
}

impl Path {
    /// A path that was not produced by a search, e.g. one handed back by a
    /// caller. Consecutive duplicates are collapsed.
    pub fn from_stops(mut stops: Vec<String>) -> Self {
        stops.dedup();
        Self {
            stops,
            cost: 0,
            edges: Vec::new(),
            hops: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn start(&self) -> Option<&str> {
        self.stops.first().map(String::as_str)
    }

    pub fn end(&self) -> Option<&str> {
        self.stops.last().map(String::as_str)
    }
}

/// Minimum-cost path from `start` to `end`.
///
/// `edge_cost` gives the cost of each edge for this query. Ties are resolved
/// deterministically: nodes with equal cost leave the heap in node-index
/// order and a predecessor is only replaced by a strictly cheaper one, so the
/// same graph and cost function always give the same path. Among parallel
/// edges the cheapest one, or the first one seen on a tie, is used.
///
/// A `deadline` that passes during the search aborts it; no partial path is
/// returned.
///
/// # Errors
///
/// [`Error::UnknownStop`] if either stop is not in the graph,
/// [`Error::NotFound`] if `end` is unreachable or the deadline passed.
pub fn find_path<F>(
    graph: &TransitGraph,
    start: &str,
    end: &str,
    edge_cost: F,
    deadline: Option<Instant>,
) -> Result<Path, Error>
where
    F: Fn(EdgeReference<'_, TransitEdge>) -> Time,
{
    let source = graph
        .node_index(start)
        .ok_or_else(|| Error::UnknownStop(start.to_string()))?;
    let target = graph
        .node_index(end)
        .ok_or_else(|| Error::UnknownStop(end.to_string()))?;

    if source == target {
        return Ok(Path {
            stops: vec![start.to_string()],
            cost: 0,
            edges: Vec::new(),
            hops: Vec::new(),
        });
    }

    let not_found = || Error::NotFound {
        from: start.to_string(),
        to: end.to_string(),
    };

    let mut distances: HashMap<NodeIndex, u64> = HashMap::new();
    let mut predecessors: HashMap<NodeIndex, (NodeIndex, EdgeIndex)> = HashMap::new();
    let mut settled = FixedBitSet::with_capacity(graph.node_count());
    let mut heap = BinaryHeap::new();

    heap.push(State {
        cost: 0,
        node: source,
    });
    distances.insert(source, 0);

    let mut pops = 0usize;
    let mut reached = false;

    while let Some(State { cost, node }) = heap.pop() {
        if let Some(deadline) = deadline {
            if pops % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                debug!("Search {start} -> {end} aborted by deadline after {pops} steps");
                return Err(not_found());
            }
        }
        pops += 1;

        if node == target {
            reached = true;
            break;
        }

        // Stale heap entry
        if settled.contains(node.index()) {
            continue;
        }
        settled.insert(node.index());

        for edge in graph.edges_from(node) {
            let next = edge.target();
            if settled.contains(next.index()) {
                continue;
            }
            let next_cost = cost + u64::from(edge_cost(edge));

            match distances.entry(next) {
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(next_cost);
                    predecessors.insert(next, (node, edge.id()));
                    heap.push(State {
                        cost: next_cost,
                        node: next,
                    });
                }
                hashbrown::hash_map::Entry::Occupied(mut entry) => {
                    if next_cost < *entry.get() {
                        *entry.get_mut() = next_cost;
                        predecessors.insert(next, (node, edge.id()));
                        heap.push(State {
                            cost: next_cost,
                            node: next,
                        });
                    }
                }
            }
        }
    }

    if !reached {
        return Err(not_found());
    }

    // Follow predecessors backward from target to source
    let mut nodes = vec![target];
    let mut edges = Vec::new();
    let mut current = target;
    while current != source {
        let &(previous, edge) = predecessors.get(&current).ok_or_else(not_found)?;
        nodes.push(previous);
        edges.push(edge);
        current = previous;
    }
    nodes.reverse();
    edges.reverse();

    let stops = nodes
        .into_iter()
        .filter_map(|idx| graph.stop(idx).map(|stop| stop.stop_id.clone()))
        .collect();
    let hops = edges
        .iter()
        .filter_map(|&idx| graph.edge(idx).map(|edge| edge.kind.clone()))
        .collect();

    Ok(Path {
        stops,
        cost: distances.get(&target).copied().unwrap_or_default(),
        edges,
        hops,
    })
}
