//! Immutable ride/transfer multigraph

use geo::Point;
use hashbrown::HashMap;
use petgraph::{
    graph::{DiGraph, EdgeIndex, EdgeReference, NodeIndex},
    visit::EdgeRef,
};
use serde::{Deserialize, Serialize};

use super::TransportMode;
use crate::Time;

/// Graph node: one stop with the lookup data needed for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopNode {
    pub stop_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl StopNode {
    pub fn location(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Travel aboard one trip between two consecutive stops
    Ride {
        trip_id: String,
        route_id: Option<String>,
    },
    /// Walking or interchange link
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitEdge {
    /// Composite cost: scaled travel time plus any modal-change penalty
    pub weight: Time,
    /// Raw scheduled duration in seconds
    pub duration: Time,
    pub kind: EdgeKind,
    pub mode: TransportMode,
    pub route_name: String,
}

impl TransitEdge {
    pub fn is_transfer(&self) -> bool {
        matches!(self.kind, EdgeKind::Transfer)
    }

    pub fn trip_id(&self) -> Option<&str> {
        match &self.kind {
            EdgeKind::Ride { trip_id, .. } => Some(trip_id),
            EdgeKind::Transfer => None,
        }
    }

    pub fn mode_label(&self) -> &'static str {
        if self.is_transfer() {
            "Transfer"
        } else {
            self.mode.label()
        }
    }
}

/// Directed multigraph of stops. Parallel edges from different trips are all
/// kept so that every edge can be attributed to the trip that produced it.
///
/// Only the builder and the cache can create one; afterwards it is read-only
/// and can be shared between threads.
#[derive(Debug, Clone, Default)]
pub struct TransitGraph {
    graph: DiGraph<StopNode, TransitEdge>,
    stop_index: HashMap<String, NodeIndex>,
    name_index: HashMap<String, NodeIndex>,
}

impl TransitGraph {
    pub(crate) fn from_graph(graph: DiGraph<StopNode, TransitEdge>) -> Self {
        let mut stop_index = HashMap::with_capacity(graph.node_count());
        let mut name_index = HashMap::with_capacity(graph.node_count());
        for idx in graph.node_indices() {
            let node = &graph[idx];
            stop_index.insert(node.stop_id.clone(), idx);
            name_index.entry(node.name.clone()).or_insert(idx);
        }
        Self {
            graph,
            stop_index,
            name_index,
        }
    }

    pub(crate) fn add_stop(&mut self, node: StopNode) -> NodeIndex {
        if let Some(&idx) = self.stop_index.get(&node.stop_id) {
            return idx;
        }
        let stop_id = node.stop_id.clone();
        let name = node.name.clone();
        let idx = self.graph.add_node(node);
        self.stop_index.insert(stop_id, idx);
        self.name_index.entry(name).or_insert(idx);
        idx
    }

    /// Self loops are rejected
    pub(crate) fn add_edge(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        edge: TransitEdge,
    ) -> Option<EdgeIndex> {
        if from == to {
            return None;
        }
        Some(self.graph.add_edge(from, to, edge))
    }

    pub(crate) fn inner(&self) -> &DiGraph<StopNode, TransitEdge> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_index(&self, stop_id: &str) -> Option<NodeIndex> {
        self.stop_index.get(stop_id).copied()
    }

    pub fn contains_stop(&self, stop_id: &str) -> bool {
        self.stop_index.contains_key(stop_id)
    }

    pub fn stop(&self, idx: NodeIndex) -> Option<&StopNode> {
        self.graph.node_weight(idx)
    }

    pub fn stop_by_id(&self, stop_id: &str) -> Option<&StopNode> {
        self.node_index(stop_id).and_then(|idx| self.stop(idx))
    }

    /// First stop carrying this display name
    pub fn stop_by_name(&self, name: &str) -> Option<&StopNode> {
        self.name_index.get(name).and_then(|&idx| self.stop(idx))
    }

    pub fn stop_name(&self, stop_id: &str) -> Option<&str> {
        self.stop_by_id(stop_id).map(|stop| stop.name.as_str())
    }

    pub fn stops(&self) -> impl Iterator<Item = &StopNode> {
        self.graph.node_weights()
    }

    pub fn edge(&self, idx: EdgeIndex) -> Option<&TransitEdge> {
        self.graph.edge_weight(idx)
    }

    pub fn edges_from(&self, node: NodeIndex) -> impl Iterator<Item = EdgeReference<'_, TransitEdge>> {
        self.graph.edges(node)
    }

    /// All parallel edges from one stop to another
    pub fn edges_between(&self, from: &str, to: &str) -> Vec<&TransitEdge> {
        match (self.node_index(from), self.node_index(to)) {
            (Some(a), Some(b)) => self
                .graph
                .edges_connecting(a, b)
                .map(|edge| edge.weight())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Every edge as `(from stop, to stop, edge)`, in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &TransitEdge)> {
        self.graph.edge_references().map(|edge| {
            (
                self.graph[edge.source()].stop_id.as_str(),
                self.graph[edge.target()].stop_id.as_str(),
                edge.weight(),
            )
        })
    }
}
