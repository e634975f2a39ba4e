//! Connectivity graph with per-edge delay and duplication counters.

use std::collections::{BTreeMap, BTreeSet};

use crate::message::NodeId;

/// The state of the simulated network.
///
/// `connections` holds every directed edge packets may traverse; an absent edge drops them.
/// `delays` and `duplicates` stay populated for every directed pair so that lookups made while
/// sending never miss.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkBroker {
    cluster: Vec<NodeId>,
    connections: BTreeSet<(NodeId, NodeId)>,
    delays: BTreeMap<(NodeId, NodeId), u64>,
    duplicates: BTreeMap<(NodeId, NodeId), u64>,
}

impl NetworkBroker {
    /// A healthy network: fully connected minus self-loops, all counters zero.
    pub fn new(cluster_size: usize) -> Self {
        let cluster: Vec<NodeId> = (0..cluster_size).map(NodeId).collect();
        let pairs = || {
            let cluster = &cluster;
            cluster.iter().flat_map(move |from| {
                cluster
                    .iter()
                    .filter(move |to| *to != from)
                    .map(move |to| (*from, *to))
            })
        };
        Self {
            connections: pairs().collect(),
            delays: pairs().map(|pair| (pair, 0)).collect(),
            duplicates: pairs().map(|pair| (pair, 0)).collect(),
            cluster,
        }
    }

    pub fn connected(&self, from: NodeId, to: NodeId) -> bool {
        self.connections.contains(&(from, to))
    }

    pub fn delay(&self, from: NodeId, to: NodeId) -> u64 {
        self.delays.get(&(from, to)).copied().unwrap_or(0)
    }

    pub fn duplicates(&self, from: NodeId, to: NodeId) -> u64 {
        self.duplicates.get(&(from, to)).copied().unwrap_or(0)
    }

    pub fn connections(&self) -> &BTreeSet<(NodeId, NodeId)> {
        &self.connections
    }

    /// Removes the edges `(from, t)` for each `t` in `affected`.
    pub fn drop_sends(&mut self, from: NodeId, affected: &BTreeSet<NodeId>) {
        for to in affected {
            self.connections.remove(&(from, *to));
        }
    }

    /// Restores the edges removed by [`drop_sends`](Self::drop_sends).
    pub fn restore_sends(&mut self, from: NodeId, affected: &BTreeSet<NodeId>) {
        for to in affected {
            if from != *to {
                self.connections.insert((from, *to));
            }
        }
    }

    /// Removes every edge towards each node in `affected`.
    pub fn drop_receives(&mut self, affected: &BTreeSet<NodeId>) {
        for to in affected {
            for from in &self.cluster {
                self.connections.remove(&(*from, *to));
            }
        }
    }

    /// Restores the edges removed by [`drop_receives`](Self::drop_receives).
    pub fn restore_receives(&mut self, affected: &BTreeSet<NodeId>) {
        for to in affected {
            for from in &self.cluster {
                if from != to {
                    self.connections.insert((*from, *to));
                }
            }
        }
    }

    /// Removes one directed edge.
    pub fn drop_edge(&mut self, pair: (NodeId, NodeId)) {
        self.connections.remove(&pair);
    }

    /// Restores one directed edge.
    pub fn restore_edge(&mut self, pair: (NodeId, NodeId)) {
        let (from, to) = pair;
        if from != to {
            self.connections.insert(pair);
        }
    }

    /// Adds `delay` ms to sends from `from` towards each node in `affected`.
    pub fn add_delay(&mut self, from: NodeId, affected: &BTreeSet<NodeId>, delay: u64) {
        for to in affected {
            if let Some(edge_delay) = self.delays.get_mut(&(from, *to)) {
                *edge_delay += delay;
            }
        }
    }

    /// Removes `delay` ms from the affected edges, saturating at zero.
    pub fn remove_delay(&mut self, from: NodeId, affected: &BTreeSet<NodeId>, delay: u64) {
        for to in affected {
            if let Some(edge_delay) = self.delays.get_mut(&(from, *to)) {
                *edge_delay = edge_delay.saturating_sub(delay);
            }
        }
    }

    /// One extra delivery for every message `from` sends, to any destination.
    pub fn add_duplicates(&mut self, from: NodeId) {
        for (edge, count) in self.duplicates.iter_mut() {
            if edge.0 == from {
                *count += 1;
            }
        }
    }

    /// Undoes [`add_duplicates`](Self::add_duplicates), never going below zero.
    pub fn remove_duplicates(&mut self, from: NodeId) {
        for (edge, count) in self.duplicates.iter_mut() {
            if edge.0 == from {
                *count = count.saturating_sub(1);
            }
        }
    }

    /// Restores the healthy state.
    pub fn heal(&mut self) {
        *self = Self::new(self.cluster.len());
    }
}
