//! Up/down node registries and power transition semantics.

use std::collections::BTreeMap;

use log::info;
use rand_chacha::ChaChaRng;

use crate::message::NodeId;
use crate::node::RaftNode;

/// The node record type the simulation runs with.
pub type SimNode = RaftNode<ChaChaRng>;

/// Owns every node record, split between powered-up and powered-down registries.
///
/// The two maps partition the cluster id set exactly. A powered-down node is simply absent from
/// `up`: delivery and timer routing go through [`node_mut`](Self::node_mut), so a downed node
/// silently discards everything while its real record waits in `down` to be restored on
/// power-up.
pub struct PowerBroker {
    up: BTreeMap<NodeId, SimNode>,
    down: BTreeMap<NodeId, SimNode>,
}

impl PowerBroker {
    pub fn new(nodes: BTreeMap<NodeId, SimNode>) -> Self {
        Self {
            up: nodes,
            down: BTreeMap::new(),
        }
    }

    /// The live record of an up node, or `None` when the node is powered down.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SimNode> {
        self.up.get_mut(&id)
    }

    /// The canonical record of a node, up or down.
    ///
    /// Invariant checking must see through the power state: a leader that lost power is still the
    /// leader its term elected.
    pub fn record(&self, id: NodeId) -> Option<&SimNode> {
        self.up.get(&id).or_else(|| self.down.get(&id))
    }

    /// Iterates every canonical record in ascending id order.
    pub fn records(&self) -> impl Iterator<Item = &SimNode> {
        let mut records: Vec<&SimNode> = self.up.values().chain(self.down.values()).collect();
        records.sort_by_key(|node| node.id());
        records.into_iter()
    }

    pub fn is_up(&self, id: NodeId) -> bool {
        self.up.contains_key(&id)
    }

    pub fn up_ids(&self) -> Vec<NodeId> {
        self.up.keys().copied().collect()
    }

    pub fn down_ids(&self) -> Vec<NodeId> {
        self.down.keys().copied().collect()
    }

    /// Moves a node's record into the `down` registry. A node already down is left alone:
    /// overlapping power windows are legal schedules, not errors.
    pub fn power_down(&mut self, id: NodeId) {
        if let Some(node) = self.up.remove(&id) {
            info!("{} powered down", id);
            self.down.insert(id, node);
        }
    }

    /// Restores a node's preserved record, only if it is currently down.
    pub fn power_up(&mut self, id: NodeId) {
        if let Some(node) = self.down.remove(&id) {
            info!("{} powered up", id);
            self.up.insert(id, node);
        }
    }

    /// Restores every downed node.
    pub fn heal(&mut self) {
        let downed: Vec<NodeId> = self.down.keys().copied().collect();
        for id in downed {
            self.power_up(id);
        }
    }
}
