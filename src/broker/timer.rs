//! Per-node clock offsets and scheduled timer deadlines.

use std::collections::BTreeMap;

use crate::message::NodeId;

/// The state of every simulated node clock.
///
/// A node's view of time is the engine clock plus its signed offset. A timer fires when that view
/// moves strictly past the armed deadline; firing does not disarm, the node's handler re-arms.
#[derive(Clone, Debug, PartialEq)]
pub struct TimerBroker {
    offsets: BTreeMap<NodeId, i64>,
    deadlines: BTreeMap<NodeId, Option<u64>>,
}

impl TimerBroker {
    pub fn new(cluster_size: usize) -> Self {
        Self {
            offsets: (0..cluster_size).map(|id| (NodeId(id), 0)).collect(),
            deadlines: (0..cluster_size).map(|id| (NodeId(id), None)).collect(),
        }
    }

    pub fn offset(&self, id: NodeId) -> i64 {
        self.offsets.get(&id).copied().unwrap_or(0)
    }

    pub fn deadline(&self, id: NodeId) -> Option<u64> {
        self.deadlines.get(&id).copied().flatten()
    }

    /// Arms the node's timer `timeout` ms from `clock`, as that node's skewed clock tells it.
    pub fn arm(&mut self, id: NodeId, clock: u64, timeout: u64) {
        let deadline = clock as i128 + self.offset(id) as i128 + timeout as i128;
        let deadline = if deadline < 0 { 0 } else { deadline as u64 };
        self.deadlines.insert(id, Some(deadline));
    }

    /// Disarms the node's timer.
    pub fn clear(&mut self, id: NodeId) {
        self.deadlines.insert(id, None);
    }

    /// Shifts the node's clock by `amount` ms.
    pub fn skew(&mut self, id: NodeId, amount: i64) {
        if let Some(offset) = self.offsets.get_mut(&id) {
            *offset += amount;
        }
    }

    /// The ids whose timers have expired at `clock`, in ascending order.
    pub fn due(&self, clock: u64) -> Vec<NodeId> {
        self.deadlines
            .iter()
            .filter(|(id, deadline)| match deadline {
                Some(deadline) => clock as i128 + self.offset(**id) as i128 > *deadline as i128,
                None => false,
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Zeroes every clock offset. Armed deadlines are left alone.
    pub fn heal_offsets(&mut self) {
        for offset in self.offsets.values_mut() {
            *offset = 0;
        }
    }
}
