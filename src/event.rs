//! The adversarial event taxonomy and the virtual-time event queue.
//!
//! Every perturbation of the simulated world is an [`Event`]: network edge drops, extra delivery
//! delay, message duplication, node power cycles, clock skew, heals, and the delivery of Raft
//! messages themselves. Window events carry an `event_length` and know how to build their
//! [`backout`](Event::backout) — the `Stop*` variant scheduled at the end of the window which
//! undoes their effect.
//!
//! Events serialize as internally-tagged records (`"event_type": "SendDrop", ...`) so that a trace
//! of a failing run can be replayed from its log.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::message::{Message, NodeId};

/// An event scheduled against the world's virtual clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum Event {
    /// Drop every packet sent by `from` towards each node in `affected_nodes`.
    SendDrop {
        start_time: u64,
        event_length: u64,
        from: NodeId,
        affected_nodes: BTreeSet<NodeId>,
    },
    /// Backout of [`SendDrop`](Event::SendDrop): restore the dropped edges.
    StopSendDrop {
        start_time: u64,
        from: NodeId,
        affected_nodes: BTreeSet<NodeId>,
    },

    /// Add `delay` ms to every packet sent by `from` towards each node in `affected_nodes`.
    SendDelay {
        start_time: u64,
        event_length: u64,
        from: NodeId,
        affected_nodes: BTreeSet<NodeId>,
        delay: u64,
    },
    /// Backout of [`SendDelay`](Event::SendDelay): remove the added delay.
    StopSendDelay {
        start_time: u64,
        from: NodeId,
        affected_nodes: BTreeSet<NodeId>,
        delay: u64,
    },

    /// Drop every packet addressed to any node in `affected_nodes`, from anywhere.
    ReceiveDrop {
        start_time: u64,
        event_length: u64,
        affected_nodes: BTreeSet<NodeId>,
    },
    /// Backout of [`ReceiveDrop`](Event::ReceiveDrop).
    StopReceiveDrop {
        start_time: u64,
        affected_nodes: BTreeSet<NodeId>,
    },

    /// Drop every packet on one directed edge.
    TransmitDrop {
        start_time: u64,
        event_length: u64,
        affected_node_pair: (NodeId, NodeId),
    },
    /// Backout of [`TransmitDrop`](Event::TransmitDrop).
    StopTransmitDrop {
        start_time: u64,
        affected_node_pair: (NodeId, NodeId),
    },

    /// Deliver one extra copy of every message sent by `affected_node`.
    SendDuplicate {
        start_time: u64,
        event_length: u64,
        affected_node: NodeId,
    },
    /// Backout of [`SendDuplicate`](Event::SendDuplicate).
    StopSendDuplicate {
        start_time: u64,
        affected_node: NodeId,
    },

    /// The attempted delivery of a Raft message to `affected_node`.
    ///
    /// Whether delivery succeeds is decided at dispatch time against the network's current
    /// connectivity; a powered-down target silently discards the payload.
    DeliverMessage {
        start_time: u64,
        affected_node: NodeId,
        sender: NodeId,
        data: Message,
    },

    /// Power off `affected_node`, preserving its record for the matching backout.
    PowerDown {
        start_time: u64,
        event_length: u64,
        affected_node: NodeId,
    },
    /// Backout of [`PowerDown`](Event::PowerDown): restore the preserved record.
    StopPowerDown {
        start_time: u64,
        affected_node: NodeId,
    },

    /// Shift `affected_node`'s clock by `skew_amount` ms, once. No backout.
    ClockSkew {
        start_time: u64,
        affected_node: NodeId,
        skew_amount: i64,
    },

    /// Restore full connectivity and zero every per-edge counter.
    HealNetwork { start_time: u64 },
    /// Restore every powered-down node.
    HealPower { start_time: u64 },
    /// Zero every clock offset.
    HealTimer { start_time: u64 },
}

impl Event {
    /// The absolute virtual-time tick at which this event fires.
    pub fn start_time(&self) -> u64 {
        match self {
            Event::SendDrop { start_time, .. }
            | Event::StopSendDrop { start_time, .. }
            | Event::SendDelay { start_time, .. }
            | Event::StopSendDelay { start_time, .. }
            | Event::ReceiveDrop { start_time, .. }
            | Event::StopReceiveDrop { start_time, .. }
            | Event::TransmitDrop { start_time, .. }
            | Event::StopTransmitDrop { start_time, .. }
            | Event::SendDuplicate { start_time, .. }
            | Event::StopSendDuplicate { start_time, .. }
            | Event::DeliverMessage { start_time, .. }
            | Event::PowerDown { start_time, .. }
            | Event::StopPowerDown { start_time, .. }
            | Event::ClockSkew { start_time, .. }
            | Event::HealNetwork { start_time }
            | Event::HealPower { start_time }
            | Event::HealTimer { start_time } => *start_time,
        }
    }

    /// The event undoing this one, scheduled at `start_time + event_length`.
    ///
    /// Returns `None` for instantaneous events (`ClockSkew`, heals, deliveries and the `Stop*`
    /// variants themselves).
    pub fn backout(&self) -> Option<Event> {
        match self {
            Event::SendDrop {
                start_time,
                event_length,
                from,
                affected_nodes,
            } => Some(Event::StopSendDrop {
                start_time: start_time + event_length,
                from: *from,
                affected_nodes: affected_nodes.clone(),
            }),
            Event::SendDelay {
                start_time,
                event_length,
                from,
                affected_nodes,
                delay,
            } => Some(Event::StopSendDelay {
                start_time: start_time + event_length,
                from: *from,
                affected_nodes: affected_nodes.clone(),
                delay: *delay,
            }),
            Event::ReceiveDrop {
                start_time,
                event_length,
                affected_nodes,
            } => Some(Event::StopReceiveDrop {
                start_time: start_time + event_length,
                affected_nodes: affected_nodes.clone(),
            }),
            Event::TransmitDrop {
                start_time,
                event_length,
                affected_node_pair,
            } => Some(Event::StopTransmitDrop {
                start_time: start_time + event_length,
                affected_node_pair: *affected_node_pair,
            }),
            Event::SendDuplicate {
                start_time,
                event_length,
                affected_node,
            } => Some(Event::StopSendDuplicate {
                start_time: start_time + event_length,
                affected_node: *affected_node,
            }),
            Event::PowerDown {
                start_time,
                event_length,
                affected_node,
            } => Some(Event::StopPowerDown {
                start_time: start_time + event_length,
                affected_node: *affected_node,
            }),
            Event::StopSendDrop { .. }
            | Event::StopSendDelay { .. }
            | Event::StopReceiveDrop { .. }
            | Event::StopTransmitDrop { .. }
            | Event::StopSendDuplicate { .. }
            | Event::DeliverMessage { .. }
            | Event::StopPowerDown { .. }
            | Event::ClockSkew { .. }
            | Event::HealNetwork { .. }
            | Event::HealPower { .. }
            | Event::HealTimer { .. } => None,
        }
    }
}

/// A queue entry: an event keyed by its start time and an insertion sequence number.
///
/// The sequence number makes the heap order total. Two events sharing a tick always dispatch in
/// insertion order, which is what makes a failing trace replayable.
#[derive(Clone, Debug)]
struct Scheduled {
    at: u64,
    seq: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// A min-heap of [`Event`]s ordered by `(start_time, insertion sequence)`.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `event` at its own `start_time`.
    pub fn push(&mut self, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled {
            at: event.start_time(),
            seq,
            event,
        }));
    }

    /// Pops the head event if it is scheduled exactly at `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<Event> {
        match self.heap.peek() {
            Some(Reverse(scheduled)) if scheduled.at == now => {
                self.heap.pop().map(|Reverse(scheduled)| scheduled.event)
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
