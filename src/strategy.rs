//! Proptest strategies for adversarial event batches.
//!
//! The engine only consumes event lists; generating them — randomly, but shrinkably — is this
//! module's job. A [`BatchParams`] (obtained from
//! [`World::batch_params`](crate::world::World::batch_params)) pins the generated events to the
//! world's current time window and configured limits.

use std::collections::BTreeSet;

use proptest::collection::{btree_set, vec};
use proptest::prelude::*;

use crate::event::Event;
use crate::message::NodeId;

/// Everything a strategy needs to know to generate one step's batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchParams {
    /// The world's current tick; generated `start_time`s are at or after it.
    pub now: u64,

    /// Window width: `start_time` lies in `[now, now + ms_per_step]`.
    pub ms_per_step: u64,

    /// Upper bound on a window event's `event_length`.
    pub max_ms_per_event: u64,

    /// Upper bound on the batch size.
    pub catastrophy_level: usize,

    /// Number of cluster members to aim events at.
    pub cluster_size: usize,
}

/// One node id within the cluster.
pub fn node_id(params: BatchParams) -> impl Strategy<Value = NodeId> {
    (0..params.cluster_size).prop_map(NodeId)
}

/// A possibly-empty set of node ids.
pub fn node_set(params: BatchParams) -> impl Strategy<Value = BTreeSet<NodeId>> {
    btree_set(node_id(params), 0..=params.cluster_size)
}

/// A directed pair of two distinct node ids.
pub fn node_pair(params: BatchParams) -> impl Strategy<Value = (NodeId, NodeId)> {
    let size = params.cluster_size;
    (0..size, 0..size - 1).prop_map(|(from, to)| {
        let to = if to >= from { to + 1 } else { to };
        (NodeId(from), NodeId(to))
    })
}

fn start_time(params: BatchParams) -> impl Strategy<Value = u64> {
    params.now..=params.now + params.ms_per_step
}

fn event_length(params: BatchParams) -> impl Strategy<Value = u64> {
    1..=params.max_ms_per_event.max(1)
}

/// Any single network perturbation.
pub fn network_event(params: BatchParams) -> BoxedStrategy<Event> {
    prop_oneof![
        (start_time(params), event_length(params), node_id(params), node_set(params)).prop_map(
            |(start_time, event_length, from, affected_nodes)| Event::SendDrop {
                start_time,
                event_length,
                from,
                affected_nodes,
            }
        ),
        (
            start_time(params),
            event_length(params),
            node_id(params),
            node_set(params),
            event_length(params),
        )
            .prop_map(
                |(start_time, event_length, from, affected_nodes, delay)| Event::SendDelay {
                    start_time,
                    event_length,
                    from,
                    affected_nodes,
                    delay,
                }
            ),
        (start_time(params), event_length(params), node_set(params)).prop_map(
            |(start_time, event_length, affected_nodes)| Event::ReceiveDrop {
                start_time,
                event_length,
                affected_nodes,
            }
        ),
        (start_time(params), event_length(params), node_pair(params)).prop_map(
            |(start_time, event_length, affected_node_pair)| Event::TransmitDrop {
                start_time,
                event_length,
                affected_node_pair,
            }
        ),
        (start_time(params), event_length(params), node_id(params)).prop_map(
            |(start_time, event_length, affected_node)| Event::SendDuplicate {
                start_time,
                event_length,
                affected_node,
            }
        ),
    ]
    .boxed()
}

/// A node power-cycle window.
pub fn power_event(params: BatchParams) -> BoxedStrategy<Event> {
    (start_time(params), event_length(params), node_id(params))
        .prop_map(|(start_time, event_length, affected_node)| Event::PowerDown {
            start_time,
            event_length,
            affected_node,
        })
        .boxed()
}

/// A one-shot clock skew of up to ±100 ms.
pub fn clock_event(params: BatchParams) -> BoxedStrategy<Event> {
    (start_time(params), node_id(params), -100i64..=100)
        .prop_map(|(start_time, affected_node, skew_amount)| Event::ClockSkew {
            start_time,
            affected_node,
            skew_amount,
        })
        .boxed()
}

/// Any single adversarial event.
pub fn adverse_event(params: BatchParams) -> BoxedStrategy<Event> {
    prop_oneof![
        network_event(params),
        power_event(params),
        clock_event(params),
    ]
    .boxed()
}

/// One step's batch: up to `catastrophy_level` adversarial events.
pub fn event_batch(params: BatchParams) -> BoxedStrategy<Vec<Event>> {
    vec(adverse_event(params), 0..=params.catastrophy_level).boxed()
}
