//! The world engine: virtual clock, event dispatch, broker ownership, node wiring.
//!
//! The engine advances a monotonic tick counter and owns everything the cluster runs on: the
//! event queue, the four brokers, and (through the power broker) the node records themselves.
//! Concurrency is simulated, never real — each tick drains the events due at that instant,
//! evaluates timer expirations in ascending node-id order, then moves the clock forward and
//! checks the leader-uniqueness invariant.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use log::debug;
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng;
use serde::Serialize;

use crate::broker::file::FileBroker;
use crate::broker::network::NetworkBroker;
use crate::broker::power::{PowerBroker, SimNode};
use crate::broker::timer::TimerBroker;
use crate::error::SimError;
use crate::event::{Event, EventQueue};
use crate::invariant::LeaderLedger;
use crate::message::{Message, MessageDestination, NodeId};
use crate::node::{Effect, NodeConfig, RaftNode};
use crate::strategy::BatchParams;

/// Run settings for a simulated world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    /// Upper bound on adversarial events injected per step.
    pub catastrophy_level: usize,

    /// Ticks of virtual time advanced per step.
    pub ms_per_step: u64,

    /// Maximum `event_length` of a generated window event.
    pub max_ms_per_event: u64,

    /// Base transit time of every message, in ms.
    pub message_send_delay: u64,

    /// Number of cluster members.
    pub cluster_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catastrophy_level: 0,
            ms_per_step: 700,
            max_ms_per_event: 400,
            message_send_delay: 6,
            cluster_size: 5,
        }
    }
}

/// One entry of the reproduction log: a dispatched event or a timer expiration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum TraceRecord {
    /// An event popped from the queue and applied.
    Dispatch { at: u64, event: Event },

    /// A node's timer expired and its `timer_trip` handler ran.
    TimerTrip { at: u64, node: NodeId },
}

impl TraceRecord {
    /// The tick this record was logged at.
    pub fn at(&self) -> u64 {
        match self {
            TraceRecord::Dispatch { at, .. } | TraceRecord::TimerTrip { at, .. } => *at,
        }
    }
}

/// The simulated cluster and its environment.
pub struct World {
    settings: Settings,
    clock: u64,
    queue: EventQueue,
    network: NetworkBroker,
    power: PowerBroker,
    timers: TimerBroker,
    files: FileBroker,
    ledger: LeaderLedger,
    trace: Vec<TraceRecord>,
}

impl World {
    /// Builds a healthy cluster: every broker pristine, every node a follower with its election
    /// timer armed and its RNG seeded by its own id.
    pub fn new(settings: Settings, node_config: NodeConfig) -> Self {
        let cluster: BTreeSet<NodeId> = (0..settings.cluster_size).map(NodeId).collect();
        let nodes: BTreeMap<NodeId, SimNode> = cluster
            .iter()
            .map(|id| {
                let node = RaftNode::new(
                    *id,
                    cluster.clone(),
                    node_config.clone(),
                    ChaChaRng::seed_from_u64(id.0 as u64),
                );
                (*id, node)
            })
            .collect();

        let mut world = Self {
            clock: 0,
            queue: EventQueue::new(),
            network: NetworkBroker::new(settings.cluster_size),
            power: PowerBroker::new(nodes),
            timers: TimerBroker::new(settings.cluster_size),
            files: FileBroker::new(),
            ledger: LeaderLedger::new(),
            trace: Vec::new(),
            settings,
        };

        // nodes are brought up only after all the brokers are in place
        for id in world.power.up_ids() {
            let effects = match world.power.node_mut(id) {
                Some(node) => node.setup(),
                None => Vec::new(),
            };
            world.apply(id, effects);
        }
        world
    }

    /// The descriptor of the next adversarial batch, for the strategy layer to sample from.
    pub fn batch_params(&self) -> BatchParams {
        BatchParams {
            now: self.clock,
            ms_per_step: self.settings.ms_per_step,
            max_ms_per_event: self.settings.max_ms_per_event,
            catastrophy_level: self.settings.catastrophy_level,
            cluster_size: self.settings.cluster_size,
        }
    }

    /// Enqueues a batch of adversarial events (and their backouts) and advances virtual time by
    /// `ms_per_step` ticks, inclusive.
    ///
    /// # Errors
    ///
    /// Returns the invariant violation if two nodes are ever observed leading the same term.
    pub fn execute_step(&mut self, batch: Vec<Event>) -> Result<(), SimError> {
        for event in batch {
            let backout = event.backout();
            self.queue.push(event);
            if let Some(backout) = backout {
                self.queue.push(backout);
            }
        }

        let run_until = self.clock + self.settings.ms_per_step;
        while self.clock <= run_until {
            while let Some(event) = self.queue.pop_due(self.clock) {
                self.dispatch(event);
            }

            for id in self.timers.due(self.clock) {
                let effects = match self.power.node_mut(id) {
                    Some(node) => node.timer_trip(),
                    None => continue,
                };
                self.trace.push(TraceRecord::TimerTrip {
                    at: self.clock,
                    node: id,
                });
                self.apply(id, effects);
            }

            self.clock += 1;
            self.check_leaders()?;
        }
        Ok(())
    }

    /// The benign-run liveness check: past the halfway mark of a step with no adversity
    /// configured, some leader must have been elected.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NoLeader`] when the ledger is still empty.
    pub fn verify_liveness(&self) -> Result<(), SimError> {
        if self.settings.catastrophy_level == 0
            && self.clock > self.settings.ms_per_step / 2
            && self.ledger.is_empty()
        {
            return Err(SimError::NoLeader { ticks: self.clock });
        }
        Ok(())
    }

    /// Called back by nodes (through their effects) to hand a message to the network.
    ///
    /// The delivery lands `message_send_delay` plus the edge's current delay in the future, once
    /// per duplication count. Whether it arrives is decided against connectivity at delivery
    /// time, not now.
    pub fn send_to(&mut self, from: NodeId, to: NodeId, data: Message) {
        assert!(from != to, "{} attempted to send to itself", from);

        let at = self.clock + self.settings.message_send_delay + self.network.delay(from, to);
        let copies = 1 + self.network.duplicates(from, to);
        for _ in 0..copies {
            self.queue.push(Event::DeliverMessage {
                start_time: at,
                affected_node: to,
                sender: from,
                data: data.clone(),
            });
        }
    }

    /// Arms `node`'s timer `timeout` ms from now on its own skewed clock.
    pub fn set_timeout(&mut self, node: NodeId, timeout: u64) {
        self.timers.arm(node, self.clock, timeout);
    }

    /// Disarms `node`'s timer.
    pub fn clear_timer(&mut self, node: NodeId) {
        self.timers.clear(node);
    }

    /// Reads `node`'s file `name`, invoking the node's completion hook if the file exists.
    pub fn read_file(&mut self, node: NodeId, name: &str) {
        if let Some(data) = self.files.read(node, name) {
            let effects = match self.power.node_mut(node) {
                Some(node) => node.loaded_file(name, data),
                None => Vec::new(),
            };
            self.apply(node, effects);
        }
    }

    /// Writes `data` to `node`'s file `name` and invokes the node's completion hook.
    pub fn write_file(&mut self, node: NodeId, name: &str, data: Bytes) {
        self.files.write(node, name, data);
        let effects = match self.power.node_mut(node) {
            Some(node) => node.saved_file(name),
            None => Vec::new(),
        };
        self.apply(node, effects);
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn network(&self) -> &NetworkBroker {
        &self.network
    }

    pub fn power(&self) -> &PowerBroker {
        &self.power
    }

    pub fn timers(&self) -> &TimerBroker {
        &self.timers
    }

    pub fn ledger(&self) -> &LeaderLedger {
        &self.ledger
    }

    /// The reproduction log: every dispatched event and timer trip, in virtual-time order.
    pub fn trace(&self) -> &[TraceRecord] {
        &self.trace
    }

    /// The canonical record of a node, whether powered up or down.
    pub fn node(&self, id: NodeId) -> Option<&SimNode> {
        self.power.record(id)
    }

    /// The nodes currently in the leader role, by canonical record.
    pub fn current_leaders(&self) -> Vec<NodeId> {
        self.power
            .records()
            .filter(|node| node.is_leader())
            .map(|node| node.id())
            .collect()
    }

    pub fn has_leader(&self) -> bool {
        !self.current_leaders().is_empty()
    }

    /// Routes one due event to its broker.
    ///
    /// `PowerDown` is the one cross-broker concern: the node's timer is cleared here, by the
    /// dispatcher, before the power broker takes over. Brokers never reach into each other.
    fn dispatch(&mut self, event: Event) {
        debug!("tick {} dispatching {:?}", self.clock, event);
        self.trace.push(TraceRecord::Dispatch {
            at: self.clock,
            event: event.clone(),
        });

        match event {
            Event::SendDrop {
                from,
                affected_nodes,
                ..
            } => self.network.drop_sends(from, &affected_nodes),
            Event::StopSendDrop {
                from,
                affected_nodes,
                ..
            } => self.network.restore_sends(from, &affected_nodes),
            Event::SendDelay {
                from,
                affected_nodes,
                delay,
                ..
            } => self.network.add_delay(from, &affected_nodes, delay),
            Event::StopSendDelay {
                from,
                affected_nodes,
                delay,
                ..
            } => self.network.remove_delay(from, &affected_nodes, delay),
            Event::ReceiveDrop { affected_nodes, .. } => self.network.drop_receives(&affected_nodes),
            Event::StopReceiveDrop { affected_nodes, .. } => {
                self.network.restore_receives(&affected_nodes)
            }
            Event::TransmitDrop {
                affected_node_pair, ..
            } => self.network.drop_edge(affected_node_pair),
            Event::StopTransmitDrop {
                affected_node_pair, ..
            } => self.network.restore_edge(affected_node_pair),
            Event::SendDuplicate { affected_node, .. } => self.network.add_duplicates(affected_node),
            Event::StopSendDuplicate { affected_node, .. } => {
                self.network.remove_duplicates(affected_node)
            }
            Event::DeliverMessage {
                affected_node,
                sender,
                data,
                ..
            } => {
                if self.network.connected(sender, affected_node) {
                    let effects = match self.power.node_mut(affected_node) {
                        Some(node) => node.receive(sender, data),
                        None => Vec::new(),
                    };
                    self.apply(affected_node, effects);
                }
            }
            Event::PowerDown { affected_node, .. } => {
                self.timers.clear(affected_node);
                self.power.power_down(affected_node);
            }
            Event::StopPowerDown { affected_node, .. } => self.power.power_up(affected_node),
            Event::ClockSkew {
                affected_node,
                skew_amount,
                ..
            } => self.timers.skew(affected_node, skew_amount),
            Event::HealNetwork { .. } => self.network.heal(),
            Event::HealPower { .. } => self.power.heal(),
            Event::HealTimer { .. } => self.timers.heal_offsets(),
        }
    }

    /// Applies the effects a node returned: sends become future deliveries, timer re-arms go to
    /// the timer broker.
    fn apply(&mut self, origin: NodeId, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(sendable) => match sendable.dest {
                    MessageDestination::Broadcast => {
                        for to in 0..self.settings.cluster_size {
                            let to = NodeId(to);
                            if to != origin {
                                self.send_to(origin, to, sendable.message.clone());
                            }
                        }
                    }
                    MessageDestination::To(to) => self.send_to(origin, to, sendable.message),
                },
                Effect::ArmTimer(timeout) => self.set_timeout(origin, timeout),
            }
        }
    }

    /// Records every current leadership claim and checks per-term uniqueness.
    fn check_leaders(&mut self) -> Result<(), SimError> {
        let ledger = &mut self.ledger;
        for node in self.power.records() {
            if node.is_leader() {
                ledger.observe(node.term(), node.id());
            }
        }
        ledger.check()
    }
}
