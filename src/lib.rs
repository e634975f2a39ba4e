//! A deterministic, discrete-event simulator for a replicated Raft-style cluster.
//!
//! The simulator exists to verify safety invariants of leader election — chiefly "at most one
//! leader per term" — under adversarial scheduling of message delivery, clock skew, node power
//! cycles, and network partitions. There is no real time and no real I/O: a
//! [`World`](world::World) advances a virtual clock tick by tick, draining a deterministic event
//! queue into four broker subsystems (network, power, timer, file) that model the environment the
//! [`RaftNode`](node::RaftNode) state machines run in.
//!
//! Adversity is described by [`Event`](event::Event) lists. Window events (edge drops, added
//! delay, duplication, power-downs) carry an `event_length` and schedule their own backout, so
//! every injected fault heals itself and the same queue drives both halves of the window. The
//! [`strategy`] module generates batches of such events with `proptest`, which makes failing
//! schedules shrinkable; the engine itself only ever consumes them.
//!
//! Determinism is load-bearing throughout: per-node RNGs are seeded by node id, the event queue
//! breaks ties by insertion order, and timer expirations are evaluated in ascending node-id
//! order. Running the same batches against a fresh world replays the same history, which is what
//! makes a dumped trace a reproducer.
//!
//! # Example
//!
//! ```
//! use raftsim::event::Event;
//! use raftsim::message::NodeId;
//! use raftsim::node::NodeConfig;
//! use raftsim::world::{Settings, World};
//!
//! let mut world = World::new(Settings::default(), NodeConfig::default());
//!
//! // A quiet first step: the cluster elects a leader on its own.
//! world.execute_step(Vec::new()).expect("no safety violation");
//! world.verify_liveness().expect("a leader was elected");
//! assert!(world.has_leader());
//!
//! // Cut one wire for 200 ms; safety must survive.
//! let partition = Event::TransmitDrop {
//!     start_time: world.clock() + 10,
//!     event_length: 200,
//!     affected_node_pair: (NodeId(0), NodeId(1)),
//! };
//! world.execute_step(vec![partition]).expect("no safety violation");
//! ```

pub mod broker;
pub mod error;
pub mod event;
pub mod invariant;
pub mod message;
pub mod node;
pub mod strategy;
pub mod world;
