#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeSet;

use rand_chacha::ChaChaRng;
use rand_core::SeedableRng;

use raftsim::event::Event;
use raftsim::message::{Message, NodeId, Rpc, SendableMessage, TermId, VoteResponse};
use raftsim::node::{Effect, NodeConfig, RaftNode};
use raftsim::world::{Settings, World};

pub type TestNode = RaftNode<ChaChaRng>;

pub const CLUSTER: usize = 5;

pub fn world() -> World {
    world_with(Settings::default())
}

pub fn world_with(settings: Settings) -> World {
    TestLogger::init();
    World::new(settings, NodeConfig::default())
}

pub fn node(id: usize, cluster: usize) -> TestNode {
    TestLogger::init();
    let peers: BTreeSet<NodeId> = (0..cluster).map(NodeId).collect();
    RaftNode::new(
        NodeId(id),
        peers,
        NodeConfig::default(),
        ChaChaRng::seed_from_u64(id as u64),
    )
}

pub fn rpc_types() -> [Rpc; 4] {
    [
        Rpc::VoteRequest(Default::default()),
        Rpc::VoteResponse(Default::default()),
        Rpc::AppendRequest(Default::default()),
        Rpc::AppendResponse(Default::default()),
    ]
}

pub fn send(node: &mut TestNode, from: usize, term: TermId, rpc: Rpc) -> Vec<Effect> {
    node.receive(NodeId(from), Message { term, rpc })
}

pub fn grant(node: &mut TestNode, from: usize, term: TermId) -> Vec<Effect> {
    send(
        node,
        from,
        term,
        Rpc::VoteResponse(VoteResponse { vote_granted: true }),
    )
}

/// Trips the node's timer and feeds it granted votes until it reaches quorum.
pub fn make_leader(node: &mut TestNode) {
    let _ = node.timer_trip();
    let term = node.term();
    let peers: Vec<NodeId> = node.peers().iter().copied().collect();
    for peer in peers {
        if node.is_leader() {
            break;
        }
        let _ = grant(node, peer.0, term);
    }
    assert!(node.is_leader());
}

pub fn sent_messages(effects: &[Effect]) -> Vec<&SendableMessage> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Send(sendable) => Some(sendable),
            Effect::ArmTimer(_) => None,
        })
        .collect()
}

pub fn armed_timer(effects: &[Effect]) -> Option<u64> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::ArmTimer(timeout) => Some(*timeout),
            Effect::Send(_) => None,
        })
        .last()
}

/// Executes empty steps until some node leads, up to `max_steps`.
pub fn run_until_leader(world: &mut World, max_steps: u32) -> NodeId {
    for _ in 0..max_steps {
        if let Some(leader) = world.current_leaders().first().copied() {
            return leader;
        }
        world
            .execute_step(Vec::new())
            .expect("invariant violated while waiting for a leader");
    }
    match world.current_leaders().first().copied() {
        Some(leader) => leader,
        None => panic!("no leader elected within {} steps", max_steps),
    }
}

//
// Event builders
//

pub fn node_set(ids: &[usize]) -> BTreeSet<NodeId> {
    ids.iter().copied().map(NodeId).collect()
}

pub fn send_drop(start_time: u64, event_length: u64, from: usize, affected: &[usize]) -> Event {
    Event::SendDrop {
        start_time,
        event_length,
        from: NodeId(from),
        affected_nodes: node_set(affected),
    }
}

pub fn send_delay(
    start_time: u64,
    event_length: u64,
    from: usize,
    affected: &[usize],
    delay: u64,
) -> Event {
    Event::SendDelay {
        start_time,
        event_length,
        from: NodeId(from),
        affected_nodes: node_set(affected),
        delay,
    }
}

pub fn receive_drop(start_time: u64, event_length: u64, affected: &[usize]) -> Event {
    Event::ReceiveDrop {
        start_time,
        event_length,
        affected_nodes: node_set(affected),
    }
}

pub fn transmit_drop(start_time: u64, event_length: u64, from: usize, to: usize) -> Event {
    Event::TransmitDrop {
        start_time,
        event_length,
        affected_node_pair: (NodeId(from), NodeId(to)),
    }
}

pub fn send_duplicate(start_time: u64, event_length: u64, node: usize) -> Event {
    Event::SendDuplicate {
        start_time,
        event_length,
        affected_node: NodeId(node),
    }
}

pub fn power_down(start_time: u64, event_length: u64, node: usize) -> Event {
    Event::PowerDown {
        start_time,
        event_length,
        affected_node: NodeId(node),
    }
}

pub fn clock_skew(start_time: u64, node: usize, skew_amount: i64) -> Event {
    Event::ClockSkew {
        start_time,
        affected_node: NodeId(node),
        skew_amount,
    }
}

//
// TestLogger impls
//

pub struct TestLogger;

pub struct TestLoggerContext {
    step: Option<u32>,
}

thread_local! {
    static LOGGER_CONTEXT: RefCell<TestLoggerContext> = RefCell::new(TestLoggerContext::new());
}

impl TestLogger {
    pub fn init() {
        let _ignore = log::set_logger(&Self);
        log::set_max_level(log::LevelFilter::Info);
    }

    pub fn set_step(step: Option<u32>) {
        LOGGER_CONTEXT.with(|context| {
            context.borrow_mut().step = step;
        });
    }
}

impl log::Log for TestLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        LOGGER_CONTEXT.with(|context| {
            let context = context.borrow();
            if let Some(step) = context.step {
                eprintln!("step {:02} {}", step, record.args());
            } else {
                eprintln!("{}", record.args());
            }
        })
    }

    fn flush(&self) {}
}

//
// TestLoggerContext impls
//

impl TestLoggerContext {
    const fn new() -> Self {
        Self { step: None }
    }
}
