//! The Raft leader-election state machine.
//!
//! A [`RaftNode`] is driven entirely from outside, in the engine's virtual time:
//!
//! * When a message arrives from a peer: [`receive`](RaftNode::receive) is called.
//! * When the node's armed timer expires: [`timer_trip`](RaftNode::timer_trip) is called.
//!
//! Each of these modifies the internal state and returns [`Effect`]s — messages to hand to the
//! network and timer re-arms — for the engine to apply. Nodes never hold a reference to the
//! engine; the effect list is the entire contract between them.
//!
//! This core exercises leader election only. The log stays empty, but its length is carried in
//! RPCs so replication can be layered on without changing the wire shape.

use std::collections::BTreeSet;

use bytes::Bytes;
use log::{info, warn};
use rand_core::RngCore;

use crate::message::{
    AppendRequest, LogEntry, Message, MessageDestination, NodeId, Rpc, SendableMessage, TermId,
    VoteRequest, VoteResponse,
};

/// Configurable parameters shared by every node in a cluster.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeConfig {
    /// Election timeouts are drawn uniformly from this inclusive window, in ms.
    pub election_timeout_window: (u64, u64),

    /// The period on which a leader re-broadcasts empty `AppendEntries`, in ms.
    pub heartbeat_timeout: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            election_timeout_window: (150, 300),
            heartbeat_timeout: 50,
        }
    }
}

/// The role of a node within its cluster.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

/// What a node asks of its environment in response to an input.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Hand a message to the network.
    Send(SendableMessage),

    /// (Re-)arm this node's timer to fire the given number of ms from now, measured on the node's
    /// own (possibly skewed) clock.
    ArmTimer(u64),
}

/// A single cluster member's record: role, term, vote accounting, log, and its own seeded RNG.
pub struct RaftNode<Random> {
    id: NodeId,
    peers: BTreeSet<NodeId>,
    config: NodeConfig,
    random: Random,

    role: Role,
    current_term: TermId,
    voted_for: Option<NodeId>,
    votes_received: BTreeSet<NodeId>,
    log: Vec<LogEntry>,
    commit_idx: usize,
    last_applied: usize,
    election_timeout: u64,
}

impl<Random> RaftNode<Random>
where
    Random: RngCore,
{
    /// Constructs a follower with a freshly drawn election timeout.
    ///
    /// `peers` may contain `id` or omit it to the same effect. `random` must be seeded
    /// deterministically per node for runs to be reproducible.
    pub fn new(id: NodeId, mut peers: BTreeSet<NodeId>, config: NodeConfig, mut random: Random) -> Self {
        peers.remove(&id);
        let election_timeout = random_election_timeout(&mut random, config.election_timeout_window);
        Self {
            id,
            peers,
            config,
            random,
            role: Role::Follower,
            current_term: TermId::default(),
            voted_for: None,
            votes_received: BTreeSet::new(),
            log: Vec::new(),
            commit_idx: 0,
            last_applied: 0,
            election_timeout,
        }
    }

    /// Brings the node up: arms its election timer. Called once, after every broker is in place.
    #[must_use = "the returned effects must be applied to the world"]
    pub fn setup(&mut self) -> Vec<Effect> {
        vec![Effect::ArmTimer(self.election_timeout)]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_follower(&self) -> bool {
        self.role == Role::Follower
    }

    pub fn is_candidate(&self) -> bool {
        self.role == Role::Candidate
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    pub fn term(&self) -> TermId {
        self.current_term
    }

    pub fn voted_for(&self) -> Option<NodeId> {
        self.voted_for
    }

    pub fn votes_received(&self) -> &BTreeSet<NodeId> {
        &self.votes_received
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn commit_idx(&self) -> usize {
        self.commit_idx
    }

    pub fn last_applied(&self) -> usize {
        self.last_applied
    }

    pub fn election_timeout(&self) -> u64 {
        self.election_timeout
    }

    pub fn peers(&self) -> &BTreeSet<NodeId> {
        &self.peers
    }

    /// Handles an expired timer.
    ///
    /// A non-leader starts (or restarts) an election: it becomes a candidate, bumps its term,
    /// votes for itself and asks every peer for theirs. A leader broadcasts its heartbeat and
    /// re-arms the heartbeat timer.
    #[must_use = "the returned effects must be applied to the world"]
    pub fn timer_trip(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.is_leader() {
            let mut term = self.current_term;
            term += 1;
            // the new-candidate bypass: bumping our own term must not demote us back to follower.
            // The bump also draws the fresh election timeout, so the candidate arms with it.
            self.update_term(term, true, &mut effects);
            self.change_role(Role::Candidate, &mut effects);
            self.voted_for = Some(self.id);
            self.votes_received.insert(self.id);
            info!("{} became candidate at {}", self.id, self.current_term);

            effects.push(Effect::Send(SendableMessage {
                message: Message {
                    term: self.current_term,
                    rpc: Rpc::VoteRequest(VoteRequest {
                        last_log_idx: self.log.len(),
                        last_log_term: self.log.last().map(|entry| entry.term),
                    }),
                },
                dest: MessageDestination::Broadcast,
            }));
        } else {
            effects.push(Effect::Send(SendableMessage {
                message: Message {
                    term: self.current_term,
                    rpc: Rpc::AppendRequest(AppendRequest {
                        last_log_idx: self.log.len(),
                        last_entry: self.log.last().cloned(),
                        entries: Vec::new(),
                        leader_commit: self.commit_idx,
                    }),
                },
                dest: MessageDestination::Broadcast,
            }));
            effects.push(Effect::ArmTimer(self.config.heartbeat_timeout));
        }
        effects
    }

    /// Processes receipt of `message` from the peer `from`.
    #[must_use = "the returned effects must be applied to the world"]
    pub fn receive(&mut self, from: NodeId, message: Message) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.peers.contains(&from) {
            warn!("{} received message from {} for wrong cluster", self.id, from);
            return effects;
        }

        self.update_term(message.term, false, &mut effects);
        match message.rpc {
            Rpc::AppendRequest(_) => match self.role {
                Role::Follower => effects.push(Effect::ArmTimer(self.election_timeout)),
                Role::Candidate | Role::Leader => {
                    info!("{} became follower at {} of {}", self.id, self.current_term, from);
                    self.change_role(Role::Follower, &mut effects);
                }
            },
            Rpc::VoteRequest(request) => {
                let grant = message.term >= self.current_term && self.voted_for.is_none();
                if grant {
                    self.voted_for = Some(from);
                    info!(
                        "{} granted vote at {} for {} with {} entries at {:?}",
                        self.id, self.current_term, from, request.last_log_idx, request.last_log_term
                    );
                } else if let Some(vote) = self.voted_for {
                    info!(
                        "{} rejected vote at {} for {} as already voted for {}",
                        self.id, self.current_term, from, vote
                    );
                } else {
                    info!(
                        "{} rejected vote at {} for {} with stale {}",
                        self.id, self.current_term, from, message.term
                    );
                }
                effects.push(Effect::Send(SendableMessage {
                    message: Message {
                        term: self.current_term,
                        rpc: Rpc::VoteResponse(VoteResponse { vote_granted: grant }),
                    },
                    dest: MessageDestination::To(from),
                }));
            }
            Rpc::AppendResponse(_) => (),
            Rpc::VoteResponse(response) => {
                if message.term < self.current_term {
                    // a grant from a past term must not count towards this term's quorum
                    info!(
                        "{} ignored response with {} < current {}",
                        self.id, message.term, self.current_term
                    );
                } else if self.is_candidate() && response.vote_granted {
                    info!(
                        "{} received vote granted from {} at {}",
                        self.id, from, self.current_term
                    );
                    self.votes_received.insert(from);
                    if self.votes_received.len() > self.cluster_size() / 2 {
                        info!("{} became leader at {}", self.id, self.current_term);
                        self.change_role(Role::Leader, &mut effects);
                    }
                }
            }
        }
        effects
    }

    /// Completion hook for [`read_file`](crate::world::World::read_file). Nothing persists in
    /// this core.
    #[must_use = "the returned effects must be applied to the world"]
    pub fn loaded_file(&mut self, _name: &str, _data: Bytes) -> Vec<Effect> {
        Vec::new()
    }

    /// Completion hook for [`write_file`](crate::world::World::write_file).
    #[must_use = "the returned effects must be applied to the world"]
    pub fn saved_file(&mut self, _name: &str) -> Vec<Effect> {
        Vec::new()
    }

    /// Moves to `to`, arming the election timer on entering follower or candidate and the
    /// heartbeat timer on entering leader.
    fn change_role(&mut self, to: Role, effects: &mut Vec<Effect>) {
        assert!(
            !(self.role == Role::Follower && to == Role::Leader),
            "{} cannot transition from follower straight to leader",
            self.id
        );
        self.role = to;
        match to {
            Role::Follower | Role::Candidate => effects.push(Effect::ArmTimer(self.election_timeout)),
            Role::Leader => effects.push(Effect::ArmTimer(self.config.heartbeat_timeout)),
        }
    }

    /// Advances to a newer term: clears the vote accounting, draws a fresh election timeout, and
    /// — unless this node is the candidate whose own election started the term — demotes to
    /// follower.
    fn update_term(&mut self, term: TermId, new_candidate: bool, effects: &mut Vec<Effect>) {
        if term > self.current_term {
            self.current_term = term;
            self.voted_for = None;
            self.votes_received.clear();
            self.election_timeout =
                random_election_timeout(&mut self.random, self.config.election_timeout_window);
            if !new_candidate {
                info!("{} became follower at {}", self.id, self.current_term);
                self.change_role(Role::Follower, effects);
            }
        }
    }

    fn cluster_size(&self) -> usize {
        self.peers.len() + 1
    }
}

fn random_election_timeout(random: &mut impl RngCore, window: (u64, u64)) -> u64 {
    let (low, high) = window;
    let spread = random
        .next_u64()
        .checked_rem(high.saturating_sub(low) + 1)
        .unwrap_or(0);
    low.saturating_add(spread)
}
