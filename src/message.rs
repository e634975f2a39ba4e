//! Message types exchanged between simulated Raft nodes.
//!
//! This module provides data types for the four Raft RPCs carried over the simulated network. The
//! top-level message type is [`Message`]. Everything here serializes with `serde` so that a failing
//! run can be dumped as a structured, reproducible trace.

use core::cmp::Ordering;
use core::fmt;
use core::ops::AddAssign;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A [`Message`] to be sent to a destination.
#[derive(Clone, Debug, PartialEq)]
pub struct SendableMessage {
    /// The message to be sent.
    pub message: Message,

    /// The destination for the message.
    pub dest: MessageDestination,
}

/// The destination for a [`SendableMessage`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MessageDestination {
    /// The associated message should be sent to all known peers.
    Broadcast,
    /// The associated message should be sent to one particular peer.
    To(NodeId),
}

/// A message sent between Raft nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The greatest Raft leadership term seen by the sender.
    pub term: TermId,

    /// The Remote Procedure Call contained by this message.
    pub rpc: Rpc,
}

/// A Remote Procedure Call message to a Raft node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Rpc {
    /// A request to obtain leadership amongst Raft nodes.
    VoteRequest(VoteRequest),

    /// A response to a [`VoteRequest`] granting or denying leadership.
    VoteResponse(VoteResponse),

    /// A request to append entries to a Raft node's log. An empty request is the leader heartbeat.
    AppendRequest(AppendRequest),

    /// A response to an [`AppendRequest`].
    AppendResponse(AppendResponse),
}

/// A request to obtain leadership amongst Raft nodes.
///
/// The candidate's id travels with the delivery event, not in the request body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteRequest {
    /// The number of entries in the candidate's log.
    pub last_log_idx: usize,

    /// The term of the last entry in the candidate's log, or `None` if the log is empty.
    pub last_log_term: Option<TermId>,
}

/// The response to a [`VoteRequest`] granting or denying leadership.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteResponse {
    /// Whether the [`VoteRequest`] was granted or not.
    pub vote_granted: bool,
}

/// A request to append entries to a Raft node's log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppendRequest {
    /// The number of entries in the leader's log.
    pub last_log_idx: usize,

    /// The last entry in the leader's log, or `None` if the log is empty.
    pub last_entry: Option<LogEntry>,

    /// A list of consecutive log entries to append. Always empty for heartbeats.
    pub entries: Vec<LogEntry>,

    /// The index of the last log entry known by the leader to be committed.
    pub leader_commit: usize,
}

/// The response to an [`AppendRequest`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppendResponse {
    /// Whether the [`AppendRequest`] was granted or not.
    pub success: bool,
}

/// An entry in a node's log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The term of leadership of the node which appended this log entry.
    pub term: TermId,

    /// Arbitrary data associated with the log entry.
    pub data: Bytes,
}

/// The unique, monotonically-increasing id for a term of Raft group leadership.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct TermId(pub u64);

/// The dense integer id of a cluster member, in `[0, cluster_size)`.
#[derive(
    Clone,
    Copy,
    Debug,
    derive_more::Display,
    Eq,
    derive_more::From,
    Hash,
    PartialEq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[display(fmt = "{:?}", self)]
pub struct NodeId(pub usize);

//
// Message impls
//

impl fmt::Display for Message {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { term, rpc } = self;
        fmt.debug_tuple("")
            .field(&format_args!("{}", term))
            .field(&format_args!("{}", rpc))
            .finish()
    }
}

//
// Rpc impls
//

impl fmt::Display for Rpc {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            Rpc::VoteRequest(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::VoteResponse(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::AppendRequest(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::AppendResponse(msg) => fmt::Display::fmt(msg, fmt),
        }
    }
}

//
// VoteRequest impls
//

impl fmt::Display for VoteRequest {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            last_log_idx,
            last_log_term,
        } = self;
        fmt.debug_struct("VoteRequest")
            .field("last_log_idx", last_log_idx)
            .field("last_log_term", &format_args!("{:?}", last_log_term))
            .finish()
    }
}

//
// VoteResponse impls
//

impl fmt::Display for VoteResponse {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { vote_granted } = self;
        fmt.debug_struct("VoteResponse")
            .field("vote_granted", vote_granted)
            .finish()
    }
}

//
// AppendRequest impls
//

impl fmt::Display for AppendRequest {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            last_log_idx,
            last_entry: _,
            entries,
            leader_commit,
        } = self;
        fmt.debug_struct("AppendRequest")
            .field("last_log_idx", last_log_idx)
            .field("entries", &entries.len())
            .field("leader_commit", leader_commit)
            .finish()
    }
}

//
// AppendResponse impls
//

impl fmt::Display for AppendResponse {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { success } = self;
        fmt.debug_struct("AppendResponse")
            .field("success", &success)
            .finish()
    }
}

//
// TermId impls
//

impl fmt::Display for TermId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(id) = self;
        fmt.debug_tuple("TermId").field(id).finish()
    }
}

impl PartialOrd for TermId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TermId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl AddAssign<u64> for TermId {
    fn add_assign(&mut self, rhs: u64) {
        self.0 = self
            .0
            .checked_add(rhs)
            .unwrap_or_else(|| panic!("overflow"));
    }
}
