//! Per-node key→bytes file storage.
//!
//! In this core, reads and writes resolve synchronously and never fail. The broker still sits
//! behind the same completion-callback interface the nodes program against
//! ([`loaded_file`](crate::node::RaftNode::loaded_file) /
//! [`saved_file`](crate::node::RaftNode::saved_file)), so a future revision can queue, reorder,
//! and delay operations without touching node code.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::message::NodeId;

/// An ideal, synchronous file store keyed by `(node, file name)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileBroker {
    files: BTreeMap<(NodeId, String), Bytes>,
}

impl FileBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` under the node's `name`.
    pub fn write(&mut self, node: NodeId, name: &str, data: Bytes) {
        self.files.insert((node, name.to_owned()), data);
    }

    /// The data stored under the node's `name`, if any.
    pub fn read(&self, node: NodeId, name: &str) -> Option<Bytes> {
        self.files.get(&(node, name.to_owned())).cloned()
    }
}
