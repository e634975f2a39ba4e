//! Leader-per-term uniqueness tracking.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SimError;
use crate::message::{NodeId, TermId};

/// The history of every leadership claim observed so far, keyed by term.
///
/// The engine records each node seen in the leader role after every tick; at most one node may
/// ever appear per term.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LeaderLedger {
    history: BTreeMap<TermId, BTreeSet<NodeId>>,
}

impl LeaderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `node` was observed leading `term`.
    pub fn observe(&mut self, term: TermId, node: NodeId) {
        self.history.entry(term).or_default().insert(node);
    }

    /// Checks uniqueness over every observed term.
    pub fn check(&self) -> Result<(), SimError> {
        for (term, leaders) in &self.history {
            if leaders.len() > 1 {
                return Err(SimError::DoubleLeader {
                    term: *term,
                    nodes: leaders.iter().copied().collect(),
                });
            }
        }
        Ok(())
    }

    /// Whether any leader was ever observed.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// The nodes observed leading `term`.
    pub fn leaders(&self, term: TermId) -> Option<&BTreeSet<NodeId>> {
        self.history.get(&term)
    }

    /// Every term in which a leader was observed, ascending.
    pub fn terms(&self) -> impl Iterator<Item = TermId> + '_ {
        self.history.keys().copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn one_leader_per_term_is_fine() {
        let mut ledger = LeaderLedger::new();
        ledger.observe(TermId(1), NodeId(3));
        ledger.observe(TermId(1), NodeId(3));
        ledger.observe(TermId(2), NodeId(0));
        assert_eq!(ledger.check(), Ok(()));
    }

    #[test]
    fn two_leaders_in_one_term_is_a_violation() {
        let mut ledger = LeaderLedger::new();
        ledger.observe(TermId(4), NodeId(1));
        ledger.observe(TermId(4), NodeId(2));
        assert_eq!(
            ledger.check(),
            Err(SimError::DoubleLeader {
                term: TermId(4),
                nodes: vec![NodeId(1), NodeId(2)],
            })
        );
    }
}
