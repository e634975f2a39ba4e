//! Errors surfaced by the simulation engine.

use core::fmt;

use crate::message::{NodeId, TermId};

/// A fatal condition found while executing a simulation step.
///
/// Everything else the world can throw at the cluster — dropped packets, absent edges, disarmed
/// timers — is simulated reality, not an error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SimError {
    /// Two distinct nodes were observed leading the same term.
    DoubleLeader {
        /// The term with conflicting leaders.
        term: TermId,
        /// The nodes observed leading it.
        nodes: Vec<NodeId>,
    },

    /// A benign run went past the halfway mark without ever electing a leader.
    NoLeader {
        /// How far virtual time had advanced.
        ticks: u64,
    },
}

impl fmt::Display for SimError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::DoubleLeader { term, nodes } => {
                write!(fmt, "{} has conflicting leaders:", term)?;
                for node in nodes {
                    write!(fmt, " {}", node)?;
                }
                Ok(())
            }
            SimError::NoLeader { ticks } => {
                write!(fmt, "no leader elected after {} ticks of a benign run", ticks)
            }
        }
    }
}

impl std::error::Error for SimError {}
