//! The four co-operating subsystems that model the cluster's environment.
//!
//! Each broker owns one slice of simulated reality: the network graph, node power state, per-node
//! clocks, and per-node file storage. Brokers are owned by the world engine and mutated only from
//! its dispatch path.

pub mod file;
pub mod network;
pub mod power;
pub mod timer;
