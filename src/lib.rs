//! `ttnet`: a time-triggered Ethernet network generator and self-regenerating
//! schedule evaluator.
//!
//! The generator builds a topology, populates it with frames, and computes a
//! feasible routing/utilization plan (spec §4.1–§4.3). The evaluator ingests
//! an already-scheduled network and, given a single link failure, derives a
//! membership subnetwork, shards it per source node, and drives an external
//! solver to recover a schedule for the affected frames (spec §4.5).

pub mod error;
pub mod frame;
pub mod generator;
pub mod graph;
pub mod network;
pub mod regen;
pub mod routing;
pub mod topology;
pub mod xml;

pub use error::{Error, Result};
pub use frame::Frame;
pub use graph::Topology;
pub use network::{Config, Network};
