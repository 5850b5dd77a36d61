//! Node monitoring: node model, probe transports, health state machine,
//! and the stats report.

pub mod health;
pub mod node;
pub mod probe;
pub mod stats;
pub mod transport;
