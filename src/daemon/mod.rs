//! Daemon subsystem: coordinator loop, per-node workers, their control
//! protocol, shared context, and signal handling.

pub mod context;
pub mod coordinator;
pub mod messages;
pub mod signals;
pub mod worker;
