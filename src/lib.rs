//! hbsdmon: a small health-monitoring daemon.
//!
//! Each configured node gets its own worker thread that probes it on an
//! interval and tracks failure episodes. A coordinator thread multiplexes
//! the workers, sends periodic heartbeats and on-demand stats reports, and
//! runs an orderly shutdown. Notifications go out through Pushover.

pub mod core;
pub mod daemon;
pub mod logger;
pub mod monitor;
pub mod notify;

#[cfg(feature = "cli")]
pub mod cli_app;

pub use crate::core::config::Config;
pub use crate::core::errors::{MonError, Result};
