//! Latched signal flags for the coordinator loop.
//!
//! Handlers only flip atomics; the loop reads and clears them once per
//! iteration. A second SIGINT/SIGTERM while shutdown is already pending
//! exits the process immediately.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct SignalHandler {
    shutdown: Arc<AtomicBool>,
    stats: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Flags with no OS handlers attached. Requests come only from
    /// [`request_shutdown`](Self::request_shutdown) and
    /// [`request_stats`](Self::request_stats).
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Register SIGINT/SIGTERM for shutdown and SIGUSR1 (plus SIGINFO where
    /// the platform has it) for stats reports.
    #[cfg(feature = "daemon")]
    pub fn install() -> crate::core::errors::Result<Self> {
        use crate::core::errors::MonError;
        use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};
        use signal_hook::flag;

        let handler = Self::detached();
        let register_err = |signal: &str, source: std::io::Error| MonError::Runtime {
            details: format!("failed to register {signal} handler: {source}"),
        };

        for (signal, label) in [(SIGINT, "SIGINT"), (SIGTERM, "SIGTERM")] {
            // Order matters: the conditional exit must see the flag before
            // this signal sets it.
            flag::register_conditional_shutdown(signal, 1, Arc::clone(&handler.shutdown))
                .map_err(|e| register_err(label, e))?;
            flag::register(signal, Arc::clone(&handler.shutdown))
                .map_err(|e| register_err(label, e))?;
        }

        flag::register(SIGUSR1, Arc::clone(&handler.stats))
            .map_err(|e| register_err("SIGUSR1", e))?;

        #[cfg(any(
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly",
            target_os = "macos"
        ))]
        flag::register(libc::SIGINFO, Arc::clone(&handler.stats))
            .map_err(|e| register_err("SIGINFO", e))?;

        Ok(handler)
    }

    /// Shutdown stays latched once requested.
    #[must_use]
    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Read and clear a pending stats request.
    pub fn take_stats_request(&self) -> bool {
        self.stats.swap(false, Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn request_stats(&self) {
        self.stats.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_request_clears_on_read() {
        let signals = SignalHandler::detached();
        assert!(!signals.take_stats_request());
        signals.request_stats();
        assert!(signals.take_stats_request());
        assert!(!signals.take_stats_request());
    }

    #[test]
    fn clones_share_flags() {
        let signals = SignalHandler::detached();
        let remote = signals.clone();
        remote.request_shutdown();
        assert!(signals.should_shutdown());
        assert!(signals.should_shutdown());
    }
}
