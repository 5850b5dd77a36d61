//! Daemon counters and the stats report text.

#![allow(missing_docs)]

use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// ctime(3)-style timestamp layout.
pub const CTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Counters accumulated since the last report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub heartbeats: u64,
    pub errors: u64,
    pub successes: u64,
    pub poll_failures: u64,
}

impl Stats {
    /// Return the current counters and zero them.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// Snapshot rendered into a `MONITOR STATS` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub nodes: usize,
    pub stats: Stats,
    pub last_heartbeat: DateTime<Utc>,
}

impl StatsReport {
    /// Render with the heartbeat timestamp shown in `tz`.
    pub fn render_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        format!(
            "Last heartbeat: {}\n\
             \n\
             Nodes: {}\n\
             Heartbeats: {}\n\
             Errors: {}\n\
             Successes: {}\n\
             Poll failures: {}\n",
            self.last_heartbeat.with_timezone(tz).format(CTIME_FORMAT),
            self.nodes,
            self.stats.heartbeats,
            self.stats.errors,
            self.stats.successes,
            self.stats.poll_failures,
        )
    }

    /// Render in the host's local time zone.
    #[must_use]
    pub fn render(&self) -> String {
        self.render_in(&chrono::Local)
    }
}
