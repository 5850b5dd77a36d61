//! Notification delivery: the [`Notifier`] seam plus log-only and in-memory
//! implementations. [`pushover`] holds the production client.

#![allow(missing_docs)]

pub mod pushover;

use std::fmt;

use parking_lot::Mutex;

use crate::core::errors::Result;

/// Titles the daemon sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Title {
    MonitorInit,
    NodeFailure,
    NodeOnline,
    MonitorHeartbeat,
    MonitorStats,
}

impl Title {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MonitorInit => "MONITOR INIT",
            Self::NodeFailure => "NODE FAILURE",
            Self::NodeOnline => "NODE ONLINE",
            Self::MonitorHeartbeat => "MONITOR HEARTBEAT",
            Self::MonitorStats => "MONITOR STATS",
        }
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivers a titled message to a destination. One attempt, no retry.
pub trait Notifier: Send + Sync {
    fn submit(&self, dest: &str, title: &str, body: &str) -> Result<()>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn submit(&self, dest: &str, title: &str, body: &str) -> Result<()> {
        tracing::info!(dest, title, body, "notification (dry run)");
        Ok(())
    }
}

/// One captured notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub dest: String,
    pub title: String,
    pub body: String,
}

/// Captures notifications in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    #[must_use]
    pub fn count(&self, title: Title) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.title == title.as_str())
            .count()
    }

    #[must_use]
    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().iter().map(|n| n.title.clone()).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Notifier for MemoryNotifier {
    fn submit(&self, dest: &str, title: &str, body: &str) -> Result<()> {
        self.sent.lock().push(Notification {
            dest: dest.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_match_wire_strings() {
        assert_eq!(Title::MonitorInit.as_str(), "MONITOR INIT");
        assert_eq!(Title::NodeFailure.to_string(), "NODE FAILURE");
        assert_eq!(Title::MonitorStats.as_str(), "MONITOR STATS");
    }

    #[test]
    fn memory_notifier_records_in_order() {
        let notifier = MemoryNotifier::new();
        notifier.submit("d", "NODE FAILURE", "a").unwrap();
        notifier.submit("d", "NODE ONLINE", "b").unwrap();
        assert_eq!(notifier.titles(), vec!["NODE FAILURE", "NODE ONLINE"]);
        assert_eq!(notifier.count(Title::NodeOnline), 1);
        notifier.clear();
        assert!(notifier.sent().is_empty());
    }
}
