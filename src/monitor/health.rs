//! Per-node health state machine: failure debounce, cool-down, escalation,
//! and recovery detection.
//!
//! A node's failure episode is tracked by a `lastfail` timestamp in the
//! node's runtime store. The first failed probe records the marker silently.
//! Later failures are suppressed until the marker is older than the
//! escalation window, at which point a notification goes out and the marker
//! is refreshed, so a long outage renotifies once per window. A successful
//! probe with a marker present is a recovery.

#![allow(missing_docs)]

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::errors::Result;
use crate::core::kv::Value;
use crate::monitor::node::{KEY_LASTFAIL, Node};

/// Default escalation window (2 hours).
pub const DEFAULT_ESCALATION_SECS: u64 = 7_200;

/// Why a failure did not produce a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// Still inside one probe period of the marker.
    Debounce,
    /// Past the probe period but short of the escalation window.
    CoolDown,
}

/// Outcome of one failed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDecision {
    /// First failure of an episode; marker recorded.
    Onset,
    Suppressed { elapsed: i64, reason: Suppression },
    /// Emit `NODE FAILURE`; marker refreshed.
    Notify { elapsed: i64 },
}

impl FailureDecision {
    #[must_use]
    pub const fn notifies(self) -> bool {
        matches!(self, Self::Notify { .. })
    }
}

/// Health transition produced by one probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    Healthy,
    Recovered { down_since: Option<DateTime<Utc>> },
    Failed(FailureDecision),
    /// The probe failed but the failure marker could not be updated.
    Unrecorded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    escalation_secs: u64,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ESCALATION_SECS)
    }
}

impl FailurePolicy {
    #[must_use]
    pub const fn new(escalation_secs: u64) -> Self {
        Self { escalation_secs }
    }

    #[must_use]
    pub const fn escalation_secs(&self) -> u64 {
        self.escalation_secs
    }

    /// Classify a failure given the current marker.
    #[must_use]
    pub fn decide(
        &self,
        lastfail: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        interval: Duration,
    ) -> FailureDecision {
        let Some(lastfail) = lastfail else {
            return FailureDecision::Onset;
        };
        let elapsed = (now - lastfail).num_seconds();
        let threshold = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX) - 1;
        let escalation = i64::try_from(self.escalation_secs).unwrap_or(i64::MAX);

        if elapsed >= escalation {
            FailureDecision::Notify { elapsed }
        } else if elapsed <= threshold {
            FailureDecision::Suppressed {
                elapsed,
                reason: Suppression::Debounce,
            }
        } else {
            FailureDecision::Suppressed {
                elapsed,
                reason: Suppression::CoolDown,
            }
        }
    }

    /// Apply a failed probe to the node's runtime store.
    ///
    /// The lookup, the decision, and the marker update happen under one
    /// store lock.
    pub fn record_failure(
        &self,
        node: &Node,
        now: DateTime<Utc>,
        interval: Duration,
    ) -> Result<FailureDecision> {
        let mut guard = node.kv().lock();
        let marker = guard.get(KEY_LASTFAIL);
        let lastfail = marker.as_ref().and_then(|entry| entry.value.as_time());
        let decision = self.decide(lastfail, now, interval);
        if !matches!(decision, FailureDecision::Suppressed { .. }) {
            match marker {
                Some(entry) => guard.replace(entry.id, Value::Time(now))?,
                None => {
                    guard.put(KEY_LASTFAIL, Value::Time(now))?;
                }
            }
        }
        Ok(decision)
    }
}

/// Clear the failure marker after a successful probe.
///
/// Returns `Some` when a marker was present, i.e. the node recovered.
pub fn record_success(node: &Node) -> Option<HealthEvent> {
    node.kv().take(KEY_LASTFAIL).map(|entry| HealthEvent::Recovered {
        down_since: entry.value.as_time(),
    })
}
