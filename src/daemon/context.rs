//! Shared daemon context: global settings store, stats ledger, notifier,
//! prober, and timings. Held by the coordinator and every worker.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::config::{DaemonSettings, Timings};
use crate::core::errors::Result;
use crate::core::kv::{KeyValueStore, Value};
use crate::monitor::health::FailurePolicy;
use crate::monitor::node::Node;
use crate::monitor::probe::Prober;
use crate::monitor::stats::{Stats, StatsReport};
use crate::notify::{Notifier, Title};

/// Probe interval when neither the node nor the daemon sets one.
pub const FALLBACK_INTERVAL: Duration = Duration::from_secs(5);

pub const KEY_NAME: &str = "name";
pub const KEY_DEST: &str = "dest";
pub const KEY_INTERVAL: &str = "interval";
pub const KEY_HEARTBEAT_INTERVAL: &str = "heartbeat_interval";

#[derive(Debug)]
struct Ledger {
    stats: Stats,
    last_heartbeat: DateTime<Utc>,
}

pub struct Context {
    globals: KeyValueStore,
    ledger: Mutex<Ledger>,
    notifier: Arc<dyn Notifier>,
    prober: Arc<dyn Prober>,
    policy: FailurePolicy,
    timings: Timings,
}

impl Context {
    pub fn new(
        settings: &DaemonSettings,
        notifier: Arc<dyn Notifier>,
        prober: Arc<dyn Prober>,
    ) -> Result<Self> {
        let globals = KeyValueStore::new();
        globals.put(KEY_NAME, Value::Str(settings.name.clone()))?;
        globals.put(KEY_DEST, Value::Str(settings.dest.clone()))?;
        if let Some(interval) = settings.default_interval {
            globals.put(KEY_INTERVAL, Value::Uint(interval.as_secs()))?;
        }
        globals.put(
            KEY_HEARTBEAT_INTERVAL,
            Value::Uint(settings.heartbeat_interval.as_secs()),
        )?;

        Ok(Self {
            globals,
            ledger: Mutex::new(Ledger {
                stats: Stats::default(),
                last_heartbeat: Utc::now(),
            }),
            notifier,
            prober,
            policy: settings.policy,
            timings: settings.timings,
        })
    }

    #[must_use]
    pub const fn globals(&self) -> &KeyValueStore {
        &self.globals
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.global_str(KEY_NAME)
    }

    #[must_use]
    pub fn dest(&self) -> String {
        self.global_str(KEY_DEST)
    }

    fn global_str(&self, key: &str) -> String {
        self.globals
            .get_value(key)
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Daemon-level probe interval, if configured.
    #[must_use]
    pub fn default_interval(&self) -> Option<Duration> {
        self.globals
            .get_value(KEY_INTERVAL)
            .and_then(|value| value.as_uint())
            .map(Duration::from_secs)
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.globals
            .get_value(KEY_HEARTBEAT_INTERVAL)
            .and_then(|value| value.as_uint())
            .map_or(
                Duration::from_secs(crate::core::config::DEFAULT_HEARTBEAT_SECS),
                Duration::from_secs,
            )
    }

    /// Node override, then daemon default, then [`FALLBACK_INTERVAL`].
    #[must_use]
    pub fn interval_for(&self, node: &Node) -> Duration {
        node.params()
            .interval
            .or_else(|| self.default_interval())
            .unwrap_or(FALLBACK_INTERVAL)
    }

    #[must_use]
    pub fn prober(&self) -> &dyn Prober {
        self.prober.as_ref()
    }

    #[must_use]
    pub const fn policy(&self) -> &FailurePolicy {
        &self.policy
    }

    #[must_use]
    pub const fn timings(&self) -> &Timings {
        &self.timings
    }

    // ──────────────────── stats ledger ────────────────────

    pub fn record_success(&self) {
        self.ledger.lock().stats.successes += 1;
    }

    pub fn record_error(&self) {
        self.ledger.lock().stats.errors += 1;
    }

    pub fn record_poll_failure(&self) {
        self.ledger.lock().stats.poll_failures += 1;
    }

    /// Current counters without resetting them.
    #[must_use]
    pub fn stats(&self) -> Stats {
        self.ledger.lock().stats
    }

    #[must_use]
    pub fn last_heartbeat(&self) -> DateTime<Utc> {
        self.ledger.lock().last_heartbeat
    }

    /// Whether `now` is at least `heartbeat_interval - 1` seconds past the
    /// last heartbeat.
    #[must_use]
    pub fn heartbeat_due(&self, now: DateTime<Utc>) -> bool {
        let cadence = i64::try_from(self.heartbeat_interval().as_secs()).unwrap_or(i64::MAX);
        let elapsed = (now - self.last_heartbeat()).num_seconds();
        elapsed >= cadence - 1
    }

    /// Count a heartbeat and move the timestamp to `now`.
    pub fn mark_heartbeat(&self, now: DateTime<Utc>) {
        let mut ledger = self.ledger.lock();
        ledger.stats.heartbeats += 1;
        ledger.last_heartbeat = now;
    }

    /// Snapshot and reset the counters under the ledger lock.
    pub fn take_report(&self, nodes: usize) -> StatsReport {
        let mut ledger = self.ledger.lock();
        StatsReport {
            nodes,
            stats: ledger.stats.take(),
            last_heartbeat: ledger.last_heartbeat,
        }
    }

    // ──────────────────── notifications ────────────────────

    /// Best-effort delivery. Failures are logged and reported as `false`.
    pub fn notify(&self, title: Title, body: &str) -> bool {
        match self.notifier.submit(&self.dest(), title.as_str(), body) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(code = err.code(), %title, "notification not delivered: {err}");
                false
            }
        }
    }
}
