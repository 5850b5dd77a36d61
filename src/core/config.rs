//! TOML configuration: daemon identity, notification target, timings, and
//! the node list. Loaded once at startup and validated before any worker
//! starts.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{MonError, Result};
use crate::monitor::health::FailurePolicy;
use crate::monitor::node::{AddrFamily, Method, Node};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/etc/hbsdmon.toml";
/// Default daemon name shown in every notification.
pub const DEFAULT_NAME: &str = "HardenedBSD Monitor";
/// Heartbeat cadence when the config does not set one (6 hours).
pub const DEFAULT_HEARTBEAT_SECS: u64 = 21_600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_name")]
    pub name: String,
    pub token: String,
    pub dest: String,
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default = "default_heartbeat")]
    pub heartbeat_interval: u64,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub probe_timeout_secs: u64,
    pub shutdown_grace_ms: u64,
    pub tick_ms: u64,
    pub escalation_secs: u64,
    pub notify_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 5,
            shutdown_grace_ms: 1_000,
            tick_ms: 1_000,
            escalation_secs: 7_200,
            notify_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    pub host: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub pool: Option<String>,
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default, alias = "address_family")]
    pub addrfam: Option<u8>,
    #[serde(default, alias = "fail_message")]
    pub failmsg: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

const fn default_heartbeat() -> u64 {
    DEFAULT_HEARTBEAT_SECS
}

/// Loop and shutdown timings used by the coordinator and workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Upper bound on one coordinator wait.
    pub tick: Duration,
    /// How long a freshly spawned worker has to report `Ready`.
    pub ready_timeout: Duration,
    /// How long shutdown waits for terminate acknowledgments.
    pub shutdown_grace: Duration,
    /// Extra time a force-cancelled worker gets before it is detached.
    /// Covers one in-flight probe plus one in-flight notification.
    pub reap_slack: Duration,
    /// Transport timeout handed to each probe.
    pub probe_timeout: Duration,
    /// Upper bound on one notification request.
    pub notify_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        TimingConfig::default().timings()
    }
}

impl TimingConfig {
    #[must_use]
    pub fn timings(&self) -> Timings {
        let tick = Duration::from_millis(self.tick_ms);
        let probe_timeout = Duration::from_secs(self.probe_timeout_secs);
        let notify_timeout = Duration::from_secs(self.notify_timeout_secs);
        Timings {
            tick,
            ready_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            reap_slack: probe_timeout + notify_timeout + tick,
            probe_timeout,
            notify_timeout,
        }
    }
}

/// Daemon-wide settings distilled from [`Config`] for the runtime context.
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub name: String,
    pub dest: String,
    pub default_interval: Option<Duration>,
    pub heartbeat_interval: Duration,
    pub timings: Timings,
    pub policy: FailurePolicy,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            dest: String::new(),
            default_interval: None,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            timings: Timings::default(),
            policy: FailurePolicy::default(),
        }
    }
}

impl Config {
    /// Read, parse, and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MonError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| MonError::io(path, source))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate config text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(MonError::invalid("token must not be empty"));
        }
        if self.dest.trim().is_empty() {
            return Err(MonError::invalid("dest must not be empty"));
        }
        if self.interval == Some(0) {
            return Err(MonError::invalid("interval must be at least 1 second"));
        }
        if self.heartbeat_interval == 0 {
            return Err(MonError::invalid(
                "heartbeat_interval must be at least 1 second",
            ));
        }
        if self.timing.tick_ms == 0 {
            return Err(MonError::invalid("timing.tick_ms must be positive"));
        }
        if self.timing.notify_timeout_secs == 0 {
            return Err(MonError::invalid(
                "timing.notify_timeout_secs must be at least 1 second",
            ));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            node.validate()
                .map_err(|details| MonError::invalid(format!("nodes[{idx}]: {details}")))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn settings(&self) -> DaemonSettings {
        DaemonSettings {
            name: self.name.clone(),
            dest: self.dest.clone(),
            default_interval: self.interval.map(Duration::from_secs),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval),
            timings: self.timing.timings(),
            policy: FailurePolicy::new(self.timing.escalation_secs),
        }
    }

    /// Build a [`Node`] for every entry not marked `disabled`.
    pub fn enabled_nodes(&self) -> Result<Vec<Node>> {
        self.nodes
            .iter()
            .filter(|node| !node.disabled)
            .map(Node::from_config)
            .collect()
    }

    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }
}

impl NodeConfig {
    #[must_use]
    pub fn method(&self) -> Method {
        self.method.as_deref().map_or(Method::Icmp, Method::parse)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host must not be empty".to_string());
        }
        let method = self.method();
        if method.requires_port() && self.port.is_none() {
            return Err(format!("{method} node {} requires a port", self.host));
        }
        if method == Method::Zfs && self.pool.as_deref().is_none_or(str::is_empty) {
            return Err(format!("ZFS node {} requires a pool", self.host));
        }
        if self.interval == Some(0) {
            return Err(format!("node {} interval must be at least 1 second", self.host));
        }
        if let Some(family) = self.addrfam {
            if AddrFamily::from_config(family).is_none() {
                return Err(format!("node {} addrfam must be 4 or 6, got {family}", self.host));
            }
        }
        Ok(())
    }
}
