//! Monitored targets: identity, probe method, typed parameters, and the
//! per-node runtime store.

#![allow(missing_docs)]

use std::fmt::{self, Write as _};
use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;

use crate::core::config::NodeConfig;
use crate::core::errors::Result;
use crate::core::kv::KeyValueStore;

/// Runtime store key for the failure marker.
pub const KEY_LASTFAIL: &str = "lastfail";
/// Runtime store key for the resolved ZFS pool guid.
pub const KEY_POOL_GUID: &str = "poolguid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Tcp,
    Udp,
    Http,
    Https,
    Icmp,
    Zfs,
    Ssh,
    Tor,
}

impl Method {
    /// Case-insensitive parse. Unrecognized names fall back to ICMP.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TCP" => Self::Tcp,
            "UDP" => Self::Udp,
            "HTTP" => Self::Http,
            "HTTPS" => Self::Https,
            "ZFS" => Self::Zfs,
            "SSH" => Self::Ssh,
            "TOR" => Self::Tor,
            _ => Self::Icmp,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
            Self::Icmp => "ICMP",
            Self::Zfs => "ZFS",
            Self::Ssh => "SSH",
            Self::Tor => "TOR",
        }
    }

    #[must_use]
    pub const fn requires_port(self) -> bool {
        matches!(self, Self::Tcp | Self::Udp)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AddrFamily {
    V4,
    V6,
}

impl AddrFamily {
    /// Map the config value (4 or 6) to a family.
    #[must_use]
    pub const fn from_config(raw: u8) -> Option<Self> {
        match raw {
            4 => Some(Self::V4),
            6 => Some(Self::V6),
            _ => None,
        }
    }

    #[must_use]
    pub const fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::V4 => "IPv4",
            Self::V6 => "IPv6",
        }
    }
}

/// Method parameters fixed at config load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeParams {
    pub port: Option<u16>,
    pub addr_family: Option<AddrFamily>,
    pub pool: Option<String>,
    pub interval: Option<Duration>,
    pub fail_message: Option<String>,
}

/// One monitored target.
#[derive(Debug)]
pub struct Node {
    host: String,
    method: Method,
    params: NodeParams,
    kv: KeyValueStore,
}

impl Node {
    #[must_use]
    pub fn new(host: impl Into<String>, method: Method, params: NodeParams) -> Self {
        Self {
            host: host.into(),
            method,
            params,
            kv: KeyValueStore::new(),
        }
    }

    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        let params = NodeParams {
            port: config.port,
            addr_family: config.addrfam.and_then(AddrFamily::from_config),
            pool: config.pool.clone(),
            interval: config.interval.map(Duration::from_secs),
            fail_message: config.failmsg.clone(),
        };
        Ok(Self::new(config.host.clone(), config.method(), params))
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub const fn params(&self) -> &NodeParams {
        &self.params
    }

    /// Runtime attributes (`lastfail`, derived handles).
    #[must_use]
    pub const fn kv(&self) -> &KeyValueStore {
        &self.kv
    }

    /// Port as shown in notifications.
    #[must_use]
    pub fn port_label(&self) -> String {
        match self.method {
            Method::Tcp | Method::Udp => self
                .params
                .port
                .map_or_else(|| "N/A".to_string(), |port| port.to_string()),
            Method::Http => "80".to_string(),
            _ => "N/A".to_string(),
        }
    }

    /// Human-readable summary used verbatim as notification body text.
    #[must_use]
    pub fn describe(&self, monitor_name: &str) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "Monitor name:\t{monitor_name}\n\
             Host:\t\t{}\n\
             Method:\t\t{}\n\
             Port:\t\t{}\n",
            self.host,
            self.method,
            self.port_label()
        );
        match self.method {
            Method::Tcp | Method::Udp => {
                if let Some(family) = self.params.addr_family {
                    let _ = writeln!(out, "Address family: {}", family.label());
                }
            }
            Method::Zfs => {
                if let Some(pool) = &self.params.pool {
                    let _ = writeln!(out, "Pool: {pool}");
                }
            }
            _ => {}
        }
        out
    }

    /// Body of a `NODE FAILURE` notification.
    #[must_use]
    pub fn failure_body(&self, monitor_name: &str) -> String {
        let mut body = self.describe(monitor_name);
        if let Some(message) = &self.params.fail_message {
            body.push('\n');
            body.push_str(message);
        }
        body
    }
}
