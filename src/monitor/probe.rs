//! Probe dispatch: maps a node's method to its transport check.
//!
//! [`Prober`] is the seam between the worker loop and the network. The
//! daemon uses [`NetProber`]; tests substitute scripted probers.

#![allow(missing_docs)]

use std::time::Duration;

use crate::core::errors::{MonError, Result};
use crate::core::kv::Value;
use crate::monitor::node::{KEY_POOL_GUID, Method, Node};
use crate::monitor::transport::{self, HttpScheme};

/// Pass/fail health check for one node.
pub trait Prober: Send + Sync {
    /// One-time setup before the node's worker starts.
    fn prepare(&self, _node: &Node) -> Result<()> {
        Ok(())
    }

    /// Run one probe. `true` means healthy.
    fn probe(&self, node: &Node) -> bool;
}

/// Real transports: TCP connect, UDP send, HTTP(S) HEAD, and `zpool`.
pub struct NetProber {
    timeout: Duration,
    http: reqwest::blocking::Client,
}

impl NetProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hbsdmon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| MonError::Runtime {
                details: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self { timeout, http })
    }
}

impl Prober for NetProber {
    fn prepare(&self, node: &Node) -> Result<()> {
        if node.method() != Method::Zfs {
            return Ok(());
        }
        let Some(pool) = node.params().pool.as_deref() else {
            return Ok(());
        };
        let guid = transport::zpool_guid(pool).map_err(|details| MonError::WorkerInit {
            host: node.host().to_string(),
            details,
        })?;
        node.kv().set(KEY_POOL_GUID, Value::Str(guid))?;
        Ok(())
    }

    fn probe(&self, node: &Node) -> bool {
        let params = node.params();
        match node.method() {
            Method::Tcp => params.port.is_some_and(|port| {
                transport::tcp_connect(node.host(), port, params.addr_family, self.timeout)
            }),
            Method::Udp => params.port.is_some_and(|port| {
                transport::udp_send(node.host(), port, params.addr_family)
            }),
            Method::Http => transport::http_head(&self.http, HttpScheme::Http, node.host()),
            Method::Https => transport::http_head(&self.http, HttpScheme::Https, node.host()),
            Method::Zfs => params.pool.as_deref().is_none_or(|pool| {
                transport::zpool_healthy(pool, cached_pool_guid(node).as_deref())
            }),
            Method::Icmp | Method::Ssh | Method::Tor => true,
        }
    }
}

/// Pool guid recorded by [`NetProber::prepare`], if any.
fn cached_pool_guid(node: &Node) -> Option<String> {
    node.kv()
        .get_value(KEY_POOL_GUID)
        .and_then(|value| value.as_str().map(str::to_string))
}
