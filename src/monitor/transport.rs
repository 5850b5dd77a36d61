//! Thin transport checks behind the probe dispatcher.

#![allow(missing_docs)]

use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::process::Command;
use std::time::Duration;

use crate::monitor::node::AddrFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpScheme {
    Http,
    Https,
}

impl HttpScheme {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Resolve `host:port`, keeping only addresses of the requested family.
pub fn resolve(host: &str, port: u16, family: Option<AddrFamily>) -> Vec<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map(|addrs| {
            addrs
                .filter(|addr| family.is_none_or(|f| f.matches(addr)))
                .collect()
        })
        .unwrap_or_default()
}

/// `true` if any resolved address accepts a TCP connection.
pub fn tcp_connect(host: &str, port: u16, family: Option<AddrFamily>, timeout: Duration) -> bool {
    resolve(host, port, family)
        .iter()
        .any(|addr| TcpStream::connect_timeout(addr, timeout).is_ok())
}

/// `true` if a single zero byte can be sent to any resolved address.
pub fn udp_send(host: &str, port: u16, family: Option<AddrFamily>) -> bool {
    resolve(host, port, family).iter().any(|addr| {
        let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        UdpSocket::bind(local)
            .and_then(|socket| socket.send_to(&[0], addr))
            .is_ok_and(|sent| sent > 0)
    })
}

/// HEAD request against the host root; statuses below 400 pass.
pub fn http_head(client: &reqwest::blocking::Client, scheme: HttpScheme, host: &str) -> bool {
    let url = format!("{}://{host}/", scheme.as_str());
    client
        .head(&url)
        .send()
        .is_ok_and(|response| response.status().as_u16() < 400)
}

/// Run `zpool list -H -o <property> <pool>` and return trimmed stdout.
fn zpool_property(pool: &str, property: &str) -> Result<String, String> {
    let output = Command::new("zpool")
        .args(["list", "-H", "-o", property, pool])
        .output()
        .map_err(|e| format!("zpool not found or failed: {e}"))?;
    if !output.status.success() {
        return Err(format!(
            "zpool list {pool} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Pool guid, used to confirm the pool exists at startup.
pub fn zpool_guid(pool: &str) -> Result<String, String> {
    let guid = zpool_property(pool, "guid")?;
    if guid.is_empty() {
        return Err(format!("zpool {pool} reported no guid"));
    }
    Ok(guid)
}

/// Pool health check. With `expected_guid` set, a different pool imported
/// under the same name fails.
pub fn zpool_healthy(pool: &str, expected_guid: Option<&str>) -> bool {
    zpool_property(pool, "guid,health")
        .is_ok_and(|line| pool_line_is_healthy(&line, expected_guid))
}

/// Judge one `guid<TAB>health` line from `zpool list -H`.
fn pool_line_is_healthy(line: &str, expected_guid: Option<&str>) -> bool {
    let mut fields = line.split('\t');
    let (Some(guid), Some(health)) = (fields.next(), fields.next()) else {
        return false;
    };
    health_is_ok(health) && expected_guid.is_none_or(|expected| expected == guid.trim())
}

/// `ONLINE` is the only healthy pool state; `DEGRADED`, `FAULTED`, etc. fail.
#[must_use]
pub fn health_is_ok(health: &str) -> bool {
    health.trim().eq_ignore_ascii_case("ONLINE")
}
