//! Listen/connect address parsing.
//!
//! Accepted forms are `port`, `host`, `host:port` and `*` (the wildcard,
//! only where allowed). Missing parts fall back to the supplied defaults.

use crate::error::TransportError;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

/// Wildcard token accepted in address strings.
pub const WILDCARD: &str = "*";

/// Default host for listen addresses.
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// Default host for connect addresses.
pub const DEFAULT_CONNECT_HOST: &str = "localhost";

/// Turn an address string into a socket address.
///
/// `None` yields `default_host:default_port`. With `allow_wildcard` (listen
/// addresses) port 0 is accepted.
///
/// # Errors
///
/// [`TransportError::InvalidAddress`] with one of `missing address`,
/// `wildcard address not allowed`, `unknown host address '<host>'` or
/// `invalid port '<port>'`.
pub fn make_socket_address(
    address: Option<&str>,
    default_host: &str,
    default_port: u16,
    allow_wildcard: bool,
) -> Result<SocketAddr, TransportError> {
    let default_port_text = default_port.to_string();
    let (host, port) = match address {
        None => (default_host, default_port_text.as_str()),
        Some(text) => {
            let mut parts = text.split(':');
            let first = parts.next().unwrap_or_default();
            if !first.is_empty() && first.bytes().all(|b| b.is_ascii_digit()) {
                (default_host, first)
            } else {
                let host = if first.is_empty() { default_host } else { first };
                let host = match host {
                    WILDCARD if allow_wildcard => DEFAULT_LISTEN_HOST,
                    WILDCARD => default_host,
                    other => other,
                };
                (host, parts.next().unwrap_or(default_port_text.as_str()))
            }
        }
    };

    if host.is_empty() || host == WILDCARD {
        return Err(TransportError::InvalidAddress("missing address".into()));
    }

    let ip = if host == DEFAULT_LISTEN_HOST {
        if !allow_wildcard {
            return Err(TransportError::InvalidAddress(
                "wildcard address not allowed".into(),
            ));
        }
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        resolve_host(host)?
    };

    // Port 0 binds an ephemeral port, so only listen addresses accept it
    let lowest_port = u32::from(!allow_wildcard);
    let port = match port.parse::<u32>() {
        Ok(port) if (lowest_port..=65535).contains(&port) => port as u16,
        _ => {
            return Err(TransportError::InvalidAddress(format!(
                "invalid port '{port}'"
            )));
        }
    };

    Ok(SocketAddr::new(ip, port))
}

/// Resolve a host name or literal, preferring IPv4 results.
fn resolve_host(host: &str) -> Result<IpAddr, TransportError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let unknown = || TransportError::InvalidAddress(format!("unknown host address '{host}'"));
    let resolved: Vec<IpAddr> = (host, 0)
        .to_socket_addrs()
        .map_err(|_| unknown())?
        .map(|addr| addr.ip())
        .collect();
    resolved
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| resolved.first())
        .copied()
        .ok_or_else(unknown)
}

/// Render a connection name the way outbound connections are labelled.
#[must_use]
pub fn outbound_name(address: &SocketAddr) -> String {
    format!("{}:{}", address.ip(), address.port())
}

/// Render a connection name the way inbound connections are labelled.
#[must_use]
pub fn inbound_name(address: &SocketAddr) -> String {
    format!("{}/{}", address.ip(), address.port())
}
