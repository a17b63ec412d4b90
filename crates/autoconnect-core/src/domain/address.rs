//! Host/port pairs.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use thiserror::Error;

/// Port the provisioning server listens on unless configured otherwise.
pub const DEFAULT_SERVER_PORT: u16 = 51822;

/// Host substituted when the host part of `host:port` is empty.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Error returned when an address string cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("invalid port in address '{0}'")]
    InvalidPort(String),
}

/// A host (name or IP literal) and a TCP port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses `host:port` or a bare `host`, using [`DEFAULT_SERVER_PORT`]
    /// for the latter.
    ///
    /// # Errors
    ///
    /// See [`Address::parse_with_default_port`].
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        Self::parse_with_default_port(input, DEFAULT_SERVER_PORT)
    }

    /// Parses `host:port`, `[v6]:port`, or a bare host.
    ///
    /// An empty host (`":51822"`) becomes [`LOOPBACK_HOST`].
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Empty`] for blank input and
    /// [`AddressError::InvalidPort`] when the port is not a `u16`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use autoconnect_core::Address;
    ///
    /// let a = Address::parse_with_default_port(":9000", 1).unwrap();
    /// assert_eq!(a.host, "127.0.0.1");
    /// assert_eq!(a.port, 9000);
    ///
    /// let b = Address::parse_with_default_port("vpn.example.net", 51822).unwrap();
    /// assert_eq!(b.port, 51822);
    /// ```
    pub fn parse_with_default_port(input: &str, default_port: u16) -> Result<Self, AddressError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AddressError::Empty);
        }

        // A bare IP literal, including an unbracketed IPv6 address.
        if input.parse::<IpAddr>().is_ok() {
            return Ok(Self::new(input, default_port));
        }

        if let Some(rest) = input.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| AddressError::InvalidPort(input.to_string()))?;
            let port = match tail.strip_prefix(':') {
                Some(p) => parse_port(p, input)?,
                None if tail.is_empty() => default_port,
                None => return Err(AddressError::InvalidPort(input.to_string())),
            };
            let host = if host.is_empty() { LOOPBACK_HOST } else { host };
            return Ok(Self::new(host, port));
        }

        match input.rsplit_once(':') {
            Some((host, port)) => {
                let host = if host.is_empty() { LOOPBACK_HOST } else { host };
                Ok(Self::new(host, parse_port(port, input)?))
            }
            None => Ok(Self::new(input, default_port)),
        }
    }

    /// Returns `host:port`, bracketing IPv6 literals.
    pub fn host_port(&self) -> String {
        self.to_string()
    }
}

fn parse_port(port: &str, input: &str) -> Result<u16, AddressError> {
    port.parse()
        .map_err(|_| AddressError::InvalidPort(input.to_string()))
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_and_port() {
        let addr = Address::parse("192.168.8.235:51822").unwrap();
        assert_eq!(addr, Address::new("192.168.8.235", 51822));
    }

    #[test]
    fn test_parse_empty_host_defaults_to_loopback() {
        let addr = Address::parse(":4000").unwrap();
        assert_eq!(addr.host, LOOPBACK_HOST);
        assert_eq!(addr.port, 4000);
    }

    #[test]
    fn test_parse_empty_bracketed_host_defaults_to_loopback() {
        assert_eq!(Address::parse("[]:9000").unwrap(), Address::new(LOOPBACK_HOST, 9000));
        assert_eq!(
            Address::parse("[]").unwrap(),
            Address::new(LOOPBACK_HOST, DEFAULT_SERVER_PORT)
        );
    }

    #[test]
    fn test_parse_bare_host_uses_default_port() {
        let addr = Address::parse("provision.local").unwrap();
        assert_eq!(addr.host, "provision.local");
        assert_eq!(addr.port, DEFAULT_SERVER_PORT);
    }

    #[test]
    fn test_parse_ipv6_forms() {
        assert_eq!(Address::parse("::1").unwrap(), Address::new("::1", DEFAULT_SERVER_PORT));
        assert_eq!(Address::parse("[::1]:7000").unwrap(), Address::new("::1", 7000));
        assert_eq!(Address::parse("[::1]:7000").unwrap().to_string(), "[::1]:7000");
    }

    #[test]
    fn test_parse_rejects_bad_port_and_blank_input() {
        assert_eq!(
            Address::parse("10.0.0.1:http"),
            Err(AddressError::InvalidPort("10.0.0.1:http".to_string()))
        );
        assert!(matches!(Address::parse("10.0.0.1:70000"), Err(AddressError::InvalidPort(_))));
        assert_eq!(Address::parse("   "), Err(AddressError::Empty));
    }

    #[test]
    fn test_from_socket_addr_round_trips_through_display() {
        let sock: SocketAddr = "10.1.1.5:51820".parse().unwrap();
        let addr = Address::from(sock);
        assert_eq!(addr.host_port(), "10.1.1.5:51820");
    }
}
