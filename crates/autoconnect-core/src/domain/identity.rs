//! Turning handshake replies into a tunnel configuration.
//!
//! The HELLO reply assigns this client a VPN address; the PING reply carries
//! the peer's public key, endpoint, and allowed networks.  Together with the
//! locally held private key they form a [`ProvisionedIdentity`], which renders
//! to the text block handed to the tunnel-configuration store:
//!
//! ```text
//! [Interface]
//! PrivateKey = <local private key>
//! ListenPort = 51820
//! Address = 10.1.1.5/32
//!
//! [Peer]
//! PublicKey = <server public key>
//! AllowedIPs = 10.1.0.0/16,192.168.0.0/16
//! Endpoint = 203.0.113.1:51820
//! ```

use std::fmt;
use std::net::Ipv4Addr;

use thiserror::Error;

use crate::protocol::message::{keys, HandshakeMessage};

/// Prefix length of every address assigned by the provisioning server.
pub const ASSIGNED_PREFIX_LEN: u8 = 32;

/// UDP port the local tunnel interface listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 51820;

/// Errors raised when a reply lacks what the configuration needs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeriveError {
    #[error("reply field '{0}' is empty")]
    MissingField(&'static str),
    #[error("reply field '{field}' holds an invalid address: '{value}'")]
    InvalidAddress { field: &'static str, value: String },
    #[error("reply field 'epport' holds an invalid port: '{0}'")]
    InvalidPort(String),
}

/// The local key pair.  Generated and stored outside this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct TunnelKeys {
    pub private_key: String,
    pub public_key: String,
}

impl TunnelKeys {
    pub fn new(private_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            public_key: public_key.into(),
        }
    }
}

impl fmt::Debug for TunnelKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelKeys")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// The VPN address assigned in a HELLO reply, always a single host (`/32`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignedAddress(Ipv4Addr);

impl AssignedAddress {
    /// Reads the `vpnip` value of a HELLO reply.
    ///
    /// # Errors
    ///
    /// Returns [`DeriveError`] if the field is empty or not an IPv4 address.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use autoconnect_core::decode_message;
    /// use autoconnect_core::domain::identity::AssignedAddress;
    ///
    /// let reply = decode_message(
    ///     b"cmd:=OK\nmacaddr:=\nvpnip:=10.1.1.100\nvpnnetmask:=\npublickey:=\nepip:=\nepport:=\nallowedips:=\n",
    /// ).unwrap();
    /// assert_eq!(AssignedAddress::from_reply(&reply).unwrap().to_string(), "10.1.1.100/32");
    /// ```
    pub fn from_reply(reply: &HandshakeMessage) -> Result<Self, DeriveError> {
        let value = required(&reply.vpn_ip, keys::VPN_IP)?;
        let ip = value.parse().map_err(|_| DeriveError::InvalidAddress {
            field: keys::VPN_IP,
            value: value.to_string(),
        })?;
        Ok(Self(ip))
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.0
    }
}

impl From<Ipv4Addr> for AssignedAddress {
    fn from(ip: Ipv4Addr) -> Self {
        Self(ip)
    }
}

impl fmt::Display for AssignedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, ASSIGNED_PREFIX_LEN)
    }
}

/// Joins a reply's `epip` and `epport` values into `ip:port`.
///
/// # Errors
///
/// Returns [`DeriveError`] if either field is empty or the port is not a `u16`.
pub fn peer_endpoint(reply: &HandshakeMessage) -> Result<String, DeriveError> {
    let ip = required(&reply.endpoint_ip, keys::ENDPOINT_IP)?;
    let port = required(&reply.endpoint_port, keys::ENDPOINT_PORT)?;
    let port: u16 = port
        .parse()
        .map_err(|_| DeriveError::InvalidPort(port.to_string()))?;
    Ok(format!("{ip}:{port}"))
}

/// Splits a comma-separated allowed-IPs value, dropping empty entries.
pub fn split_allowed_ips(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, DeriveError> {
    let value = value.trim();
    if value.is_empty() {
        Err(DeriveError::MissingField(field))
    } else {
        Ok(value)
    }
}

/// Everything a successful handshake provisions for the local tunnel.
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisionedIdentity {
    pub address: AssignedAddress,
    pub listen_port: u16,
    pub private_key: String,
    pub peer_public_key: String,
    pub peer_endpoint: String,
    pub allowed_ips: Vec<String>,
}

impl ProvisionedIdentity {
    /// Builds the identity from the address assigned during HELLO and the
    /// peer parameters carried by the PING reply.
    ///
    /// # Errors
    ///
    /// Returns [`DeriveError`] if the reply lacks a public key, endpoint, or
    /// allowed-IP list.
    pub fn derive(
        address: AssignedAddress,
        reply: &HandshakeMessage,
        local_keys: &TunnelKeys,
        listen_port: u16,
    ) -> Result<Self, DeriveError> {
        let peer_public_key = required(&reply.public_key, keys::PUBLIC_KEY)?.to_string();
        let peer_endpoint = peer_endpoint(reply)?;
        let allowed_ips = split_allowed_ips(&reply.allowed_ips);
        if allowed_ips.is_empty() {
            return Err(DeriveError::MissingField(keys::ALLOWED_IPS));
        }
        Ok(Self {
            address,
            listen_port,
            private_key: local_keys.private_key.clone(),
            peer_public_key,
            peer_endpoint,
            allowed_ips,
        })
    }

    /// Renders the `[Interface]` / `[Peer]` configuration text.
    pub fn to_tunnel_config(&self) -> String {
        format!(
            "[Interface]\n\
             PrivateKey = {}\n\
             ListenPort = {}\n\
             Address = {}\n\
             \n\
             [Peer]\n\
             PublicKey = {}\n\
             AllowedIPs = {}\n\
             Endpoint = {}\n",
            self.private_key,
            self.listen_port,
            self.address,
            self.peer_public_key,
            self.allowed_ips.join(","),
            self.peer_endpoint,
        )
    }
}

impl fmt::Debug for ProvisionedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedIdentity")
            .field("address", &self.address)
            .field("listen_port", &self.listen_port)
            .field("peer_public_key", &self.peer_public_key)
            .field("peer_endpoint", &self.peer_endpoint)
            .field("allowed_ips", &self.allowed_ips)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command::Command;

    const PEER_KEY: &str = "xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=";

    fn reply() -> HandshakeMessage {
        let mut msg = HandshakeMessage::new(Command::Ok);
        msg.vpn_ip = "10.1.1.5".to_string();
        msg.vpn_netmask = "255.255.255.0".to_string();
        msg.public_key = PEER_KEY.to_string();
        msg.endpoint_ip = "203.0.113.1".to_string();
        msg.endpoint_port = "51820".to_string();
        msg.allowed_ips = "10.1.0.0/16,192.168.0.0/16".to_string();
        msg
    }

    fn local_keys() -> TunnelKeys {
        TunnelKeys::new("yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=", "local-public")
    }

    #[test]
    fn test_assigned_address_appends_host_prefix() {
        let addr = AssignedAddress::from_reply(&reply()).unwrap();
        assert_eq!(addr.to_string(), "10.1.1.5/32");
        assert_eq!(addr.ip(), Ipv4Addr::new(10, 1, 1, 5));
    }

    #[test]
    fn test_assigned_address_rejects_empty_and_garbage() {
        let mut msg = reply();
        msg.vpn_ip.clear();
        assert_eq!(
            AssignedAddress::from_reply(&msg),
            Err(DeriveError::MissingField("vpnip"))
        );

        msg.vpn_ip = "10.1.1".to_string();
        assert!(matches!(
            AssignedAddress::from_reply(&msg),
            Err(DeriveError::InvalidAddress { field: "vpnip", .. })
        ));
    }

    #[test]
    fn test_peer_endpoint_joins_ip_and_port() {
        let mut msg = reply();
        msg.endpoint_ip = "203.0.113.7".to_string();
        assert_eq!(peer_endpoint(&msg).unwrap(), "203.0.113.7:51820");
    }

    #[test]
    fn test_peer_endpoint_rejects_bad_port() {
        let mut msg = reply();
        msg.endpoint_port = "99999".to_string();
        assert_eq!(peer_endpoint(&msg), Err(DeriveError::InvalidPort("99999".to_string())));
    }

    #[test]
    fn test_split_allowed_ips_drops_blanks() {
        assert_eq!(
            split_allowed_ips(" 10.1.0.0/16, ,192.168.0.0/16,"),
            vec!["10.1.0.0/16".to_string(), "192.168.0.0/16".to_string()]
        );
    }

    #[test]
    fn test_derive_requires_peer_public_key() {
        let mut msg = reply();
        msg.public_key.clear();
        let address = AssignedAddress::from(Ipv4Addr::new(10, 1, 1, 5));
        assert_eq!(
            ProvisionedIdentity::derive(address, &msg, &local_keys(), DEFAULT_LISTEN_PORT),
            Err(DeriveError::MissingField("publickey"))
        );
    }

    #[test]
    fn test_derive_requires_allowed_ips() {
        let mut msg = reply();
        msg.allowed_ips = ",".to_string();
        let address = AssignedAddress::from(Ipv4Addr::new(10, 1, 1, 5));
        assert_eq!(
            ProvisionedIdentity::derive(address, &msg, &local_keys(), DEFAULT_LISTEN_PORT),
            Err(DeriveError::MissingField("allowedips"))
        );
    }

    #[test]
    fn test_tunnel_config_contains_interface_and_peer_sections() {
        // Arrange
        let address = AssignedAddress::from_reply(&reply()).unwrap();
        let identity =
            ProvisionedIdentity::derive(address, &reply(), &local_keys(), DEFAULT_LISTEN_PORT).unwrap();

        // Act
        let text = identity.to_tunnel_config();

        // Assert
        let expected = format!(
            "[Interface]\n\
             PrivateKey = yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=\n\
             ListenPort = 51820\n\
             Address = 10.1.1.5/32\n\
             \n\
             [Peer]\n\
             PublicKey = {PEER_KEY}\n\
             AllowedIPs = 10.1.0.0/16,192.168.0.0/16\n\
             Endpoint = 203.0.113.1:51820\n"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_debug_output_never_contains_private_key() {
        let rendered = format!("{:?}", local_keys());
        assert!(!rendered.contains("yAnz5TF"));

        let address = AssignedAddress::from(Ipv4Addr::new(10, 1, 1, 5));
        let identity =
            ProvisionedIdentity::derive(address, &reply(), &local_keys(), DEFAULT_LISTEN_PORT).unwrap();
        assert!(!format!("{identity:?}").contains("yAnz5TF"));
    }
}
