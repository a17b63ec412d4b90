//! The eight-field handshake message.
//!
//! On the wire a message is exactly eight `key:=value` lines in this order:
//!
//! | # | Key          | Field                         |
//! |---|--------------|-------------------------------|
//! | 1 | `cmd`        | [`HandshakeMessage::command`] |
//! | 2 | `macaddr`    | hardware address              |
//! | 3 | `vpnip`      | assigned / proposed VPN address |
//! | 4 | `vpnnetmask` | VPN netmask                   |
//! | 5 | `publickey`  | sender's tunnel public key    |
//! | 6 | `epip`       | endpoint IPv4 address         |
//! | 7 | `epport`     | endpoint port                 |
//! | 8 | `allowedips` | comma-separated network list  |

use crate::protocol::command::Command;

/// Wire key names, in field order.
pub mod keys {
    pub const COMMAND: &str = "cmd";
    pub const MAC_ADDRESS: &str = "macaddr";
    pub const VPN_IP: &str = "vpnip";
    pub const VPN_NETMASK: &str = "vpnnetmask";
    pub const PUBLIC_KEY: &str = "publickey";
    pub const ENDPOINT_IP: &str = "epip";
    pub const ENDPOINT_PORT: &str = "epport";
    pub const ALLOWED_IPS: &str = "allowedips";
}

/// Number of lines in every message.
pub const FIELD_COUNT: usize = 8;

/// Keys in the fixed order they appear on the wire.
pub const FIELD_KEYS: [&str; FIELD_COUNT] = [
    keys::COMMAND,
    keys::MAC_ADDRESS,
    keys::VPN_IP,
    keys::VPN_NETMASK,
    keys::PUBLIC_KEY,
    keys::ENDPOINT_IP,
    keys::ENDPOINT_PORT,
    keys::ALLOWED_IPS,
];

/// Largest message a peer is expected to send in one packet.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Placeholder VPN address and netmask sent before the server assigns one.
pub const UNASSIGNED_ADDRESS: &str = "0.0.0.0";

/// One handshake request or response.
///
/// All fields except `command` hold the bare value (no key, no newline).
/// An empty string means the sender had nothing to report for that field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeMessage {
    pub command: Command,
    pub mac_address: String,
    pub vpn_ip: String,
    pub vpn_netmask: String,
    pub public_key: String,
    pub endpoint_ip: String,
    pub endpoint_port: String,
    pub allowed_ips: String,
}

impl HandshakeMessage {
    /// Creates a message carrying `command` with every other field empty.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            mac_address: String::new(),
            vpn_ip: String::new(),
            vpn_netmask: String::new(),
            public_key: String::new(),
            endpoint_ip: String::new(),
            endpoint_port: String::new(),
            allowed_ips: String::new(),
        }
    }

    /// Returns `(key, value)` pairs in wire order.
    pub fn fields(&self) -> [(&'static str, &str); FIELD_COUNT] {
        [
            (keys::COMMAND, self.command.as_str()),
            (keys::MAC_ADDRESS, &self.mac_address),
            (keys::VPN_IP, &self.vpn_ip),
            (keys::VPN_NETMASK, &self.vpn_netmask),
            (keys::PUBLIC_KEY, &self.public_key),
            (keys::ENDPOINT_IP, &self.endpoint_ip),
            (keys::ENDPOINT_PORT, &self.endpoint_port),
            (keys::ALLOWED_IPS, &self.allowed_ips),
        ]
    }

    /// Mutable access to the value slot for field `index` (1..=7).
    ///
    /// Index 0 is the command, which is not a plain string.
    pub(crate) fn value_slot_mut(&mut self, index: usize) -> Option<&mut String> {
        match index {
            1 => Some(&mut self.mac_address),
            2 => Some(&mut self.vpn_ip),
            3 => Some(&mut self.vpn_netmask),
            4 => Some(&mut self.public_key),
            5 => Some(&mut self.endpoint_ip),
            6 => Some(&mut self.endpoint_port),
            7 => Some(&mut self.allowed_ips),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_has_only_command_set() {
        let msg = HandshakeMessage::new(Command::Bye);
        assert_eq!(msg.command, Command::Bye);
        assert!(msg.fields()[1..].iter().all(|(_, v)| v.is_empty()));
    }

    #[test]
    fn test_fields_follow_wire_key_order() {
        let msg = HandshakeMessage::new(Command::Hello);
        let keys: Vec<&str> = msg.fields().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, FIELD_KEYS);
    }

    #[test]
    fn test_value_slot_mut_covers_every_non_command_field() {
        let mut msg = HandshakeMessage::new(Command::Ping);
        for i in 1..FIELD_COUNT {
            *msg.value_slot_mut(i).expect("slot exists") = format!("v{i}");
        }
        assert!(msg.value_slot_mut(0).is_none());
        assert!(msg.value_slot_mut(FIELD_COUNT).is_none());
        assert_eq!(msg.allowed_ips, "v7");
        assert_eq!(msg.mac_address, "v1");
    }
}
