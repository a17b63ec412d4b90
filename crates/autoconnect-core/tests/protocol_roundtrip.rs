//! Integration tests for the autoconnect-core protocol codec.
//!
//! These tests drive the public API the way the client does: build a
//! message, encode it, decode what a server would send back, and derive the
//! tunnel configuration from the replies.

use autoconnect_core::{
    decode_message, encode_message, extract_command,
    domain::identity::{peer_endpoint, DEFAULT_LISTEN_PORT},
    AssignedAddress, CodecError, Command, HandshakeMessage, MacAddress, ProvisionedIdentity,
    TunnelKeys,
};

const SERVER_KEY: &str = "HIgo9xNzJMWLKASShiTqIybxZ0U3wGLiUeJ1PKf8ykw=";

fn roundtrip(msg: &HandshakeMessage) -> HandshakeMessage {
    let bytes = encode_message(msg).expect("encode must succeed");
    decode_message(&bytes).expect("decode must succeed")
}

fn hello() -> HandshakeMessage {
    let mut msg = HandshakeMessage::new(Command::Hello);
    msg.mac_address = MacAddress::new([0x3C, 0x22, 0xFB, 0x10, 0x20, 0x30]).to_string();
    msg.vpn_ip = "0.0.0.0".to_string();
    msg.vpn_netmask = "0.0.0.0".to_string();
    msg.public_key = "gN65BkIKy1eCE9pP1wdc8ROUtkHLF2PfAqYdyYBz6EA=".to_string();
    msg.endpoint_ip = "192.168.1.20".to_string();
    msg.endpoint_port = "51820".to_string();
    msg.allowed_ips = "10.1.0.0/16,192.168.0.0/16".to_string();
    msg
}

#[test]
fn test_roundtrip_hello_message() {
    let original = hello();
    assert_eq!(original, roundtrip(&original));
}

#[test]
fn test_roundtrip_every_command() {
    for name in [
        "HELLO",
        "PING",
        "PONG",
        "OK",
        "NOK",
        "BYE",
        "EXIST",
        "SEND_VPN_INFORMATION",
        "SEND_VPN_INFORMATION_AGAIN",
        "START_VPN",
        "START_VPN_AGAIN",
        "SOMETHING_NEW",
    ] {
        let mut msg = hello();
        msg.command = Command::from_name(name);
        assert_eq!(roundtrip(&msg).command.as_str(), name);
    }
}

#[test]
fn test_roundtrip_message_with_empty_fields() {
    let mut original = hello();
    original.mac_address.clear();
    original.allowed_ips.clear();
    assert_eq!(original, roundtrip(&original));
}

#[test]
fn test_encoded_hello_is_exact_wire_text() {
    let bytes = encode_message(&hello()).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(
        text,
        "cmd:=HELLO\n\
         macaddr:=3C-22-FB-10-20-30\n\
         vpnip:=0.0.0.0\n\
         vpnnetmask:=0.0.0.0\n\
         publickey:=gN65BkIKy1eCE9pP1wdc8ROUtkHLF2PfAqYdyYBz6EA=\n\
         epip:=192.168.1.20\n\
         epport:=51820\n\
         allowedips:=10.1.0.0/16,192.168.0.0/16\n"
    );
    let first_line = text.lines().next().unwrap();
    assert_eq!(extract_command(first_line).unwrap(), "HELLO");
}

#[test]
fn test_decode_short_reply_is_an_error_not_a_panic() {
    for lines in 0..8 {
        let partial: String = encode_message(&hello())
            .map(|b| String::from_utf8(b).unwrap())
            .unwrap()
            .lines()
            .take(lines)
            .map(|l| format!("{l}\n"))
            .collect();
        let result = decode_message(partial.as_bytes());
        assert_eq!(
            result,
            Err(CodecError::TooFewLines {
                expected: 8,
                found: lines
            }),
            "{lines} lines must be rejected"
        );
    }
}

#[test]
fn test_server_replies_derive_full_tunnel_config() {
    // Arrange: what a provisioning server sends back to HELLO and PING
    let reply_text = format!(
        "cmd:=OK\n\
         macaddr:=\n\
         vpnip:=10.1.1.5\n\
         vpnnetmask:=255.255.0.0\n\
         publickey:={SERVER_KEY}\n\
         epip:=203.0.113.1\n\
         epport:=51820\n\
         allowedips:=10.1.0.0/16,192.168.0.0/16\n"
    );
    let hello_reply = decode_message(reply_text.as_bytes()).unwrap();
    let ping_reply = decode_message(reply_text.as_bytes()).unwrap();
    let keys = TunnelKeys::new("ePTeTZ1Q4+vnGH/J/8dLNQKHhkG+QjdQmQaRcZZ5i2w=", "local-pub");

    // Act
    let address = AssignedAddress::from_reply(&hello_reply).unwrap();
    let identity =
        ProvisionedIdentity::derive(address, &ping_reply, &keys, DEFAULT_LISTEN_PORT).unwrap();
    let config = identity.to_tunnel_config();

    // Assert
    assert!(config.contains("Address = 10.1.1.5/32\n"));
    assert!(config.contains(&format!("PublicKey = {SERVER_KEY}\n")));
    assert!(config.contains("AllowedIPs = 10.1.0.0/16,192.168.0.0/16\n"));
    assert!(config.contains("Endpoint = 203.0.113.1:51820\n"));
    assert!(config.contains("ListenPort = 51820\n"));
    assert_eq!(peer_endpoint(&ping_reply).unwrap(), "203.0.113.1:51820");
}
