//! # autoconnect-core
//!
//! Shared library for the WireGuard auto-connect client containing the
//! plaintext handshake protocol, its codec, and the pure transformations that
//! turn a provisioning server's replies into a tunnel configuration.
//!
//! This crate has no dependencies on sockets, the filesystem, or any OS API.
//! Everything that touches the network or disk lives in `autoconnect-client`.
//!
//! # Architecture overview
//!
//! A client that wants a VPN identity talks to a *provisioning server* over
//! TCP.  The exchange is three text messages long:
//!
//! ```text
//! Client                                  Provisioning server
//! ──────                                  ───────────────────
//! cmd:=HELLO  (mac, proposed networks) ──>
//!                                      <── cmd:=OK (assigned vpnip, peer key, endpoint)
//! cmd:=PING   (echoes assigned vpnip)  ──>
//!                                      <── cmd:=OK (same peer parameters)
//! ```
//!
//! - **`protocol`** – How the eight `key:=value` lines of a message travel
//!   on the wire, and the closed set of command names.
//!
//! - **`domain`** – Addresses, the persisted server record, hardware
//!   addresses, and [`ProvisionedIdentity`]: the derived output that becomes
//!   the `[Interface]` / `[Peer]` tunnel configuration text.

pub mod domain;
pub mod protocol;

pub use domain::address::{Address, AddressError};
pub use domain::identity::{AssignedAddress, DeriveError, ProvisionedIdentity, TunnelKeys};
pub use domain::mac::MacAddress;
pub use domain::server_info::{ServerInfo, ServerRecordError};
pub use protocol::codec::{decode_message, encode_message, CodecError};
pub use protocol::command::{extract_command, Command};
pub use protocol::message::HandshakeMessage;
