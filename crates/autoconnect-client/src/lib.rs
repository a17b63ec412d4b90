//! autoconnect-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the client do?
//!
//! On a START trigger the client:
//!
//! 1. Resolves the provisioning server from the persisted record (or the
//!    compiled-in default).
//! 2. Opens a TCP session, retrying the connect once after a short delay.
//! 3. Sends HELLO with its hardware address, public key, and proposed
//!    networks; reads back the assigned VPN address.
//! 4. Sends PING echoing that address; reads back the peer parameters.
//! 5. Renders the `[Interface]` / `[Peer]` configuration and hands it to the
//!    tunnel-configuration store.
//!
//! Failures in steps 3–5 restart the whole exchange once before giving up.

/// Application layer: the handshake state machine and the trigger worker.
pub mod application;

/// Infrastructure layer: sockets, local network discovery, config files,
/// and the tunnel-configuration store boundary.
pub mod infrastructure;
