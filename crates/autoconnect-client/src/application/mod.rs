//! Application layer for the auto-connect client.
//!
//! - **`handshake`** – The HELLO/PING state machine.  Opens a session to the
//!   provisioning server, exchanges the two requests, derives the tunnel
//!   configuration from the replies, and hands it to the injected
//!   `TunnelConfigStore`.  Owns both retry policies.
//!
//! - **`worker`** – The START/STOP control loop.  Runs one handshake sequence
//!   per START, never two at once, and exits permanently on STOP.

pub mod handshake;
pub mod worker;
