//! Domain layer: pure value types and transformations with no I/O.
//!
//! - **`address`** – host/port pairs parsed from user or config input.
//! - **`server_info`** – the provisioning server record and its two-line
//!   `Server IP = ...` / `Server Port = ...` text form.
//! - **`mac`** – six-octet hardware addresses as sent in `macaddr`.
//! - **`identity`** – what a successful handshake yields, and the tunnel
//!   configuration text built from it.

pub mod address;
pub mod identity;
pub mod mac;
pub mod server_info;
