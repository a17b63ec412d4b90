//! Infrastructure layer for the client application.
//!
//! **Dependency rule**: this layer may depend on `autoconnect_core`, but
//! MUST NOT import from `application`.
//!
//! # Sub-modules
//!
//! - **`network`** – the TCP [`Session`](network::session::Session) and local
//!   network discovery (hardware address, outbound IPv4).
//! - **`storage`** – the TOML application config and the persisted server
//!   record.
//! - **`tunnel`** – the boundary to the external tunnel manager: where the
//!   generated configuration goes and where the key pair comes from.

pub mod network;
pub mod storage;
pub mod tunnel;
