//! Network infrastructure for the client application.
//!
//! - `session` – one TCP connection to the provisioning server with bounded
//!   connect, write, and read calls.
//! - `net_info` – discovery of the local hardware address and the IPv4
//!   address used for outbound traffic.

pub mod net_info;
pub mod session;

pub use net_info::{NetworkInfo, SystemNetworkInfo};
pub use session::{Session, SessionError, SessionTimeouts};
