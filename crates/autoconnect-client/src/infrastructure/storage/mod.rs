//! Storage infrastructure: configuration and server-record persistence.
//!
//! - `config` reads and writes the TOML `AppConfig`, with defaults when the
//!   file does not exist yet (first run).
//! - `server_record` loads and saves the `ac.conf` provisioning-server record
//!   that sits next to it.

pub mod config;
pub mod server_record;
