//! The provisioning server record.
//!
//! Persisted as two `Key = value` lines:
//!
//! ```text
//! Server IP = 192.168.8.235
//! Server Port = 51822
//! ```
//!
//! Both keys must be present for a record to load.  Reading and writing the
//! file itself is done by the client crate; this module only owns the text
//! format.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::address::{Address, DEFAULT_SERVER_PORT};

pub const SERVER_IP_KEY: &str = "Server IP";
pub const SERVER_PORT_KEY: &str = "Server Port";

/// Host used when no record has been saved.
pub const DEFAULT_SERVER_HOST: &str = "192.168.8.235";

/// Errors produced while parsing a server record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServerRecordError {
    #[error("server record is missing '{0}'")]
    MissingKey(&'static str),
    #[error("server record line {line} has no '='")]
    MalformedLine { line: usize },
    #[error("invalid server port '{0}'")]
    InvalidPort(String),
}

/// Address of the provisioning server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    pub host: String,
    pub port: u16,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

impl ServerInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn address(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }

    /// Parses the two-line record.  Blank lines and unknown keys are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRecordError`] if a line lacks `=`, a key is missing,
    /// or the port is not a valid `u16`.
    pub fn parse_record(text: &str) -> Result<Self, ServerRecordError> {
        let mut host = None;
        let mut port = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or(ServerRecordError::MalformedLine { line: index + 1 })?;
            match key.trim() {
                SERVER_IP_KEY => host = Some(value.trim().to_string()),
                SERVER_PORT_KEY => port = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let host = host
            .filter(|h| !h.is_empty())
            .ok_or(ServerRecordError::MissingKey(SERVER_IP_KEY))?;
        let port = port.ok_or(ServerRecordError::MissingKey(SERVER_PORT_KEY))?;
        let port = port
            .parse()
            .map_err(|_| ServerRecordError::InvalidPort(port.clone()))?;
        Ok(Self { host, port })
    }

    /// Renders the record in its persisted form.
    pub fn to_record(&self) -> String {
        format!(
            "{SERVER_IP_KEY} = {}\n{SERVER_PORT_KEY} = {}\n",
            self.host, self.port
        )
    }
}
