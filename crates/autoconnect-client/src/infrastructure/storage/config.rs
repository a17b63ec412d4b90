//! TOML-based configuration for the auto-connect client.
//!
//! Reads and writes `AppConfig` at the platform-appropriate location:
//! - Windows:  `%APPDATA%\AutoConnect\config.toml`
//! - Linux:    `~/.config/autoconnect/config.toml`
//! - macOS:    `~/Library/Application Support/AutoConnect/config.toml`
//!
//! Example:
//!
//! ```toml
//! log_level = "info"
//!
//! [server]
//! host = "192.168.8.235"
//! port = 51822
//!
//! [handshake]
//! connect_timeout_secs = 3
//! io_timeout_secs = 10
//! retry_delay_secs = 2
//!
//! [tunnel]
//! name = "wg0"
//! private_key = "..."
//! public_key = "..."
//! ```
//!
//! Every field has a `#[serde(default = "...")]` so the client runs on first
//! start (no file) and on files written by older versions.

use std::path::{Path, PathBuf};

use autoconnect_core::{ServerInfo, ServerRecordError, TunnelKeys};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The persisted server record is malformed.
    #[error("invalid server record at {path}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: ServerRecordError,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// `tracing` log level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Fallback provisioning server when no `ac.conf` record exists.
    #[serde(default)]
    pub server: ServerInfo,
    #[serde(default)]
    pub handshake: HandshakeSettings,
    #[serde(default)]
    pub tunnel: TunnelSettings,
    #[serde(default)]
    pub network: NetworkSettings,
}

/// Timeouts and retry bounds for one handshake sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakeSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Bound on every read and write once connected.
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    #[serde(default = "default_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_attempts")]
    pub handshake_attempts: u32,
    /// Pause between connect attempts and between handshake attempts.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Send BYE to the server after a completed sequence.
    #[serde(default)]
    pub send_bye: bool,
}

/// Local tunnel identity and where the generated configuration goes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TunnelSettings {
    /// Tunnel name; the configuration is written to `<output_dir>/<name>.conf`.
    #[serde(default = "default_tunnel_name")]
    pub name: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Network always proposed in HELLO, ahead of the local /16.
    #[serde(default = "default_base_allowed_ips")]
    pub base_allowed_ips: String,
    /// Base64 WireGuard private key.  Key generation is out of scope; supply
    /// the key pair produced by `wg genkey` / `wg pubkey`.
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub public_key: String,
    /// Defaults to `<config dir>/Configurations`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

/// Local network discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSettings {
    /// External host used to select the outbound IPv4 route.
    #[serde(default = "default_probe_target")]
    pub probe_target: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    3
}
fn default_io_timeout_secs() -> u64 {
    10
}
fn default_attempts() -> u32 {
    2
}
fn default_retry_delay_secs() -> u64 {
    2
}
fn default_tunnel_name() -> String {
    "wg0".to_string()
}
fn default_listen_port() -> u16 {
    autoconnect_core::domain::identity::DEFAULT_LISTEN_PORT
}
fn default_base_allowed_ips() -> String {
    "10.1.0.0/16".to_string()
}
fn default_probe_target() -> String {
    crate::infrastructure::network::net_info::DEFAULT_PROBE_TARGET.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerInfo::default(),
            handshake: HandshakeSettings::default(),
            tunnel: TunnelSettings::default(),
            network: NetworkSettings::default(),
        }
    }
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            connect_attempts: default_attempts(),
            handshake_attempts: default_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            send_bye: false,
        }
    }
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            name: default_tunnel_name(),
            listen_port: default_listen_port(),
            base_allowed_ips: default_base_allowed_ips(),
            private_key: String::new(),
            public_key: String::new(),
            output_dir: None,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            probe_target: default_probe_target(),
        }
    }
}

impl AppConfig {
    pub fn tunnel_keys(&self) -> TunnelKeys {
        TunnelKeys::new(&self.tunnel.private_key, &self.tunnel.public_key)
    }

    /// Directory the tunnel configuration is written to.
    pub fn output_dir(&self, config_dir: &Path) -> PathBuf {
        self.tunnel
            .output_dir
            .clone()
            .unwrap_or_else(|| config_dir.join("Configurations"))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("AutoConnect"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("autoconnect"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("AutoConnect")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
