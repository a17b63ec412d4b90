//! Boundary to the host's tunnel manager.
//!
//! The handshake produces an `[Interface]` / `[Peer]` text block; what happens
//! to it next (parsing, persisting, bringing an interface up) belongs to the
//! tunnel manager and is hidden behind [`TunnelConfigStore`].  Likewise the
//! WireGuard key pair is generated elsewhere and obtained through
//! [`KeyProvider`].
//!
//! | Type                | Role                                           |
//! |---------------------|------------------------------------------------|
//! | `FileTunnelStore`   | writes `<dir>/<name>.conf` (production)        |
//! | `MemoryTunnelStore` | records every stored block (tests)             |
//! | `StaticKeys`        | returns a key pair read from `AppConfig`       |

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use autoconnect_core::TunnelKeys;
use thiserror::Error;
use tracing::info;

/// Error returned when the tunnel configuration cannot be accepted.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The text is not a tunnel configuration the store understands.
    #[error("tunnel configuration rejected: {0}")]
    Rejected(String),

    #[error("I/O error writing tunnel configuration to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error returned when the local key pair is unavailable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("no {0} key configured")]
    Missing(&'static str),
}

/// Accepts a rendered tunnel configuration.
pub trait TunnelConfigStore: Send + Sync {
    /// Persists `config` for the tunnel called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the text is rejected or cannot be written.
    fn store(&self, name: &str, config: &str) -> Result<(), StoreError>;
}

/// Supplies the local WireGuard key pair.
pub trait KeyProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`KeyError::Missing`] if either half of the pair is absent.
    fn keys(&self) -> Result<TunnelKeys, KeyError>;
}

/// Checks the section layout the tunnel manager's reader expects.
fn validate(config: &str) -> Result<(), StoreError> {
    for section in ["[Interface]", "[Peer]"] {
        if !config.lines().any(|l| l.trim() == section) {
            return Err(StoreError::Rejected(format!("missing {section} section")));
        }
    }
    Ok(())
}

// ── File store ────────────────────────────────────────────────────────────────

/// Writes each configuration to `<dir>/<name>.conf`, replacing any previous
/// file of that name.
#[derive(Debug, Clone)]
pub struct FileTunnelStore {
    dir: PathBuf,
}

impl FileTunnelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.conf"))
    }
}

impl TunnelConfigStore for FileTunnelStore {
    fn store(&self, name: &str, config: &str) -> Result<(), StoreError> {
        validate(config)?;
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(name);
        std::fs::write(&path, config).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        info!("tunnel configuration written to {}", path.display());
        Ok(())
    }
}

// ── Static keys ───────────────────────────────────────────────────────────────

/// A fixed key pair, typically read from the `[tunnel]` config section.
#[derive(Debug, Clone)]
pub struct StaticKeys(TunnelKeys);

impl StaticKeys {
    pub fn new(keys: TunnelKeys) -> Self {
        Self(keys)
    }
}

impl KeyProvider for StaticKeys {
    fn keys(&self) -> Result<TunnelKeys, KeyError> {
        if self.0.private_key.trim().is_empty() {
            return Err(KeyError::Missing("private"));
        }
        if self.0.public_key.trim().is_empty() {
            return Err(KeyError::Missing("public"));
        }
        Ok(self.0.clone())
    }
}

// ── In-memory store (tests) ───────────────────────────────────────────────────

/// Records every accepted configuration without touching the file system.
///
/// Always compiled so integration tests under `tests/` can use it.
#[derive(Debug, Default)]
pub struct MemoryTunnelStore {
    /// `(name, config)` pairs in the order they were stored.
    pub stored: Mutex<Vec<(String, String)>>,
    /// When `true`, `store` fails with [`StoreError::Rejected`].
    pub should_fail: bool,
}

impl MemoryTunnelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// The most recently stored configuration text.
    pub fn last(&self) -> Option<String> {
        self.entries().last().map(|(_, config)| config.clone())
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.stored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl TunnelConfigStore for MemoryTunnelStore {
    fn store(&self, name: &str, config: &str) -> Result<(), StoreError> {
        if self.should_fail {
            return Err(StoreError::Rejected("mock failure".into()));
        }
        validate(config)?;
        self.stored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((name.to_string(), config.to_string()));
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const CONFIG: &str = "[Interface]\nPrivateKey = a\nListenPort = 51820\nAddress = 10.1.1.5/32\n\n\
[Peer]\nPublicKey = b\nAllowedIPs = 10.1.0.0/16\nEndpoint = 203.0.113.1:51820\n";

    #[test]
    fn test_file_store_writes_named_conf_file() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("autoconnect_tun_{}", Uuid::new_v4()));
        let store = FileTunnelStore::new(&dir);

        // Act
        store.store("wg0", CONFIG).unwrap();

        // Assert
        let written = std::fs::read_to_string(dir.join("wg0.conf")).unwrap();
        assert_eq!(written, CONFIG);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_store_rejects_text_without_peer_section() {
        let store = MemoryTunnelStore::new();

        let err = store.store("wg0", "[Interface]\nPrivateKey = a\n").unwrap_err();

        assert!(matches!(err, StoreError::Rejected(msg) if msg.contains("[Peer]")));
        assert!(store.entries().is_empty());
    }

    #[test]
    fn test_memory_store_records_in_order() {
        let store = MemoryTunnelStore::new();

        store.store("a", CONFIG).unwrap();
        store.store("b", CONFIG).unwrap();

        let names: Vec<_> = store.entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(store.last().as_deref(), Some(CONFIG));
    }

    #[test]
    fn test_failing_memory_store_returns_error() {
        let store = MemoryTunnelStore::failing();
        assert!(store.store("wg0", CONFIG).is_err());
    }

    #[test]
    fn test_static_keys_require_both_halves() {
        let missing_private = StaticKeys::new(TunnelKeys::new("", "pub"));
        let missing_public = StaticKeys::new(TunnelKeys::new("priv", " "));
        let complete = StaticKeys::new(TunnelKeys::new("priv", "pub"));

        assert_eq!(missing_private.keys(), Err(KeyError::Missing("private")));
        assert_eq!(missing_public.keys(), Err(KeyError::Missing("public")));
        assert_eq!(complete.keys().unwrap().public_key, "pub");
    }
}
