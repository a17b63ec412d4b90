//! The persisted provisioning-server record (`ac.conf`).
//!
//! The text format belongs to [`ServerInfo`]; this module only moves it on and
//! off disk.  A missing file is not an error: callers fall back to the server
//! named in `AppConfig`.

use std::path::{Path, PathBuf};

use autoconnect_core::ServerInfo;
use tracing::{info, warn};

use super::config::ConfigError;

/// File name of the record, stored in the config directory.
pub const SERVER_RECORD_FILE: &str = "ac.conf";

/// Path of the record inside `config_dir`.
pub fn server_record_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SERVER_RECORD_FILE)
}

/// Loads the record at `path`.  Returns `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for other file-system errors and
/// [`ConfigError::Record`] if either key is missing or the port is invalid.
pub fn load_server_record(path: &Path) -> Result<Option<ServerInfo>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    ServerInfo::parse_record(&text)
        .map(Some)
        .map_err(|source| ConfigError::Record {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes `server` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] on file-system failure.
pub fn save_server_record(path: &Path, server: &ServerInfo) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, server.to_record()).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("saved provisioning server {}:{} to {}", server.host, server.port, path.display());
    Ok(())
}

/// Returns the saved record, or `fallback` if there is none or it cannot be
/// read.
pub fn resolve_server(path: &Path, fallback: &ServerInfo) -> ServerInfo {
    match load_server_record(path) {
        Ok(Some(server)) => server,
        Ok(None) => fallback.clone(),
        Err(e) => {
            warn!("{e}; using {}:{}", fallback.host, fallback.port);
            fallback.clone()
        }
    }
}
