//! WireGuard auto-connect client entry point.
//!
//! Loads the TOML config, wires the handshake client to the system network
//! lookups, the configured key pair, and the file-backed tunnel store, then
//! drives a [`ProvisioningWorker`] from the command line.
//!
//! # Usage
//!
//! ```text
//! autoconnect-client [--config <PATH>] [COMMAND]
//!
//! Commands:
//!   run          Provision once, then wait for Ctrl+C (default)
//!   set-server   Save the provisioning server to ac.conf
//!   show-server  Print the provisioning server that `run` would use
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable             | Description                                  |
//! |----------------------|----------------------------------------------|
//! | `AUTOCONNECT_CONFIG` | Path of `config.toml`                        |
//! | `AUTOCONNECT_SERVER` | `host[:port]` overriding ac.conf for `run`   |
//! | `RUST_LOG`           | Log filter; falls back to `log_level`        |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use autoconnect_client::application::handshake::{HandshakeClient, HandshakeConfig};
use autoconnect_client::application::worker::{ProvisioningWorker, WorkerConfig};
use autoconnect_client::infrastructure::network::SystemNetworkInfo;
use autoconnect_client::infrastructure::storage::config::{
    config_dir, config_file_path, load_config, AppConfig,
};
use autoconnect_client::infrastructure::storage::server_record::{
    save_server_record, server_record_path,
};
use autoconnect_client::infrastructure::tunnel::{FileTunnelStore, StaticKeys};
use autoconnect_core::domain::address::DEFAULT_SERVER_PORT;
use autoconnect_core::{Address, ServerInfo};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Provisions a WireGuard tunnel configuration from an auto-connect server.
#[derive(Debug, Parser)]
#[command(
    name = "autoconnect-client",
    about = "WireGuard auto-connect provisioning client",
    version
)]
struct Cli {
    /// Path of the TOML config file.  `ac.conf` is read from the same
    /// directory.
    #[arg(long, global = true, env = "AUTOCONNECT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Run one provisioning sequence.
    Run {
        /// Exit as soon as the sequence finishes instead of waiting for Ctrl+C.
        #[arg(long)]
        once: bool,

        /// Provisioning server as `host[:port]`, overriding ac.conf.
        #[arg(long, env = "AUTOCONNECT_SERVER")]
        server: Option<String>,
    },
    /// Save the provisioning server address to ac.conf.
    SetServer { ip: String, port: u16 },
    /// Print the provisioning server `run` would contact.
    ShowServer,
}

/// Where `config.toml` and `ac.conf` live.
struct Paths {
    config_file: PathBuf,
    dir: PathBuf,
}

impl Paths {
    fn resolve(explicit: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_file = match explicit {
            Some(path) => path,
            None => config_file_path()?,
        };
        let dir = match config_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            Some(_) => PathBuf::from("."),
            None => config_dir()?,
        };
        Ok(Self { config_file, dir })
    }

    fn server_record(&self) -> PathBuf {
        server_record_path(&self.dir)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = Paths::resolve(cli.config)?;
    let loaded = load_config(&paths.config_file);

    // RUST_LOG wins; otherwise the configured level, or `info` if the config
    // itself failed to load.
    let level = loaded
        .as_ref()
        .map(|cfg| cfg.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let config = loaded
        .with_context(|| format!("loading {}", paths.config_file.display()))?;

    match cli.command.unwrap_or(CliCommand::Run {
        once: false,
        server: None,
    }) {
        CliCommand::Run { once, server } => run(&config, &paths, server.as_deref(), once).await,
        CliCommand::SetServer { ip, port } => {
            if ip.trim().is_empty() {
                anyhow::bail!("server IP must not be empty");
            }
            let server = ServerInfo::new(ip.trim(), port);
            save_server_record(&paths.server_record(), &server)?;
            println!("{}", server.address());
            Ok(())
        }
        CliCommand::ShowServer => {
            let worker_config = worker_config(&config, &paths, None)?;
            println!("{}", worker_config.resolve_server());
            Ok(())
        }
    }
}

fn worker_config(
    config: &AppConfig,
    paths: &Paths,
    server: Option<&str>,
) -> anyhow::Result<WorkerConfig> {
    let server_override = server
        .map(|s| Address::parse_with_default_port(s, DEFAULT_SERVER_PORT))
        .transpose()
        .context("invalid --server address")?;
    Ok(WorkerConfig {
        server_override,
        server_record: Some(paths.server_record()),
        fallback_server: config.server.clone(),
    })
}

async fn run(
    config: &AppConfig,
    paths: &Paths,
    server: Option<&str>,
    once: bool,
) -> anyhow::Result<()> {
    info!("auto-connect client starting");
    let worker_config = worker_config(config, paths, server)?;

    let output_dir = config.output_dir(&paths.dir);
    let client = HandshakeClient::new(
        HandshakeConfig::from(config),
        Arc::new(SystemNetworkInfo::new(config.network.probe_target.clone())),
        Arc::new(StaticKeys::new(config.tunnel_keys())),
        Arc::new(FileTunnelStore::new(&output_dir)),
    );
    info!(
        "tunnel configuration will be written to {}",
        output_dir.join(format!("{}.conf", config.tunnel.name)).display()
    );

    let (worker, handle) = ProvisioningWorker::new(client, worker_config);
    let join = worker.spawn();
    handle.start().await?;

    if !once {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C; stopping"),
            Err(e) => warn!("failed to listen for Ctrl+C: {e}; stopping"),
        }
    }

    // STOP queues behind the START, so the sequence finishes first.
    handle.stop().await?;
    join.await.context("provisioning worker panicked")?;
    info!("auto-connect client stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::parse_from(["autoconnect-client"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_run_once_with_server_override() {
        let cli = Cli::parse_from([
            "autoconnect-client",
            "run",
            "--once",
            "--server",
            "10.0.0.5:6000",
        ]);

        match cli.command {
            Some(CliCommand::Run { once, server }) => {
                assert!(once);
                assert_eq!(server.as_deref(), Some("10.0.0.5:6000"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_set_server_takes_ip_and_port() {
        let cli = Cli::parse_from(["autoconnect-client", "set-server", "10.0.0.9", "51822"]);
        assert!(matches!(
            cli.command,
            Some(CliCommand::SetServer { ref ip, port: 51822 }) if ip == "10.0.0.9"
        ));
    }

    #[test]
    fn test_set_server_rejects_non_numeric_port() {
        let result = Cli::try_parse_from(["autoconnect-client", "set-server", "10.0.0.9", "abc"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli = Cli::parse_from(["autoconnect-client", "show-server", "--config", "/tmp/x.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
    }

    #[test]
    fn test_paths_place_server_record_beside_config() {
        let paths = Paths::resolve(Some(PathBuf::from("/etc/autoconnect/config.toml"))).unwrap();
        assert_eq!(paths.server_record(), PathBuf::from("/etc/autoconnect/ac.conf"));
    }

    #[test]
    fn test_bare_server_override_gets_default_port() {
        let paths = Paths::resolve(Some(PathBuf::from("/etc/autoconnect/config.toml"))).unwrap();
        let wc = worker_config(&AppConfig::default(), &paths, Some("10.0.0.5")).unwrap();
        assert_eq!(wc.server_override, Some(Address::new("10.0.0.5", 51822)));
    }
}
