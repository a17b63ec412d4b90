//! ProvisioningWorker: a single-slot, trigger-driven loop around
//! [`HandshakeClient`].
//!
//! The worker owns its trigger channel and configuration; nothing is global.
//! The surrounding application keeps a [`WorkerHandle`] and sends
//! [`WorkerSignal::Start`] to run one handshake sequence or
//! [`WorkerSignal::Stop`] to end the worker for good.
//!
//! The channel holds one pending signal.  A START sent while a sequence is
//! in flight waits for the worker to pick it up; STOP never interrupts a
//! running sequence.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use autoconnect_core::{Address, ServerInfo};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, warn};

use super::handshake::HandshakeClient;
use crate::infrastructure::storage::server_record::resolve_server;

/// Control signals, with the numeric codes used by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum WorkerSignal {
    /// Run one handshake sequence.
    Start = 100,
    /// Exit the worker permanently.
    Stop = 200,
}

impl WorkerSignal {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            100 => Some(WorkerSignal::Start),
            200 => Some(WorkerSignal::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    /// The worker has been stopped and accepts no more triggers.
    #[error("provisioning worker has been stopped")]
    Stopped,
}

/// Where the worker looks for the provisioning server on each START.
///
/// Precedence: `server_override`, then the record at `server_record`, then
/// `fallback_server`.
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub server_override: Option<Address>,
    pub server_record: Option<PathBuf>,
    pub fallback_server: ServerInfo,
}

impl WorkerConfig {
    pub fn resolve_server(&self) -> Address {
        if let Some(addr) = &self.server_override {
            return addr.clone();
        }
        match &self.server_record {
            Some(path) => resolve_server(path, &self.fallback_server).address(),
            None => self.fallback_server.address(),
        }
    }

    /// Runs [`WorkerConfig::resolve_server`] on the blocking pool.  Falls back
    /// to `fallback_server` if that task fails.
    pub async fn resolve_server_async(&self) -> Address {
        if let Some(addr) = &self.server_override {
            return addr.clone();
        }
        let config = self.clone();
        match task::spawn_blocking(move || config.resolve_server()).await {
            Ok(addr) => addr,
            Err(e) => {
                warn!("server record lookup did not finish: {e}");
                self.fallback_server.address()
            }
        }
    }
}

/// Sends triggers to a running [`ProvisioningWorker`].  Cheap to clone.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerSignal>,
    stopped: Arc<AtomicBool>,
}

impl WorkerHandle {
    /// Queues a START, waiting while the slot is occupied.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Stopped`] once STOP has been sent or the worker
    /// has exited.
    pub async fn start(&self) -> Result<(), WorkerError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WorkerError::Stopped);
        }
        self.tx
            .send(WorkerSignal::Start)
            .await
            .map_err(|_| WorkerError::Stopped)
    }

    /// Queues a STOP.  Calling it again, or after the worker exited, is a
    /// no-op.
    pub async fn stop(&self) -> Result<(), WorkerError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.tx.send(WorkerSignal::Stop).await.is_err() {
            info!("provisioning worker already exited");
        }
        Ok(())
    }

    /// Delivers `signal`.
    ///
    /// # Errors
    ///
    /// See [`WorkerHandle::start`].
    pub async fn send(&self, signal: WorkerSignal) -> Result<(), WorkerError> {
        match signal {
            WorkerSignal::Start => self.start().await,
            WorkerSignal::Stop => self.stop().await,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst) || self.tx.is_closed()
    }
}

/// The worker loop.  Create with [`ProvisioningWorker::new`] and drive with
/// [`ProvisioningWorker::run`] or [`ProvisioningWorker::spawn`].
pub struct ProvisioningWorker {
    client: HandshakeClient,
    config: WorkerConfig,
    rx: mpsc::Receiver<WorkerSignal>,
}

impl ProvisioningWorker {
    pub fn new(client: HandshakeClient, config: WorkerConfig) -> (Self, WorkerHandle) {
        let (tx, rx) = mpsc::channel(1);
        let handle = WorkerHandle {
            tx,
            stopped: Arc::new(AtomicBool::new(false)),
        };
        (Self { client, config, rx }, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Processes triggers until STOP arrives or every handle is dropped.
    pub async fn run(mut self) {
        info!("provisioning worker started");
        while let Some(signal) = self.rx.recv().await {
            match signal {
                WorkerSignal::Start => self.run_sequence().await,
                WorkerSignal::Stop => {
                    info!("STOP received");
                    self.rx.close();
                    break;
                }
            }
        }
        info!("provisioning worker exited");
    }

    async fn run_sequence(&mut self) {
        let server = self.config.resolve_server_async().await;
        info!("START received; provisioning from {server}");
        match self.client.run(&server).await {
            Ok(identity) => info!(
                "tunnel configured: address {} endpoint {}",
                identity.address, identity.peer_endpoint
            ),
            Err(e) if e.is_retryable() => warn!("provisioning did not complete: {e}"),
            Err(e) => error!("provisioning failed: {e}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handshake::HandshakeConfig;
    use crate::infrastructure::network::net_info::MockNetworkInfo;
    use crate::infrastructure::tunnel::{MemoryTunnelStore, StaticKeys};
    use autoconnect_core::TunnelKeys;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn idle_worker() -> (ProvisioningWorker, WorkerHandle) {
        let mut net = MockNetworkInfo::new();
        net.expect_hardware_address().returning(|| None);
        net.expect_external_ipv4().returning(|| None);
        let client = HandshakeClient::new(
            HandshakeConfig::default(),
            Arc::new(net),
            Arc::new(StaticKeys::new(TunnelKeys::new("", ""))),
            Arc::new(MemoryTunnelStore::new()),
        );
        ProvisioningWorker::new(client, WorkerConfig::default())
    }

    #[test]
    fn test_signal_codes() {
        assert_eq!(WorkerSignal::Start.code(), 100);
        assert_eq!(WorkerSignal::Stop.code(), 200);
        assert_eq!(WorkerSignal::from_code(200), Some(WorkerSignal::Stop));
        assert_eq!(WorkerSignal::from_code(7), None);
    }

    #[test]
    fn test_resolve_server_prefers_override_then_record_then_fallback() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("autoconnect_wrk_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let record = dir.join("ac.conf");
        std::fs::write(&record, "Server IP = 10.0.0.2\nServer Port = 7000\n").unwrap();

        let mut cfg = WorkerConfig {
            server_override: None,
            server_record: Some(dir.join("missing.conf")),
            fallback_server: ServerInfo::new("10.0.0.1", 6000),
        };

        // Act / Assert
        assert_eq!(cfg.resolve_server(), Address::new("10.0.0.1", 6000));
        cfg.server_record = Some(record);
        assert_eq!(cfg.resolve_server(), Address::new("10.0.0.2", 7000));
        cfg.server_override = Some(Address::new("10.0.0.3", 8000));
        assert_eq!(cfg.resolve_server(), Address::new("10.0.0.3", 8000));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_resolve_server_async_reads_record_off_the_runtime() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("autoconnect_wrk_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let record = dir.join("ac.conf");
        std::fs::write(&record, "Server IP = 10.0.0.4\nServer Port = 7100\n").unwrap();
        let cfg = WorkerConfig {
            server_override: None,
            server_record: Some(record),
            fallback_server: ServerInfo::new("10.0.0.1", 6000),
        };

        // Act
        let server = cfg.resolve_server_async().await;

        // Assert
        assert_eq!(server, Address::new("10.0.0.4", 7100));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_default_worker_config_uses_compiled_in_server() {
        assert_eq!(
            WorkerConfig::default().resolve_server(),
            Address::new("192.168.8.235", 51822)
        );
    }

    #[tokio::test]
    async fn test_stop_twice_is_ok_and_worker_exits() {
        let (worker, handle) = idle_worker();
        let join = worker.spawn();

        assert_ok!(handle.stop().await);
        assert_ok!(handle.stop().await);

        tokio::time::timeout(Duration::from_secs(1), join)
            .await
            .expect("worker should exit after STOP")
            .unwrap();
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_start_after_stop_is_rejected() {
        let (worker, handle) = idle_worker();
        let join = worker.spawn();

        handle.stop().await.unwrap();
        join.await.unwrap();

        assert_eq!(assert_err!(handle.start().await), WorkerError::Stopped);
        let other = handle.clone();
        assert_eq!(other.send(WorkerSignal::Start).await, Err(WorkerError::Stopped));
    }

    #[tokio::test]
    async fn test_dropping_every_handle_ends_worker() {
        let (worker, handle) = idle_worker();
        let join = worker.spawn();

        drop(handle);

        tokio::time::timeout(Duration::from_secs(1), join)
            .await
            .expect("worker should exit when its channel closes")
            .unwrap();
    }
}
