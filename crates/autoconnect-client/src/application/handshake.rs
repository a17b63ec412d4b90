//! HandshakeClient: drives HELLO → PING against the provisioning server and
//! hands the resulting tunnel configuration to the store.
//!
//! # States
//!
//! ```text
//! Idle ──► Connecting ──► HelloSent ──► PingSent ──► Completed
//!   │          │              │             │
//!   └──────────┴──────────────┴─────────────┴──────► Failed
//! ```
//!
//! # Retry policy
//!
//! Two independent counters:
//!
//! - **connect**: `Session::open` is tried up to `connect_attempts` times with
//!   `retry_delay` between tries.  Running out ends the sequence with
//!   [`HandshakeError::ConnectExhausted`]; it does not consume a handshake
//!   attempt.
//! - **handshake**: once connected, any failure in the HELLO/PING exchange or
//!   in reading the replies restarts the whole exchange on a fresh session,
//!   up to `handshake_attempts` times in total.  Local failures (no key pair,
//!   store refused the configuration) are not retried.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use autoconnect_core::protocol::message::UNASSIGNED_ADDRESS;
use autoconnect_core::{
    Address, AssignedAddress, Command, DeriveError, HandshakeMessage, MacAddress,
    ProvisionedIdentity, TunnelKeys,
};
use thiserror::Error;
use tokio::time;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::infrastructure::network::{NetworkInfo, Session, SessionError, SessionTimeouts};
use crate::infrastructure::storage::config::AppConfig;
use crate::infrastructure::tunnel::{KeyError, KeyProvider, StoreError, TunnelConfigStore};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Parameters for one handshake sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub timeouts: SessionTimeouts,
    /// Total connect tries per handshake attempt (at least 1).
    pub connect_attempts: u32,
    /// Total HELLO/PING exchanges per sequence (at least 1).
    pub handshake_attempts: u32,
    /// Pause between connect tries and between handshake attempts.
    pub retry_delay: Duration,
    /// Local tunnel listen port; also sent as `epport`.
    pub listen_port: u16,
    /// Network always proposed in `allowedips`.
    pub base_allowed_ips: String,
    /// Name under which the tunnel configuration is stored.
    pub tunnel_name: String,
    /// Send BYE after a completed exchange.
    pub send_bye: bool,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        AppConfig::default().into()
    }
}

impl From<AppConfig> for HandshakeConfig {
    fn from(cfg: AppConfig) -> Self {
        Self::from(&cfg)
    }
}

impl From<&AppConfig> for HandshakeConfig {
    fn from(cfg: &AppConfig) -> Self {
        let h = &cfg.handshake;
        Self {
            timeouts: SessionTimeouts {
                connect: Duration::from_secs(h.connect_timeout_secs),
                io: Duration::from_secs(h.io_timeout_secs),
            },
            connect_attempts: h.connect_attempts.max(1),
            handshake_attempts: h.handshake_attempts.max(1),
            retry_delay: Duration::from_secs(h.retry_delay_secs),
            listen_port: cfg.tunnel.listen_port,
            base_allowed_ips: cfg.tunnel.base_allowed_ips.clone(),
            tunnel_name: cfg.tunnel.name.clone(),
            send_bye: h.send_bye,
        }
    }
}

// ── State and errors ──────────────────────────────────────────────────────────

/// Progress of the current (or last) handshake attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    Connecting,
    HelloSent,
    PingSent,
    Completed,
    Failed,
}

/// Why a handshake attempt or sequence failed.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Send or receive failed on an established session.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The server answered with NOK.
    #[error("server rejected {phase}")]
    Rejected { phase: &'static str },

    /// The server answered with a command that does not continue the exchange.
    #[error("unexpected {command} reply to {phase}")]
    UnexpectedReply {
        phase: &'static str,
        command: Command,
    },

    /// A reply lacked a field the tunnel configuration needs.
    #[error("incomplete reply: {0}")]
    Derive(#[from] DeriveError),

    #[error("local key pair unavailable: {0}")]
    Keys(#[from] KeyError),

    #[error("tunnel configuration store failed: {0}")]
    Store(#[from] StoreError),

    /// Every connect try failed.
    #[error("could not connect after {attempts} attempt(s): {last}")]
    ConnectExhausted {
        attempts: u32,
        #[source]
        last: SessionError,
    },

    /// Every handshake attempt failed with a retryable error.
    #[error("handshake failed after {attempts} attempt(s): {last}")]
    AttemptsExhausted {
        attempts: u32,
        #[source]
        last: Box<HandshakeError>,
    },
}

impl HandshakeError {
    /// `true` for failures that a fresh HELLO/PING exchange may cure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HandshakeError::Session(_)
                | HandshakeError::Rejected { .. }
                | HandshakeError::UnexpectedReply { .. }
                | HandshakeError::Derive(_)
        )
    }
}

// ── Local identity ────────────────────────────────────────────────────────────

/// The client-side fields repeated in every outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub hardware_address: Option<MacAddress>,
    pub ipv4: Option<Ipv4Addr>,
    pub public_key: String,
}

impl LocalIdentity {
    /// Looks up the hardware address and outbound IPv4.  Neither lookup is
    /// fatal; a missing value leaves its field empty.
    pub fn resolve(net: &dyn NetworkInfo, public_key: &str) -> Self {
        let hardware_address = net.hardware_address();
        let ipv4 = net.external_ipv4();
        if hardware_address.is_none() {
            warn!("no hardware address found; macaddr will be empty");
        }
        if ipv4.is_none() {
            warn!("no outbound IPv4 found; epip will be empty");
        }
        Self {
            hardware_address,
            ipv4,
            public_key: public_key.to_string(),
        }
    }

    /// Builds an outgoing message.
    ///
    /// `echo` supplies the VPN address and netmask from an earlier reply;
    /// without it both are sent as `0.0.0.0`.
    pub fn message(
        &self,
        command: Command,
        echo: Option<&HandshakeMessage>,
        config: &HandshakeConfig,
    ) -> HandshakeMessage {
        let mut msg = HandshakeMessage::new(command);
        msg.mac_address = self
            .hardware_address
            .map(|mac| mac.to_string())
            .unwrap_or_default();
        match echo {
            Some(reply) => {
                msg.vpn_ip = reply.vpn_ip.clone();
                msg.vpn_netmask = reply.vpn_netmask.clone();
            }
            None => {
                msg.vpn_ip = UNASSIGNED_ADDRESS.to_string();
                msg.vpn_netmask = UNASSIGNED_ADDRESS.to_string();
            }
        }
        msg.public_key = self.public_key.clone();
        msg.endpoint_ip = self.ipv4.map(|ip| ip.to_string()).unwrap_or_default();
        msg.endpoint_port = config.listen_port.to_string();
        msg.allowed_ips = proposed_allowed_ips(&config.base_allowed_ips, self.ipv4);
        msg
    }
}

/// `base` plus the /16 containing `local`, e.g. `10.1.0.0/16,192.168.0.0/16`.
pub fn proposed_allowed_ips(base: &str, local: Option<Ipv4Addr>) -> String {
    match local {
        Some(ip) => {
            let [a, b, _, _] = ip.octets();
            format!("{base},{a}.{b}.0.0/16")
        }
        None => base.to_string(),
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Runs handshake sequences.  One sequence at a time; `run` takes `&mut self`.
pub struct HandshakeClient {
    config: HandshakeConfig,
    net: Arc<dyn NetworkInfo>,
    keys: Arc<dyn KeyProvider>,
    store: Arc<dyn TunnelConfigStore>,
    state: HandshakeState,
}

impl HandshakeClient {
    pub fn new(
        config: HandshakeConfig,
        net: Arc<dyn NetworkInfo>,
        keys: Arc<dyn KeyProvider>,
        store: Arc<dyn TunnelConfigStore>,
    ) -> Self {
        Self {
            config,
            net,
            keys,
            store,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Runs one full sequence against `server`, retrying per the policy in
    /// the module docs, and stores the resulting tunnel configuration.
    ///
    /// # Errors
    ///
    /// Returns the non-retryable error that ended the sequence, or
    /// [`HandshakeError::AttemptsExhausted`] wrapping the last retryable one.
    pub async fn run(&mut self, server: &Address) -> Result<ProvisionedIdentity, HandshakeError> {
        let span = info_span!("handshake", sequence = %Uuid::new_v4(), %server);
        self.run_sequence(server).instrument(span).await
    }

    async fn run_sequence(
        &mut self,
        server: &Address,
    ) -> Result<ProvisionedIdentity, HandshakeError> {
        self.transition(HandshakeState::Idle);
        let keys = match self.keys.keys() {
            Ok(keys) => keys,
            Err(e) => {
                error!("cannot start handshake: {e}");
                self.transition(HandshakeState::Failed);
                return Err(e.into());
            }
        };

        let attempts = self.config.handshake_attempts.max(1);
        let mut attempt = 1;
        loop {
            info!("handshake attempt {attempt}/{attempts}");
            let err = match self.attempt(server, &keys).await {
                Ok(identity) => {
                    info!(
                        "provisioned {} with peer {}",
                        identity.address, identity.peer_endpoint
                    );
                    return Ok(identity);
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                error!("handshake failed: {err}");
                return Err(err);
            }
            if attempt >= attempts {
                error!("handshake failed after {attempts} attempt(s): {err}");
                return Err(HandshakeError::AttemptsExhausted {
                    attempts,
                    last: Box::new(err),
                });
            }
            warn!(
                "handshake attempt {attempt} failed: {err}; retrying in {:?}",
                self.config.retry_delay
            );
            time::sleep(self.config.retry_delay).await;
            attempt += 1;
        }
    }

    /// One attempt on a fresh session.  The session is closed before
    /// returning, whatever the outcome.
    async fn attempt(
        &mut self,
        server: &Address,
        keys: &TunnelKeys,
    ) -> Result<ProvisionedIdentity, HandshakeError> {
        self.transition(HandshakeState::Connecting);
        let mut session = match self.connect(server).await {
            Ok(session) => session,
            Err(e) => {
                self.transition(HandshakeState::Failed);
                return Err(e);
            }
        };

        let local = LocalIdentity::resolve(self.net.as_ref(), &keys.public_key);
        let result = self.provision(&mut session, &local, keys).await;

        if let Ok((_, ref reply)) = result {
            if self.config.send_bye {
                if let Err(e) = self.send_bye(&mut session, &local, reply).await {
                    warn!("BYE failed: {e}");
                }
            }
        }
        session.close().await;

        match result {
            Ok((identity, _)) => Ok(identity),
            Err(e) => {
                self.transition(HandshakeState::Failed);
                Err(e)
            }
        }
    }

    /// Opens a session, trying up to `connect_attempts` times.
    async fn connect(&self, server: &Address) -> Result<Session, HandshakeError> {
        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 1;
        loop {
            match Session::open(server, self.config.timeouts).await {
                Ok(session) => return Ok(session),
                Err(e) if attempt < attempts => {
                    warn!(
                        "connect attempt {attempt}/{attempts} failed: {e}; retrying in {:?}",
                        self.config.retry_delay
                    );
                    time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(HandshakeError::ConnectExhausted { attempts, last: e });
                }
            }
        }
    }

    /// HELLO, PING, derive, store.  Returns the identity and the PING reply.
    async fn provision(
        &mut self,
        session: &mut Session,
        local: &LocalIdentity,
        keys: &TunnelKeys,
    ) -> Result<(ProvisionedIdentity, HandshakeMessage), HandshakeError> {
        let hello = local.message(Command::Hello, None, &self.config);
        session.send(&hello).await?;
        info!(">>> HELLO sent");
        self.transition(HandshakeState::HelloSent);

        let hello_reply = receive_reply(session, "HELLO").await?;
        let address = AssignedAddress::from_reply(&hello_reply)?;
        info!("assigned VPN address {address}");

        let ping = local.message(Command::Ping, Some(&hello_reply), &self.config);
        session.send(&ping).await?;
        info!(">>> PING sent");
        self.transition(HandshakeState::PingSent);

        let ping_reply = receive_reply(session, "PING").await?;
        let identity =
            ProvisionedIdentity::derive(address, &ping_reply, keys, self.config.listen_port)?;

        self.store
            .store(&self.config.tunnel_name, &identity.to_tunnel_config())?;
        self.transition(HandshakeState::Completed);
        Ok((identity, ping_reply))
    }

    /// Tells the server this client is done, echoing the assigned address
    /// from `reply`.  Reads the server's answer but does not inspect it.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Session`] if the send or receive fails.
    pub async fn send_bye(
        &self,
        session: &mut Session,
        local: &LocalIdentity,
        reply: &HandshakeMessage,
    ) -> Result<(), HandshakeError> {
        let bye = local.message(Command::Bye, Some(reply), &self.config);
        session.send(&bye).await?;
        info!(">>> BYE sent");
        let answer = session.receive().await?;
        info!("<<< {} received", answer.command);
        Ok(())
    }

    fn transition(&mut self, next: HandshakeState) {
        if self.state != next {
            debug!("handshake state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

/// Reads one reply and checks that it lets the exchange continue.
async fn receive_reply(
    session: &mut Session,
    phase: &'static str,
) -> Result<HandshakeMessage, HandshakeError> {
    let reply = session.receive().await?;
    info!("<<< {} received for {phase}", reply.command);
    debug!(
        "reply fields: vpnip={:?} vpnnetmask={:?} epip={:?} epport={:?} allowedips={:?}",
        reply.vpn_ip, reply.vpn_netmask, reply.endpoint_ip, reply.endpoint_port, reply.allowed_ips
    );
    match reply.command {
        Command::Nok => Err(HandshakeError::Rejected { phase }),
        Command::Bye | Command::Unknown(_) => Err(HandshakeError::UnexpectedReply {
            phase,
            command: reply.command,
        }),
        _ => Ok(reply),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
