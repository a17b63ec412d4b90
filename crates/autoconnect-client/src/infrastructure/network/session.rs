//! One TCP connection to the provisioning server.
//!
//! A `Session` is opened per handshake attempt and closed when the attempt
//! ends, whatever the outcome.  It is never shared or reused.
//!
//! # Timeouts
//!
//! Every blocking call is bounded:
//!
//! - connect: [`SessionTimeouts::connect`] (3 s by default)
//! - write and read: [`SessionTimeouts::io`] (10 s by default)
//!
//! A read or write that hits its bound fails with [`SessionError::Timeout`],
//! which callers can tell apart from a reset ([`SessionError::Io`]), an
//! orderly close ([`SessionError::Closed`]), or a malformed reply
//! ([`SessionError::Codec`]).
//!
//! # Framing
//!
//! Requests and replies are small enough to fit in one packet, so a reply is
//! normally a single read of at most [`MAX_MESSAGE_SIZE`] bytes.  If the
//! server's write happens to arrive in pieces, reads continue until eight
//! newline-terminated lines are in, the server closes the connection, the
//! 1024-byte budget is used up, or the read deadline passes.  A reply whose
//! last line lacks its newline is only decoded once the server has closed.

use std::io;
use std::time::Duration;

use autoconnect_core::protocol::{
    decode_message, encode_message, is_frame_complete, message::MAX_MESSAGE_SIZE, CodecError,
    HandshakeMessage,
};
use autoconnect_core::Address;
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{self, Instant},
};
use tracing::{debug, info};

/// Errors that can occur on a provisioning session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The TCP connection could not be established (refused, unreachable,
    /// name resolution failure).
    #[error("failed to connect to provisioning server at {addr}: {source}")]
    ConnectFailed {
        addr: Address,
        #[source]
        source: io::Error,
    },
    /// The TCP connect did not complete within the connect timeout.
    #[error("connect to {addr} timed out after {after:?}")]
    ConnectTimeout { addr: Address, after: Duration },
    /// A read or write did not complete within the I/O timeout.
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
    /// The server closed the connection before sending a reply.
    #[error("connection closed by provisioning server")]
    Closed,
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
    /// A message could not be encoded or the reply could not be decoded.
    #[error("protocol error: {0}")]
    Codec(#[from] CodecError),
    /// The session has already been closed.
    #[error("session is not connected")]
    NotConnected,
}

impl SessionError {
    /// `true` for connect, read, and write deadline expiries.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SessionError::ConnectTimeout { .. } | SessionError::Timeout { .. }
        )
    }
}

/// Bounds applied to every blocking call on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub connect: Duration,
    pub io: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(3),
            io: Duration::from_secs(10),
        }
    }
}

/// A connected (or closed) TCP session with the provisioning server.
pub struct Session {
    stream: Option<TcpStream>,
    remote: Address,
    local: Option<Address>,
    timeouts: SessionTimeouts,
}

impl Session {
    /// Connects to `remote` within `timeouts.connect`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConnectFailed`] or
    /// [`SessionError::ConnectTimeout`].
    pub async fn open(remote: &Address, timeouts: SessionTimeouts) -> Result<Self, SessionError> {
        let target = (remote.host.as_str(), remote.port);
        let stream = match time::timeout(timeouts.connect, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(SessionError::ConnectFailed {
                    addr: remote.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(SessionError::ConnectTimeout {
                    addr: remote.clone(),
                    after: timeouts.connect,
                })
            }
        };

        // Requests are tiny; do not let Nagle hold them back.
        stream.set_nodelay(true)?;
        let local = stream.local_addr().ok().map(Address::from);
        let remote = stream
            .peer_addr()
            .map(Address::from)
            .unwrap_or_else(|_| remote.clone());
        info!(
            "connected to provisioning server {remote} from {}",
            local.as_ref().map_or_else(|| "?".to_string(), Address::to_string)
        );

        Ok(Self {
            stream: Some(stream),
            remote,
            local,
            timeouts,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn remote_addr(&self) -> &Address {
        &self.remote
    }

    pub fn local_addr(&self) -> Option<&Address> {
        self.local.as_ref()
    }

    /// Encodes and writes `msg`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] on encode failure, write failure, or timeout.
    /// A failed write leaves the session unusable; callers should close it.
    pub async fn send(&mut self, msg: &HandshakeMessage) -> Result<(), SessionError> {
        let bytes = encode_message(msg)?;
        let after = self.timeouts.io;
        let stream = self.stream.as_mut().ok_or(SessionError::NotConnected)?;

        match time::timeout(after, stream.write_all(&bytes)).await {
            Ok(Ok(())) => {
                debug!("wrote {} bytes ({})", bytes.len(), msg.command);
                Ok(())
            }
            Ok(Err(e)) => Err(SessionError::Io(e)),
            Err(_) => Err(SessionError::Timeout { op: "write", after }),
        }
    }

    /// Reads and decodes one reply.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] if no complete reply arrives within
    /// the I/O timeout, [`SessionError::Closed`] if the server hangs up first,
    /// and [`SessionError::Codec`] if the reply is malformed.
    pub async fn receive(&mut self) -> Result<HandshakeMessage, SessionError> {
        let after = self.timeouts.io;
        let deadline = Instant::now() + after;
        let stream = self.stream.as_mut().ok_or(SessionError::NotConnected)?;

        let mut buf = Vec::with_capacity(MAX_MESSAGE_SIZE);
        let mut chunk = [0u8; MAX_MESSAGE_SIZE];
        loop {
            let room = MAX_MESSAGE_SIZE - buf.len();
            let n = match time::timeout_at(deadline, stream.read(&mut chunk[..room])).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(SessionError::Io(e)),
                Err(_) => return Err(SessionError::Timeout { op: "read", after }),
            };

            if n == 0 {
                if buf.is_empty() {
                    return Err(SessionError::Closed);
                }
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if is_frame_complete(&buf) || buf.len() >= MAX_MESSAGE_SIZE {
                break;
            }
        }

        debug!("read {} bytes from {}", buf.len(), self.remote);
        Ok(decode_message(&buf)?)
    }

    /// Closes the connection.  Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("shutdown of session with {} failed: {e}", self.remote);
            }
            debug!("session with {} closed", self.remote);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
