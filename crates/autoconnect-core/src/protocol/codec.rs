//! Line-oriented codec for handshake messages.
//!
//! Wire format:
//! ```text
//! cmd:=HELLO\n
//! macaddr:=00-1A-2B-3C-4D-5E\n
//! vpnip:=0.0.0.0\n
//! vpnnetmask:=0.0.0.0\n
//! publickey:=<44-char base64 key>\n
//! epip:=192.168.1.20\n
//! epport:=51820\n
//! allowedips:=10.1.0.0/16,192.168.0.0/16\n
//! ```
//! No length prefix and no separators beyond each field's own newline.
//! Decoding validates line count and every key before touching a value.

use thiserror::Error;

use crate::protocol::command::Command;
use crate::protocol::field::{format_field, parse_field, TERMINATOR};
use crate::protocol::message::{HandshakeMessage, FIELD_COUNT, FIELD_KEYS};

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer than eight lines were available.
    #[error("too few lines: need {expected}, got {found}")]
    TooFewLines { expected: usize, found: usize },

    /// A line (1-based) has no `:=` separator.
    #[error("line {line} has no ':=' separator")]
    MissingSeparator { line: usize },

    /// A line (1-based) carries a different key than its position requires.
    #[error("line {line}: expected key '{expected}', found '{found}'")]
    UnexpectedKey {
        line: usize,
        expected: &'static str,
        found: String,
    },

    /// The buffer is not valid UTF-8.
    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    /// A value would break line framing if encoded.
    #[error("value for '{key}' contains a line break")]
    InvalidValue { key: &'static str },
}

impl CodecError {
    /// `true` when more bytes could still complete the message.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, CodecError::TooFewLines { .. })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`HandshakeMessage`] into the exact bytes sent on the wire.
///
/// # Errors
///
/// Returns [`CodecError::InvalidValue`] if any value contains `\n` or `\r`.
///
/// # Examples
///
/// ```rust
/// use autoconnect_core::protocol::{decode_message, encode_message, Command, HandshakeMessage};
///
/// let mut msg = HandshakeMessage::new(Command::Hello);
/// msg.vpn_ip = "0.0.0.0".to_string();
/// let bytes = encode_message(&msg).unwrap();
/// assert!(bytes.starts_with(b"cmd:=HELLO\nmacaddr:=\nvpnip:=0.0.0.0\n"));
/// assert_eq!(decode_message(&bytes).unwrap(), msg);
/// ```
pub fn encode_message(msg: &HandshakeMessage) -> Result<Vec<u8>, CodecError> {
    let mut buf = String::with_capacity(256);
    for (key, value) in msg.fields() {
        if value.contains(['\n', '\r']) {
            return Err(CodecError::InvalidValue { key });
        }
        buf.push_str(&format_field(key, value));
    }
    Ok(buf.into_bytes())
}

/// Decodes one [`HandshakeMessage`] from `bytes`.
///
/// The first eight lines populate the fields positionally; anything after
/// them is ignored.  A single trailing newline is a terminator, not an
/// empty ninth line.
///
/// # Errors
///
/// Returns [`CodecError`] if the buffer is short, not UTF-8, or any line
/// is malformed or out of order.
pub fn decode_message(bytes: &[u8]) -> Result<HandshakeMessage, CodecError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
    // Peers that send a zero-filled fixed buffer leave NULs at the tail.
    let text = text.trim_end_matches('\0');
    let text = text.strip_suffix(TERMINATOR).unwrap_or(text);

    let lines: Vec<&str> = if text.is_empty() {
        Vec::new()
    } else {
        text.split(TERMINATOR).take(FIELD_COUNT).collect()
    };
    if lines.len() < FIELD_COUNT {
        return Err(CodecError::TooFewLines {
            expected: FIELD_COUNT,
            found: lines.len(),
        });
    }

    let mut msg = HandshakeMessage::new(Command::Hello);
    for (index, (line, expected)) in lines.iter().zip(FIELD_KEYS).enumerate() {
        let field = parse_field(line).ok_or(CodecError::MissingSeparator { line: index + 1 })?;
        if field.key != expected {
            return Err(CodecError::UnexpectedKey {
                line: index + 1,
                expected,
                found: field.key.to_string(),
            });
        }
        match msg.value_slot_mut(index) {
            Some(slot) => *slot = field.value.to_string(),
            None => msg.command = Command::from_name(field.value),
        }
    }
    Ok(msg)
}

/// Returns `true` once `bytes` holds eight newline-terminated lines.
///
/// A reader uses this to decide whether to keep reading before decoding.  An
/// unterminated eighth line is not complete: more of its value may still be
/// in flight.  A reader that hits end-of-stream decodes what it has, and
/// [`decode_message`] accepts a missing final newline there.
pub fn is_frame_complete(bytes: &[u8]) -> bool {
    bytes.iter().filter(|b| **b == b'\n').count() >= FIELD_COUNT
}

// ── Tests ─────────────────────────────────────────────────────────────────────
