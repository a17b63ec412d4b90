//! The closed set of command names carried in a message's `cmd` field.

use std::fmt;

use tracing::warn;

use crate::protocol::codec::CodecError;
use crate::protocol::field::SEPARATOR;

/// A handshake command.
///
/// Names the provisioning server may send that are not in this set are kept
/// verbatim in [`Command::Unknown`] so processing can continue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Hello,
    Ping,
    Pong,
    Ok,
    Nok,
    Bye,
    Exist,
    SendVpnInformation,
    SendVpnInformationAgain,
    StartVpn,
    StartVpnAgain,
    Unknown(String),
}

impl Command {
    /// Returns the wire name of the command (e.g. `"HELLO"`).
    pub fn as_str(&self) -> &str {
        match self {
            Command::Hello => "HELLO",
            Command::Ping => "PING",
            Command::Pong => "PONG",
            Command::Ok => "OK",
            Command::Nok => "NOK",
            Command::Bye => "BYE",
            Command::Exist => "EXIST",
            Command::SendVpnInformation => "SEND_VPN_INFORMATION",
            Command::SendVpnInformationAgain => "SEND_VPN_INFORMATION_AGAIN",
            Command::StartVpn => "START_VPN",
            Command::StartVpnAgain => "START_VPN_AGAIN",
            Command::Unknown(name) => name,
        }
    }

    /// Classifies a wire name.  Never fails: unrecognised names become
    /// [`Command::Unknown`].
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "HELLO" => Command::Hello,
            "PING" => Command::Ping,
            "PONG" => Command::Pong,
            "OK" => Command::Ok,
            "NOK" => Command::Nok,
            "BYE" => Command::Bye,
            "EXIST" => Command::Exist,
            "SEND_VPN_INFORMATION" => Command::SendVpnInformation,
            "SEND_VPN_INFORMATION_AGAIN" => Command::SendVpnInformationAgain,
            "START_VPN" => Command::StartVpn,
            "START_VPN_AGAIN" => Command::StartVpnAgain,
            other => {
                warn!("unknown command name {other:?} received");
                Command::Unknown(other.to_string())
            }
        }
    }

    /// `true` for every variant except [`Command::Unknown`].
    pub fn is_known(&self) -> bool {
        !matches!(self, Command::Unknown(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Command {
    fn from(name: &str) -> Self {
        Command::from_name(name)
    }
}

/// Returns the command name carried by a raw `type` field line.
///
/// # Errors
///
/// Returns [`CodecError::MissingSeparator`] if the line has no `:=`.
///
/// # Examples
///
/// ```rust
/// use autoconnect_core::protocol::command::extract_command;
///
/// assert_eq!(extract_command("cmd:=HELLO\n").unwrap(), "HELLO");
/// ```
pub fn extract_command(type_field: &str) -> Result<&str, CodecError> {
    let line = type_field.trim_end_matches(['\n', '\r']);
    line.split(SEPARATOR)
        .nth(1)
        .map(str::trim)
        .ok_or(CodecError::MissingSeparator { line: 1 })
}
