//! Protocol module containing the handshake message, its `key:=value` field
//! grammar, the command set, and the line-oriented codec.

pub mod codec;
pub mod command;
pub mod field;
pub mod message;

pub use codec::{decode_message, encode_message, is_frame_complete, CodecError};
pub use command::{extract_command, Command};
pub use message::*;
