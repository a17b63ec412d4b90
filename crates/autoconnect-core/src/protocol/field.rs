//! The `key:=value` line grammar shared by the encoder and the decoder.
//!
//! Every handshake field travels as one line:
//!
//! ```text
//! vpnip:=10.1.1.100\n
//! ^^^^^  ^^^^^^^^^^
//! key    value
//! ```
//!
//! Values are addressed by key name, never by byte offset, so a key of a
//! different length cannot silently shift the value.

/// Separator between a field's key and its value.
pub const SEPARATOR: &str = ":=";

/// Line terminator appended to every serialized field.
pub const TERMINATOR: char = '\n';

/// A borrowed view of one parsed `key:=value` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// Formats one field as it appears on the wire, including the trailing newline.
///
/// ```rust
/// use autoconnect_core::protocol::field::format_field;
///
/// assert_eq!(format_field("vpnip", "0.0.0.0"), "vpnip:=0.0.0.0\n");
/// ```
pub fn format_field(key: &str, value: &str) -> String {
    let mut line = String::with_capacity(key.len() + SEPARATOR.len() + value.len() + 1);
    line.push_str(key);
    line.push_str(SEPARATOR);
    line.push_str(value);
    line.push(TERMINATOR);
    line
}

/// Splits a single line at the first `:=`.
///
/// A trailing `\n` or `\r\n` is ignored.  Returns `None` when the line has
/// no separator.
pub fn parse_field(line: &str) -> Option<Field<'_>> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (key, value) = line.split_once(SEPARATOR)?;
    Some(Field { key, value })
}

/// Returns the value of `line` if its key is exactly `key`.
///
/// ```rust
/// use autoconnect_core::protocol::field::field_value;
///
/// assert_eq!(field_value("epport:=51820\n", "epport"), Some("51820"));
/// assert_eq!(field_value("epport:=51820\n", "epip"), None);
/// ```
pub fn field_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    parse_field(line).filter(|f| f.key == key).map(|f| f.value)
}
