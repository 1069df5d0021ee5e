//! # FCB Command Encoder
//!
//! Encodes commands sent back to the vehicle through the ground-station radio.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::protocol::*;

/// Longest CLI text whose length (plus the newline) fits the u16 length field
pub const MAX_CLI_TEXT_LEN: usize = u16::MAX as usize - 1;

/// Command that cannot be represented on the wire
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("CLI text is {len} bytes, at most 65534 fit in one command")]
    TextTooLong { len: usize },
}

/// A command to be sent to the vehicle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Text typed into the FCB command line; a newline is appended on the wire
    CliText(String),

    /// Ask a radio to switch to another band
    RadioBandSwitch {
        /// Radio that should switch
        target_radio: u8,
        /// Band number (signed, as understood by the radio firmware)
        band: i8,
    },
}

/// Encode a command addressed to `destination`
///
/// # Wire Format
///
/// ```text
/// CLI:         [dest][len:u16 LE][text ...]['\n']     len = text bytes + 1
/// Band switch: [dest][3][1][target radio][band:i8]
/// ```
///
/// # Errors
///
/// Returns [`EncodeError::TextTooLong`] if CLI text exceeds [`MAX_CLI_TEXT_LEN`] bytes
///
/// # Examples
///
/// ```
/// use fcb_groundlink::fcb::encoder::{encode, Command};
///
/// let bytes = encode(5, &Command::CliText("ping".to_string())).unwrap();
/// assert_eq!(&bytes[..], &[5, 5, 0, b'p', b'i', b'n', b'g', b'\n']);
/// ```
pub fn encode(destination: u8, command: &Command) -> Result<Bytes, EncodeError> {
    match command {
        Command::CliText(text) => encode_cli(destination, text),
        Command::RadioBandSwitch { target_radio, band } => {
            Ok(encode_band_switch(destination, *target_radio, *band))
        }
    }
}

fn encode_cli(destination: u8, text: &str) -> Result<Bytes, EncodeError> {
    if text.len() > MAX_CLI_TEXT_LEN {
        return Err(EncodeError::TextTooLong { len: text.len() });
    }
    let body_len = text.len() + 1;
    let mut buf = BytesMut::with_capacity(3 + body_len);
    buf.put_u8(destination);
    buf.put_u16_le(body_len as u16);
    buf.put_slice(text.as_bytes());
    buf.put_u8(b'\n');
    Ok(buf.freeze())
}

fn encode_band_switch(destination: u8, target_radio: u8, band: i8) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(destination);
    buf.put_u8(RADIO_BAND_SWITCH_LENGTH);
    buf.put_u8(CMD_RADIO_BAND_SWITCH);
    buf.put_u8(target_radio);
    buf.put_i8(band);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_cli_ping() {
        let bytes = encode(5, &Command::CliText("ping".to_string())).unwrap();
        assert_eq!(&bytes[..], &[5, 5, 0, b'p', b'i', b'n', b'g', b'\n']);
    }

    #[test]
    fn test_encode_cli_empty_text() {
        let bytes = encode(1, &Command::CliText(String::new())).unwrap();
        assert_eq!(&bytes[..], &[1, 1, 0, b'\n']);
    }

    #[test]
    fn test_encode_cli_length_is_little_endian() {
        let text = "x".repeat(300);
        let bytes = encode(2, &Command::CliText(text)).unwrap();
        assert_eq!(bytes.len(), 3 + 301);
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 301);
        assert_eq!(bytes[bytes.len() - 1], b'\n');
    }

    #[test]
    fn test_encode_cli_utf8() {
        let bytes = encode(3, &Command::CliText("é".to_string())).unwrap();
        // "é" is two bytes in UTF-8
        assert_eq!(&bytes[..], &[3, 3, 0, 0xC3, 0xA9, b'\n']);
    }

    #[test]
    fn test_encode_band_switch() {
        let bytes = encode(
            4,
            &Command::RadioBandSwitch { target_radio: 2, band: -1 },
        )
        .unwrap();
        assert_eq!(&bytes[..], &[4, 3, 1, 2, 0xFF]);
    }

    #[test]
    fn test_encode_cli_longest_text_fills_length_field() {
        let text = "a".repeat(MAX_CLI_TEXT_LEN);
        let bytes = encode(1, &Command::CliText(text)).unwrap();
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), u16::MAX);
        assert_eq!(bytes.len(), 3 + u16::MAX as usize);
    }

    #[test]
    fn test_encode_cli_rejects_text_longer_than_length_field() {
        let text = "a".repeat(MAX_CLI_TEXT_LEN + 1);
        assert_eq!(
            encode(1, &Command::CliText(text)),
            Err(EncodeError::TextTooLong { len: 65_535 })
        );
    }
}
