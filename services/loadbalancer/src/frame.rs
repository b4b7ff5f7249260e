//! Length-prefixed UTF-8 string framing.
//!
//! Peers (clients, backends) exchange a two-byte big-endian length
//! prefix followed by UTF-8 bytes. The load balancer itself never parses
//! this framing on the client/backend data path — it only pipes bytes —
//! but the health checker optionally writes one such frame as its probe
//! payload (§4.5 / §6 of the probe protocol), so the encoder lives here.

use std::io;

/// Encode `s` as a length-prefixed UTF-8 frame: a big-endian `u16` byte
/// length followed by the UTF-8 bytes themselves.
///
/// Returns an error if `s` is longer than `u16::MAX` bytes.
pub fn encode_utf_string(s: &str) -> io::Result<Vec<u8>> {
    let bytes = s.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "string too long for a u16-prefixed frame",
        ));
    }

    let mut frame = Vec::with_capacity(2 + bytes.len());
    frame.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    frame.extend_from_slice(bytes);
    Ok(frame)
}
