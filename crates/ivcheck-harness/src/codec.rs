//! Hex wire codec for key and value echoes.
//!
//! The cache echoes keys and values in a fixed hex representation; this
//! module decodes and checks those echoes during verification and nothing
//! else. Checks return `bool` — a malformed echo is a mismatch, not an
//! error worth a distinct failure path.
//!
//! # Wire shapes
//!
//! - Key: 16 hex characters. The first 8 encode the owning rank as a
//!   little-endian u32, the last 8 encode the index the same way.
//! - Value: each payload byte as two lowercase hex digits, then zero
//!   nibbles out to the cache's fixed-size value buffer.

use std::fmt::Write as _;

use ivcheck_types::IvKey;

/// Encode a key into its 16-hex-character wire form.
#[must_use]
pub fn encode_key(key: IvKey) -> String {
    let mut out = String::with_capacity(16);
    for byte in key.rank.to_le_bytes().iter().chain(&key.index.to_le_bytes()) {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Check a received key echo against the key the action targeted.
///
/// Fails unless the echo is exactly 16 hex characters and **both** halves
/// decode to the expected rank and index. No partial-match tolerance.
#[must_use]
pub fn verify_key(expected: IvKey, received: &str) -> bool {
    let received = received.as_bytes();
    if received.len() != 16 {
        return false;
    }
    match (decode_u32_le(&received[..8]), decode_u32_le(&received[8..])) {
        (Some(rank), Some(index)) => rank == expected.rank && index == expected.index,
        _ => false,
    }
}

/// Encode a value string into its hex wire form (no padding).
#[must_use]
pub fn encode_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 2);
    for byte in value.bytes() {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Check a received value echo against the expected value string.
///
/// The echo must start with the expected value's hex encoding, and every
/// character after that prefix must be the literal digit `0`: the cache
/// stores values in a fixed-size buffer, so a non-zero tail means the
/// buffer carried leftover or corrupted bytes, not just a longer value.
/// Comparison is case-insensitive on the received side.
#[must_use]
pub fn verify_value(expected: &str, received: &str) -> bool {
    let received = received.to_lowercase();
    let received = received.as_bytes();
    let expected_hex = encode_value(expected);
    let prefix = expected_hex.as_bytes();

    if received.len() < prefix.len() {
        return false;
    }
    if &received[..prefix.len()] != prefix {
        return false;
    }
    received[prefix.len()..].iter().all(|&c| c == b'0')
}

/// Decode 8 hex characters as a little-endian u32.
fn decode_u32_le(hex: &[u8]) -> Option<u32> {
    debug_assert_eq!(hex.len(), 8);
    if !hex.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let mut bytes = [0_u8; 4];
    for (i, chunk) in hex.chunks_exact(2).enumerate() {
        let pair = std::str::from_utf8(chunk).ok()?;
        bytes[i] = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(u32::from_le_bytes(bytes))
}
