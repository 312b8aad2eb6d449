/*!
 * Field-level wire encoding.
 *
 * Every field of an SDN frame except the checksum travels bit-complemented,
 * and multi-byte fields additionally travel least significant byte first.
 * Strings are complemented byte by byte without reordering.
 */
use crate::error::{DeviceError, Result};

/// Reverse byte order and complement every byte; its own inverse
pub fn transform(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().map(|b| !b).collect()
}

/// Complement a single byte field
pub fn invert(byte: u8) -> u8 {
    !byte
}

/// Decode an unsigned integer field (up to four bytes)
pub fn number(bytes: &[u8]) -> u32 {
    debug_assert!(bytes.len() <= 4);
    bytes
        .iter()
        .rev()
        .fold(0u32, |acc, b| (acc << 8) | u32::from(!b))
}

/// Decode an integer field where all-ones means "not set"
pub fn nillable(bytes: &[u8]) -> Option<u32> {
    let value = number(bytes);
    if u64::from(value) == max_value(bytes.len()) {
        None
    } else {
        Some(value)
    }
}

/// Encode an integer field `width` bytes wide
pub fn encode_number(value: u32, width: usize) -> Result<Vec<u8>> {
    let value = u64::from(value);
    if value > max_value(width) {
        return Err(DeviceError::invalid_value(format!(
            "{} does not fit in {} byte(s)",
            value, width
        )));
    }
    Ok((0..width)
        .map(|i| !(((value >> (8 * i)) & 0xff) as u8))
        .collect())
}

/// Encode an integer field where all-ones means "not set"; `None` becomes
/// that sentinel, so it is not accepted as a value
pub fn encode_nillable(value: Option<u32>, width: usize) -> Result<Vec<u8>> {
    match value {
        None => Ok(vec![0x00; width]),
        Some(value) if u64::from(value) == max_value(width) => Err(DeviceError::invalid_value(
            format!("{} is reserved for \"not set\" in {} byte(s)", value, width),
        )),
        Some(value) => encode_number(value, width),
    }
}

/// Decode a fixed-width text field, dropping NUL and whitespace padding
pub fn decode_string(bytes: &[u8]) -> String {
    let raw: Vec<u8> = bytes.iter().map(|b| !b).collect();
    String::from_utf8_lossy(&raw)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

/// Encode a text field truncated or space-padded to `width` bytes
pub fn encode_string(text: &str, width: usize) -> Vec<u8> {
    text.bytes()
        .chain(std::iter::repeat(b' '))
        .take(width)
        .map(|b| !b)
        .collect()
}

/// 16-bit additive checksum, high byte first
pub fn checksum(bytes: &[u8]) -> [u8; 2] {
    let sum = bytes
        .iter()
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)));
    sum.to_be_bytes()
}

/// Lower-case hex dump for trace logs
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn max_value(width: usize) -> u64 {
    (1u64 << (8 * width)) - 1
}
