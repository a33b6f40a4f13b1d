//! # NMEA 0183 Checksum
//!
//! The checksum is the XOR of every byte between the leading `$` and the `*`,
//! written as two hexadecimal digits after the `*`.

/// Calculate the NMEA checksum of a sentence body
///
/// # Arguments
///
/// * `body` - Sentence bytes between `$` and `*` (exclusive)
///
/// # Returns
///
/// * `u8` - XOR of all bytes
pub fn nmea_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, &byte| acc ^ byte)
}

/// Parse the two hex digits following `*`
///
/// Returns `None` if the field is not exactly two hexadecimal digits.
pub fn parse_checksum_field(field: &str) -> Option<u8> {
    if field.len() != 2 {
        return None;
    }
    u8::from_str_radix(field, 16).ok()
}
