//! # NMEA Sentence Framing
//!
//! Splits a raw line into talker, sentence type and comma-separated fields,
//! verifying the optional checksum.

use super::checksum::{nmea_checksum, parse_checksum_field};
use crate::error::{Result, SurveyError};

/// Every sentence starts with this byte
pub const NMEA_START: char = '$';

/// Separates the sentence body from its checksum
pub const NMEA_CHECKSUM_DELIMITER: char = '*';

/// Global Positioning System Fix Data
pub const SENTENCE_GGA: &str = "GGA";

/// GGA field indexes (0 is the address field, e.g. `GPGGA`)
pub const GGA_LATITUDE: usize = 2;
pub const GGA_LATITUDE_HEMISPHERE: usize = 3;
pub const GGA_LONGITUDE: usize = 4;
pub const GGA_LONGITUDE_HEMISPHERE: usize = 5;
pub const GGA_FIX_QUALITY: usize = 6;
pub const GGA_ALTITUDE: usize = 9;

/// Minimum number of fields in a GGA sentence we can use (up to altitude)
pub const GGA_MIN_FIELDS: usize = GGA_ALTITUDE + 1;

/// A framed sentence with a verified checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence<'a> {
    /// Two-letter talker id (`GP`, `GN`, `GL`, ...)
    pub talker: &'a str,
    /// Three-letter sentence type (`GGA`, `RMC`, ...)
    pub kind: &'a str,
    /// All comma-separated fields, including the address field at index 0
    pub fields: Vec<&'a str>,
}

impl<'a> Sentence<'a> {
    /// Frame one line as an NMEA sentence
    ///
    /// # Arguments
    ///
    /// * `line` - Raw line without its terminator
    ///
    /// # Errors
    ///
    /// Returns `Decode` if:
    /// - The line does not start with `$`
    /// - The address field is not talker + sentence type
    /// - A checksum is present and does not match
    pub fn parse(line: &'a str) -> Result<Self> {
        let line = line.trim();
        let body = line
            .strip_prefix(NMEA_START)
            .ok_or_else(|| SurveyError::Decode("missing '$' start".to_string()))?;

        let body = match body.split_once(NMEA_CHECKSUM_DELIMITER) {
            Some((body, field)) => {
                let expected = parse_checksum_field(field).ok_or_else(|| {
                    SurveyError::Decode(format!("invalid checksum field '{}'", field))
                })?;
                let actual = nmea_checksum(body.as_bytes());
                if actual != expected {
                    return Err(SurveyError::Decode(format!(
                        "checksum mismatch: expected 0x{:02X}, got 0x{:02X}",
                        expected, actual
                    )));
                }
                body
            }
            None => body,
        };

        let fields: Vec<&str> = body.split(',').collect();
        let address = fields[0];
        if address.len() != 5 || !address.is_ascii() {
            return Err(SurveyError::Decode(format!(
                "invalid address field '{}'",
                address
            )));
        }

        Ok(Sentence {
            talker: &address[..2],
            kind: &address[2..],
            fields,
        })
    }

    /// Field at `index`, or `None` if the sentence is too short
    pub fn field(&self, index: usize) -> Option<&'a str> {
        self.fields.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference_sentence() {
        let sentence =
            Sentence::parse("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47")
                .unwrap();
        assert_eq!(sentence.talker, "GP");
        assert_eq!(sentence.kind, SENTENCE_GGA);
        assert_eq!(sentence.field(GGA_LATITUDE), Some("4807.038"));
        assert_eq!(sentence.field(GGA_ALTITUDE), Some("545.4"));
        assert_eq!(sentence.fields.len(), 15);
    }

    #[test]
    fn test_parse_without_checksum() {
        let sentence = Sentence::parse("$GNGGA,,,,,,0,,,,,,,,").unwrap();
        assert_eq!(sentence.talker, "GN");
        assert_eq!(sentence.kind, "GGA");
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let result =
            Sentence::parse("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*48");
        assert!(matches!(result, Err(SurveyError::Decode(_))));
    }

    #[test]
    fn test_parse_rejects_missing_start() {
        assert!(Sentence::parse("GPGGA,123519").is_err());
        assert!(Sentence::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_short_address() {
        assert!(Sentence::parse("$GGA,1,2,3").is_err());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let sentence = Sentence::parse("  $GPRMC,123519,A\r").unwrap();
        assert_eq!(sentence.kind, "RMC");
    }
}
