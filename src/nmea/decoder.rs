//! # Position Decoder
//!
//! Turns one raw GGA sentence into a [`Fix`].

use chrono::{DateTime, Utc};
use tracing::trace;

use super::protocol::*;
use crate::error::{Result, SurveyError};
use crate::model::Fix;

/// Decode one line from the fix channel
///
/// Non-GGA sentences and malformed lines both yield `None`. Failures are
/// never escalated: another sentence arrives within about a second.
///
/// # Arguments
///
/// * `line` - Raw line from the NMEA port
/// * `observed_at` - Wall-clock time the line was received
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use signal_survey::nmea::decoder::decode_fix;
///
/// let line = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
/// let fix = decode_fix(line, Utc::now()).unwrap();
/// assert!((fix.latitude - 48.1173).abs() < 1e-9);
/// ```
pub fn decode_fix(line: &str, observed_at: DateTime<Utc>) -> Option<Fix> {
    let sentence = match Sentence::parse(line) {
        Ok(sentence) => sentence,
        Err(e) => {
            trace!("Skipping line: {}", e);
            return None;
        }
    };

    if sentence.kind != SENTENCE_GGA {
        return None;
    }

    match decode_gga(&sentence, observed_at) {
        Ok(fix) => Some(fix),
        Err(e) => {
            trace!("Skipping {}{} sentence: {}", sentence.talker, sentence.kind, e);
            None
        }
    }
}

/// Decode the position fields of a framed GGA sentence
///
/// # Errors
///
/// Returns `Decode` if:
/// - The sentence is too short
/// - The receiver reports no fix (quality `0` or empty coordinates)
/// - A coordinate, hemisphere or altitude field is malformed
pub fn decode_gga(sentence: &Sentence<'_>, observed_at: DateTime<Utc>) -> Result<Fix> {
    if sentence.fields.len() < GGA_MIN_FIELDS {
        return Err(SurveyError::Decode(format!(
            "GGA too short: {} fields",
            sentence.fields.len()
        )));
    }

    let quality = sentence.field(GGA_FIX_QUALITY).unwrap_or_default();
    if quality.is_empty() || quality == "0" {
        return Err(SurveyError::Decode("receiver has no fix".to_string()));
    }

    let latitude = coordinate(
        sentence.field(GGA_LATITUDE).unwrap_or_default(),
        sentence.field(GGA_LATITUDE_HEMISPHERE).unwrap_or_default(),
        ['N', 'S'],
    )?;
    let longitude = coordinate(
        sentence.field(GGA_LONGITUDE).unwrap_or_default(),
        sentence.field(GGA_LONGITUDE_HEMISPHERE).unwrap_or_default(),
        ['E', 'W'],
    )?;

    let altitude_field = sentence.field(GGA_ALTITUDE).unwrap_or_default();
    let altitude = altitude_field
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite())
        .ok_or_else(|| SurveyError::Decode(format!("invalid altitude '{}'", altitude_field)))?;

    Ok(Fix {
        latitude,
        longitude,
        altitude,
        observed_at,
    })
}

/// Decode one coordinate, checking the hemisphere belongs to its axis
fn coordinate(value: &str, hemisphere: &str, allowed: [char; 2]) -> Result<f64> {
    let mut chars = hemisphere.chars();
    let letter = match (chars.next(), chars.next()) {
        (Some(c), None) if allowed.contains(&c) => c,
        _ => {
            return Err(SurveyError::Decode(format!(
                "invalid hemisphere '{}'",
                hemisphere
            )))
        }
    };
    sexagesimal_to_decimal(value, letter)
}

/// Convert an NMEA `(d)ddmm.mmmm` value to signed decimal degrees
///
/// The minutes start two characters before the decimal point (clamped to the
/// start of the string); everything before them is degrees. The result is
/// negated for the southern and western hemispheres.
///
/// # Arguments
///
/// * `value` - Degrees and minutes, e.g. `4807.038`
/// * `hemisphere` - One of `N`, `S`, `E`, `W`
///
/// # Examples
///
/// ```
/// use signal_survey::nmea::decoder::sexagesimal_to_decimal;
///
/// let lat = sexagesimal_to_decimal("4807.038", 'N').unwrap();
/// assert!((lat - 48.1173).abs() < 1e-9);
/// ```
pub fn sexagesimal_to_decimal(value: &str, hemisphere: char) -> Result<f64> {
    if value.is_empty() || !value.is_ascii() {
        return Err(SurveyError::Decode(format!("invalid coordinate '{}'", value)));
    }

    let split = value.find('.').map_or(0, |dot| dot.saturating_sub(2));
    let (degrees, minutes) = value.split_at(split);

    let degrees = if degrees.is_empty() {
        0.0
    } else {
        parse_finite(degrees)?
    };
    let minutes = parse_finite(minutes)?;

    let decimal = degrees + minutes / 60.0;
    match hemisphere {
        'N' | 'E' => Ok(decimal),
        'S' | 'W' => Ok(-decimal),
        other => Err(SurveyError::Decode(format!("invalid hemisphere '{}'", other))),
    }
}

fn parse_finite(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SurveyError::Decode(format!("invalid number '{}'", text)))
}
