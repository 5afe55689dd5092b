//! Geodetic positioning sentences.
//!
//! Renders an NMEA 0183 `$GPRMC` sentence from a decimal-degree position and
//! a resolved timestamp. Field order:
//!
//! ```text
//! $GPRMC,HHMMSS,A,DDMM.SS,N,DDDMM.SS,E,<speed>,<course>,DDMMYY,<var>,<var dir>*CS
//! ```
//!
//! The minute field is written as whole minutes, a dot, and whole seconds
//! (not decimal minutes). Receivers that read it as decimal minutes see a
//! slightly different position; existing consumers rely on this layout.

mod clock;

use chrono::{DateTime, FixedOffset};

pub use clock::{IsoDuration, SentenceClock, parse_timestamp};

/// Status flag for a valid fix.
pub const STATUS_VALID: &str = "A";

/// Inputs for one RMC sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    /// Latitude in decimal degrees, positive north.
    pub lat: f64,
    /// Longitude in decimal degrees, positive east.
    pub lon: f64,
    /// Status flag, normally [`STATUS_VALID`].
    pub status: String,
    /// Resolved time of the fix.
    pub timestamp: DateTime<FixedOffset>,
}

/// Which coordinate a value is, deciding width and hemisphere letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn degree_width(self) -> usize {
        match self {
            Axis::Latitude => 2,
            Axis::Longitude => 3,
        }
    }

    fn hemisphere(self, degrees: f64) -> char {
        match (self, degrees >= 0.0) {
            (Axis::Latitude, true) => 'N',
            (Axis::Latitude, false) => 'S',
            (Axis::Longitude, true) => 'E',
            (Axis::Longitude, false) => 'W',
        }
    }
}

/// Render a coordinate as `D..DMM.SS` plus hemisphere letter.
///
/// Each part is rounded to a whole number independently when formatted,
/// so sub-second precision is lost.
fn degrees_to_field(degrees: f64, axis: Axis) -> (String, char) {
    let total_seconds = degrees.abs() * 3600.0;
    let seconds = total_seconds.rem_euclid(60.0);
    let total_minutes = ((total_seconds - seconds) / 60.0).round();
    let minutes = total_minutes.rem_euclid(60.0);
    let whole_degrees = ((total_minutes - minutes) / 60.0).round();

    let field = format!(
        "{:0width$.0}{:02.0}.{:02.0}",
        whole_degrees,
        minutes,
        seconds,
        width = axis.degree_width()
    );
    (field, axis.hemisphere(degrees))
}

/// XOR of every byte between `$` and `*`.
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

/// Render the full `$GPRMC` sentence for a fix.
pub fn encode_rmc(fix: &Fix) -> String {
    let (lat, lat_dir) = degrees_to_field(fix.lat, Axis::Latitude);
    let (lon, lon_dir) = degrees_to_field(fix.lon, Axis::Longitude);
    let time = fix.timestamp.format("%H%M%S");
    let date = fix.timestamp.format("%d%m%y");

    // Speed, course and magnetic variation are left empty.
    let body = format!(
        "GPRMC,{time},{status},{lat},{lat_dir},{lon},{lon_dir},,,{date},,",
        status = fix.status
    );
    format!("${body}*{:02X}", checksum(&body))
}
