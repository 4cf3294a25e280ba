//! EXIF GPS tag representation.
//!
//! EXIF stores coordinates as degree/minute/second unsigned rationals with a
//! separate hemisphere reference, and altitude as a rational with an
//! above/below-sea-level flag. This module converts an interpolated
//! [`GpsFix`] into that form; actually writing the tags into an image file
//! is the output sink's job.

use crate::track::GpsFix;

/// An unsigned EXIF rational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

/// GPS EXIF tag values ready for embedding into image metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsExifTags {
    /// Latitude as degrees, minutes, seconds.
    pub latitude: [Rational; 3],
    /// `'N'` or `'S'`.
    pub latitude_ref: char,
    /// Longitude as degrees, minutes, seconds.
    pub longitude: [Rational; 3],
    /// `'E'` or `'W'`.
    pub longitude_ref: char,
    /// Altitude magnitude in meters.
    pub altitude: Rational,
    /// 0 = above sea level, 1 = below.
    pub altitude_ref: u8,
}

/// Seconds carry the sub-minute precision; one part per million keeps
/// centimeter-level accuracy.
const SECONDS_DEN: u32 = 1_000_000;

const ALTITUDE_DEN: u32 = 1_000;

impl GpsExifTags {
    pub fn from_fix(fix: GpsFix) -> Self {
        Self {
            latitude: to_dms(fix.lat),
            latitude_ref: if fix.lat < 0.0 { 'S' } else { 'N' },
            longitude: to_dms(fix.lon),
            longitude_ref: if fix.lon < 0.0 { 'W' } else { 'E' },
            altitude: Rational::new(
                (fix.alt.abs() * ALTITUDE_DEN as f64).round() as u32,
                ALTITUDE_DEN,
            ),
            altitude_ref: if fix.alt < 0.0 { 1 } else { 0 },
        }
    }
}

fn to_dms(degrees: f64) -> [Rational; 3] {
    let magnitude = degrees.abs();
    let d = magnitude.trunc();
    let minutes_total = (magnitude - d) * 60.0;
    let m = minutes_total.trunc();
    let s = (minutes_total - m) * 60.0;

    [
        Rational::new(d as u32, 1),
        Rational::new(m as u32, 1),
        Rational::new((s * SECONDS_DEN as f64).round() as u32, SECONDS_DEN),
    ]
}
