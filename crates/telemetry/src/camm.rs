//! CAMM (camera motion metadata) stream decoder.
//!
//! Little-endian records: a 4-byte header (2 reserved bytes that must be
//! zero, 2-byte packet type) followed by a fixed-size payload per type. Only
//! type 6 (GPS) is extracted; other known types are skipped by size. The
//! non-GPS size table is a reverse-engineered best effort — an unknown type
//! triggers a byte-wise resynchronization scan rather than an error, and a
//! truncated stream yields the samples decoded so far.

use byteorder::{ByteOrder, LittleEndian};

use crate::track::{is_plausible_fix, GpsSample};

const HEADER_LEN: usize = 4;

/// GPS payload: f64 lat, f64 lon, f32 alt.
const GPS_PAYLOAD_LEN: usize = 20;

/// Packet types we can skip over without desyncing.
const KNOWN_TYPES: [u16; 5] = [0, 1, 2, 3, 6];

fn payload_len(packet_type: u16) -> Option<usize> {
    match packet_type {
        6 => Some(GPS_PAYLOAD_LEN),
        // Gyro / accel: three f32 each.
        2 | 3 => Some(12),
        // Exposure/time record, size unverified for all vendors.
        1 => Some(8),
        0 => Some(0),
        _ => None,
    }
}

/// Sampling rate assumed when the clip duration is unknown. GPS in CAMM
/// streams is typically 5-10 Hz; timestamps assigned this way are an
/// approximation either way.
const FALLBACK_RATE_HZ: f64 = 5.0;

/// Decode a raw CAMM stream into GPS samples.
///
/// Samples carry no native timing, so timestamps are spread uniformly across
/// `duration_secs` when known, or assigned at a fixed fallback rate.
pub fn decode(raw: &[u8], duration_secs: Option<f64>) -> Vec<GpsSample> {
    let mut fixes: Vec<(f64, f64, f64)> = Vec::new();
    let mut offset = 0usize;
    let mut resyncs = 0u32;

    while offset + HEADER_LEN <= raw.len() {
        let reserved = LittleEndian::read_u16(&raw[offset..]);
        let packet_type = LittleEndian::read_u16(&raw[offset + 2..]);

        let payload = if reserved == 0 {
            payload_len(packet_type)
        } else {
            None
        };

        match payload {
            Some(len) => {
                let payload_start = offset + HEADER_LEN;
                if payload_start + len > raw.len() {
                    break;
                }
                if packet_type == 6 {
                    let lat = LittleEndian::read_f64(&raw[payload_start..]);
                    let lon = LittleEndian::read_f64(&raw[payload_start + 8..]);
                    let alt = LittleEndian::read_f32(&raw[payload_start + 16..]) as f64;
                    if is_plausible_fix(lat, lon) {
                        fixes.push((lat, lon, alt));
                    }
                }
                offset = payload_start + len;
            }
            None => {
                match resync(raw, offset + 1) {
                    Some(next) => {
                        tracing::debug!(
                            offset,
                            packet_type,
                            resync_to = next,
                            "Unknown CAMM record, resynchronized"
                        );
                        resyncs += 1;
                        offset = next;
                    }
                    // No plausible header ahead: return what we have.
                    None => break,
                }
            }
        }
    }

    if resyncs > 0 {
        tracing::warn!(resyncs, samples = fixes.len(), "CAMM stream decoded with resyncs");
    }

    assign_timestamps(fixes, duration_secs)
}

/// Scan forward byte-by-byte for the next plausible record header: reserved
/// field zero and a type from the known enumeration.
fn resync(raw: &[u8], from: usize) -> Option<usize> {
    let mut ptr = from;
    while ptr + HEADER_LEN <= raw.len() {
        if LittleEndian::read_u16(&raw[ptr..]) == 0 {
            let candidate = LittleEndian::read_u16(&raw[ptr + 2..]);
            if KNOWN_TYPES.contains(&candidate) {
                return Some(ptr);
            }
        }
        ptr += 1;
    }
    None
}

fn assign_timestamps(fixes: Vec<(f64, f64, f64)>, duration_secs: Option<f64>) -> Vec<GpsSample> {
    let count = fixes.len();
    let step = match duration_secs {
        Some(d) if d > 0.0 => d / count.max(1) as f64,
        _ => {
            if count > 0 {
                tracing::warn!(
                    "CAMM GPS found but clip duration unknown; assuming {FALLBACK_RATE_HZ} Hz"
                );
            }
            1.0 / FALLBACK_RATE_HZ
        }
    };

    fixes
        .into_iter()
        .enumerate()
        .map(|(i, (lat, lon, alt))| GpsSample {
            timestamp: i as f64 * step,
            lat,
            lon,
            alt,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests_support {
    /// A well-formed CAMM GPS record (type 6).
    pub fn gps_record(lat: f64, lon: f64, alt: f32) -> Vec<u8> {
        let mut record = vec![0u8, 0, 6, 0];
        record.extend_from_slice(&lat.to_le_bytes());
        record.extend_from_slice(&lon.to_le_bytes());
        record.extend_from_slice(&alt.to_le_bytes());
        record
    }
}
