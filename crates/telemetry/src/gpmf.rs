//! GPMF (GoPro metadata) stream decoder.
//!
//! GPMF is a nested KLV format: a 4-byte fourcc key, a 1-byte item type, a
//! 1-byte item size, a 2-byte big-endian repeat count, then `size * repeat`
//! payload bytes padded to 4-byte alignment. Type 0 marks a nested container.
//! We walk the tree tracking the most recent `SCAL` divisors and extract
//! `GPS5` fixes; an implausible key triggers a byte-wise resynchronization
//! scan so a corrupt region costs samples, not the whole track.

use byteorder::{BigEndian, ByteOrder};

use crate::track::{is_plausible_fix, GpsSample};

const KLV_HEADER_LEN: usize = 8;

/// GPS5 item: lat, lon, alt, 2D speed, 3D speed as scaled i32s.
const GPS5_ITEM_LEN: usize = 20;

/// GoPro cameras log GPS5 at 18 Hz; used when the clip duration is unknown.
const FALLBACK_RATE_HZ: f64 = 18.0;

/// Real device trees nest three or four containers deep. Anything past this
/// is a corrupt stream re-reading itself, so recursion stops here instead of
/// exhausting the stack.
const MAX_NESTING_DEPTH: u32 = 16;

/// Divisors applied when no SCAL record precedes a GPS5 payload. These are
/// the values every known firmware emits.
const DEFAULT_SCAL: [f64; 3] = [1e7, 1e7, 1e3];

/// Decode a raw GPMF stream into GPS samples.
///
/// GPS5 payloads carry no per-sample timing, so timestamps are spread
/// uniformly across `duration_secs` when known, or assigned at the nominal
/// sensor rate.
pub fn decode(raw: &[u8], duration_secs: Option<f64>) -> Vec<GpsSample> {
    let mut walker = Walker {
        fixes: Vec::new(),
        scal: DEFAULT_SCAL,
        resyncs: 0,
    };
    walker.walk(raw, 0);

    if walker.resyncs > 0 {
        tracing::warn!(
            resyncs = walker.resyncs,
            samples = walker.fixes.len(),
            "GPMF stream decoded with resyncs"
        );
    }

    assign_timestamps(walker.fixes, duration_secs)
}

struct Walker {
    fixes: Vec<(f64, f64, f64)>,
    scal: [f64; 3],
    resyncs: u32,
}

impl Walker {
    fn walk(&mut self, raw: &[u8], depth: u32) {
        let mut offset = 0usize;

        while offset + KLV_HEADER_LEN <= raw.len() {
            let key = [
                raw[offset],
                raw[offset + 1],
                raw[offset + 2],
                raw[offset + 3],
            ];
            let item_type = raw[offset + 4];
            let item_size = raw[offset + 5] as usize;
            let repeat = BigEndian::read_u16(&raw[offset + 6..]) as usize;

            let payload_len = item_size * repeat;
            let payload_start = offset + KLV_HEADER_LEN;
            let payload_end = payload_start + payload_len;

            if !plausible_key(&key) || payload_end > raw.len() {
                match self.resync(raw, offset + 1) {
                    Some(next) => {
                        tracing::debug!(offset, resync_to = next, "Implausible GPMF key");
                        self.resyncs += 1;
                        offset = next;
                        continue;
                    }
                    None => return,
                }
            }

            let payload = &raw[payload_start..payload_end];
            match &key {
                // Nested container: descend with the current scale context.
                _ if item_type == 0 && depth < MAX_NESTING_DEPTH => {
                    self.walk(payload, depth + 1)
                }
                _ if item_type == 0 => {
                    tracing::debug!(offset, depth, "GPMF nesting too deep, container skipped");
                    self.resyncs += 1;
                }
                b"SCAL" => self.read_scal(item_type, item_size, payload),
                b"GPS5" if item_size == GPS5_ITEM_LEN => self.read_gps5(payload),
                _ => {}
            }

            // Payloads are padded to 4-byte alignment.
            offset = payload_start + payload_len.div_ceil(4) * 4;
        }
    }

    fn read_scal(&mut self, item_type: u8, item_size: usize, payload: &[u8]) {
        let values: Vec<f64> = match (item_type, item_size) {
            (b'l', 4) => payload.chunks_exact(4).map(|c| BigEndian::read_i32(c) as f64).collect(),
            (b's', 2) => payload.chunks_exact(2).map(|c| BigEndian::read_i16(c) as f64).collect(),
            _ => return,
        };
        for (slot, value) in self.scal.iter_mut().zip(values) {
            if value != 0.0 {
                *slot = value;
            }
        }
    }

    fn read_gps5(&mut self, payload: &[u8]) {
        for item in payload.chunks_exact(GPS5_ITEM_LEN) {
            let lat = BigEndian::read_i32(&item[0..4]) as f64 / self.scal[0];
            let lon = BigEndian::read_i32(&item[4..8]) as f64 / self.scal[1];
            let alt = BigEndian::read_i32(&item[8..12]) as f64 / self.scal[2];
            if is_plausible_fix(lat, lon) {
                self.fixes.push((lat, lon, alt));
            }
        }
    }

    /// Scan forward for the next offset whose bytes look like a KLV header:
    /// a printable-ASCII key and a payload that fits in the buffer.
    fn resync(&self, raw: &[u8], from: usize) -> Option<usize> {
        let mut ptr = from;
        while ptr + KLV_HEADER_LEN <= raw.len() {
            if plausible_key(&raw[ptr..ptr + 4]) {
                let size = raw[ptr + 5] as usize;
                let repeat = BigEndian::read_u16(&raw[ptr + 6..]) as usize;
                if ptr + KLV_HEADER_LEN + size * repeat <= raw.len() {
                    return Some(ptr);
                }
            }
            ptr += 1;
        }
        None
    }
}

/// GPMF keys are four ASCII characters, uppercase letters and digits.
fn plausible_key(key: &[u8]) -> bool {
    key.len() == 4 && key.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

fn assign_timestamps(fixes: Vec<(f64, f64, f64)>, duration_secs: Option<f64>) -> Vec<GpsSample> {
    let count = fixes.len();
    let step = match duration_secs {
        Some(d) if d > 0.0 => d / count.max(1) as f64,
        _ => 1.0 / FALLBACK_RATE_HZ,
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
mod tests {
    use super::*;

    fn klv(key: &[u8; 4], item_type: u8, item_size: u8, repeat: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(key);
        out.push(item_type);
        out.push(item_size);
        out.extend_from_slice(&repeat.to_be_bytes());
        out.extend_from_slice(payload);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        out
    }

    fn gps5_item(lat: f64, lon: f64, alt: f64) -> Vec<u8> {
        let mut item = Vec::new();
        for value in [
            (lat * 1e7) as i32,
            (lon * 1e7) as i32,
            (alt * 1e3) as i32,
            0,
            0,
        ] {
            item.extend_from_slice(&value.to_be_bytes());
        }
        item
    }

    fn scal_record() -> Vec<u8> {
        let mut payload = Vec::new();
        for divisor in [10_000_000i32, 10_000_000, 1_000, 1_000, 100] {
            payload.extend_from_slice(&divisor.to_be_bytes());
        }
        klv(b"SCAL", b'l', 4, 5, &payload)
    }

    fn gps_stream(points: &[(f64, f64, f64)]) -> Vec<u8> {
        let mut items = Vec::new();
        for &(lat, lon, alt) in points {
            items.extend_from_slice(&gps5_item(lat, lon, alt));
        }
        let mut strm = scal_record();
        strm.extend_from_slice(&klv(b"GPS5", b'l', 20, points.len() as u16, &items));
        klv(b"STRM", 0, 1, strm.len() as u16, &strm)
    }

    #[test]
    fn test_decode_nested_gps5_with_scal() {
        let raw = gps_stream(&[(48.8566, 2.3522, 35.0), (48.8570, 2.3530, 36.5)]);
        let samples = decode(&raw, Some(2.0));
        assert_eq!(samples.len(), 2);
        assert!((samples[0].lat - 48.8566).abs() < 1e-6);
        assert!((samples[0].lon - 2.3522).abs() < 1e-6);
        assert!((samples[0].alt - 35.0).abs() < 1e-3);
        assert_eq!(samples[1].timestamp, 1.0);
    }

    #[test]
    fn test_default_scal_when_missing() {
        let items = gps5_item(10.0, 20.0, 100.0);
        let raw = klv(b"GPS5", b'l', 20, 1, &items);
        let samples = decode(&raw, Some(1.0));
        assert_eq!(samples.len(), 1);
        assert!((samples[0].lat - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut raw = gps_stream(&[(48.0, 2.0, 10.0)]);
        raw.extend_from_slice(&[0x01, 0xff, 0x02]);
        raw.extend_from_slice(&gps_stream(&[(49.0, 3.0, 20.0)]));

        let samples = decode(&raw, Some(2.0));
        assert_eq!(samples.len(), 2);
        assert!((samples[1].lat - 49.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_keys_are_skipped() {
        let mut raw = klv(b"DVNM", b'c', 1, 6, b"Hero11");
        raw.extend_from_slice(&gps_stream(&[(48.0, 2.0, 0.0)]));
        let samples = decode(&raw, Some(1.0));
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_null_island_discarded() {
        let raw = gps_stream(&[(0.0, 0.0, 0.0), (48.0, 2.0, 0.0)]);
        assert_eq!(decode(&raw, Some(1.0)).len(), 1);
    }

    #[test]
    fn test_oversized_payload_triggers_partial_result() {
        let mut raw = gps_stream(&[(48.0, 2.0, 0.0)]);
        // Header claiming more payload than the buffer holds.
        raw.extend_from_slice(b"GPS5");
        raw.extend_from_slice(&[b'l', 20, 0xff, 0xff]);
        assert_eq!(decode(&raw, Some(1.0)).len(), 1);
    }

    #[test]
    fn test_fallback_rate_without_duration() {
        let raw = gps_stream(&[(48.0, 2.0, 0.0), (48.1, 2.1, 0.0)]);
        let samples = decode(&raw, None);
        assert!((samples[1].timestamp - 1.0 / 18.0).abs() < 1e-12);
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        // Thousands of nested type-0 containers must not blow the stack;
        // data past the pathological region is still recovered.
        let mut raw = Vec::new();
        for _ in 0..8_000 {
            raw = klv(b"STRM", 0, 1, raw.len() as u16, &raw);
        }
        raw.extend_from_slice(&gps_stream(&[(48.0, 2.0, 10.0)]));

        let samples = decode(&raw, Some(1.0));
        assert_eq!(samples.len(), 1);
        assert!((samples[0].lat - 48.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_stream() {
        assert!(decode(&[], Some(10.0)).is_empty());
    }
}
