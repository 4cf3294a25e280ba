//! GPX sidecar track parsing.
//!
//! A lightweight extraction of `<trkpt>` elements: lat/lon attributes,
//! optional `<ele>`, and the RFC 3339 `<time>` child. Sample timestamps are
//! seconds relative to the first timed point, matching video time for a
//! sidecar recorded alongside the clip. Points without a `<time>` are
//! dropped because they cannot be placed on the video timeline.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset};
use regex::Regex;

use crate::track::{is_plausible_fix, GpsSample};

fn trkpt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?s)<trkpt[^>]*\blat\s*=\s*"(-?\d+\.?\d*)"[^>]*\blon\s*=\s*"(-?\d+\.?\d*)"[^>]*>(.*?)</trkpt>"#,
        )
        .unwrap()
    })
}

fn ele_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<ele>\s*(-?\d+\.?\d*)\s*</ele>").unwrap())
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<time>\s*([^<\s]+)\s*</time>").unwrap())
}

/// Parse GPX text into GPS samples with video-relative timestamps.
pub fn decode(content: &str) -> Vec<GpsSample> {
    let mut points: Vec<(DateTime<FixedOffset>, f64, f64, f64)> = Vec::new();
    let mut dropped = 0usize;

    for caps in trkpt_re().captures_iter(content) {
        let (Ok(lat), Ok(lon)) = (caps[1].parse::<f64>(), caps[2].parse::<f64>()) else {
            continue;
        };
        if !is_plausible_fix(lat, lon) {
            continue;
        }
        let body = &caps[3];

        let time = time_re()
            .captures(body)
            .and_then(|c| DateTime::parse_from_rfc3339(c.get(1)?.as_str()).ok());
        let Some(time) = time else {
            dropped += 1;
            continue;
        };

        let alt = ele_re()
            .captures(body)
            .and_then(|c| c[1].parse::<f64>().ok())
            .unwrap_or(0.0);

        points.push((time, lat, lon, alt));
    }

    if dropped > 0 {
        tracing::warn!(dropped, "GPX track points without <time> were dropped");
    }

    let Some(&(start, ..)) = points.first() else {
        return Vec::new();
    };

    points
        .into_iter()
        .map(|(time, lat, lon, alt)| GpsSample {
            timestamp: (time - start).num_milliseconds() as f64 / 1000.0,
            lat,
            lon,
            alt,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>flight</name>
    <trkseg>
      <trkpt lat="48.8566" lon="2.3522">
        <ele>35.0</ele>
        <time>2024-01-01T12:00:00Z</time>
      </trkpt>
      <trkpt lat="48.8570" lon="2.3530">
        <ele>36.5</ele>
        <time>2024-01-01T12:00:02.500Z</time>
      </trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn test_decode_track_points() {
        let samples = decode(GPX);
        assert_eq!(samples.len(), 2);

        assert_eq!(samples[0].timestamp, 0.0);
        assert!((samples[0].lat - 48.8566).abs() < 1e-9);
        assert!((samples[0].alt - 35.0).abs() < 1e-9);

        assert!((samples[1].timestamp - 2.5).abs() < 1e-9);
        assert!((samples[1].lon - 2.3530).abs() < 1e-9);
    }

    #[test]
    fn test_point_without_time_dropped() {
        let gpx = r#"<trkseg>
<trkpt lat="48.0" lon="2.0"><ele>1.0</ele></trkpt>
<trkpt lat="49.0" lon="3.0"><time>2024-01-01T00:00:00Z</time></trkpt>
</trkseg>"#;
        let samples = decode(gpx);
        assert_eq!(samples.len(), 1);
        assert!((samples[0].lat - 49.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_ele_defaults_to_zero() {
        let gpx = r#"<trkpt lat="48.0" lon="2.0"><time>2024-01-01T00:00:00Z</time></trkpt>"#;
        let samples = decode(gpx);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].alt, 0.0);
    }

    #[test]
    fn test_null_island_point_skipped() {
        let gpx = r#"<trkpt lat="0.0" lon="0.0"><time>2024-01-01T00:00:00Z</time></trkpt>"#;
        assert!(decode(gpx).is_empty());
    }

    #[test]
    fn test_timezone_offset_normalized() {
        let gpx = r#"<trkseg>
<trkpt lat="48.0" lon="2.0"><time>2024-01-01T12:00:00+02:00</time></trkpt>
<trkpt lat="48.1" lon="2.1"><time>2024-01-01T10:00:01Z</time></trkpt>
</trkseg>"#;
        let samples = decode(gpx);
        assert_eq!(samples.len(), 2);
        // +02:00 noon and 10:00:01 UTC are one second apart.
        assert!((samples[1].timestamp - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_not_gpx_at_all() {
        assert!(decode("{\"not\": \"xml\"}").is_empty());
    }
}
