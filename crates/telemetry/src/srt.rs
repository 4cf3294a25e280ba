//! Subtitle-encoded telemetry decoder.
//!
//! Drone footage (DJI in particular) often carries telemetry as an SRT
//! subtitle stream, one cue per frame with bracketed fields like
//! `[latitude: 48.8566] [longitude: 2.3522] [rel_alt: 12.400 abs_alt: 96.2]`.
//! Timestamps come from the cue's start timecode. Cues without coordinates
//! are skipped.

use std::sync::OnceLock;

use regex::Regex;

use crate::track::{is_plausible_fix, GpsSample};

fn timecode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->").unwrap()
    })
}

fn latitude_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[latitude\s*:\s*(-?\d+\.?\d*)\]").unwrap())
}

fn longitude_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[longitude\s*:\s*(-?\d+\.?\d*)\]").unwrap())
}

fn altitude_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Some firmwares write [altitude: x], others [rel_alt: x abs_alt: y].
    RE.get_or_init(|| Regex::new(r"\[(?:altitude|rel_alt)\s*:\s*(-?\d+\.?\d*)").unwrap())
}

/// Decode SRT subtitle text into GPS samples.
pub fn decode(text: &str) -> Vec<GpsSample> {
    let mut samples = Vec::new();

    // SRT files in the wild are frequently CRLF-terminated.
    let text = text.replace("\r\n", "\n");
    for cue in text.split("\n\n") {
        let Some(timestamp) = cue_start_secs(cue) else {
            continue;
        };
        let (Some(lat), Some(lon)) = (field(latitude_re(), cue), field(longitude_re(), cue))
        else {
            continue;
        };
        if !is_plausible_fix(lat, lon) {
            continue;
        }
        samples.push(GpsSample {
            timestamp,
            lat,
            lon,
            alt: field(altitude_re(), cue).unwrap_or(0.0),
        });
    }

    if !samples.is_empty() {
        tracing::debug!(samples = samples.len(), "Parsed subtitle telemetry");
    }
    samples
}

fn cue_start_secs(cue: &str) -> Option<f64> {
    let caps = timecode_re().captures(cue)?;
    let h: f64 = caps[1].parse().ok()?;
    let m: f64 = caps[2].parse().ok()?;
    let s: f64 = caps[3].parse().ok()?;
    let ms: f64 = caps[4].parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + s + ms / 1000.0)
}

fn field(re: &Regex, cue: &str) -> Option<f64> {
    re.captures(cue)?.get(1)?.as_str().parse().ok()
}
