//! The normalized telemetry track and time interpolation.

use serde::{Deserialize, Serialize};

/// One GPS fix on the track. Timestamps are seconds of video time,
/// non-decreasing within a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsSample {
    pub timestamp: f64,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// An interpolated position at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// Which decoder produced the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetrySource {
    GpxSidecar,
    Gpmf,
    Camm,
    Subtitles,
}

/// Access to a video's telemetry-bearing streams. Implemented by the caller
/// on top of whatever demuxer it uses; every accessor may be probed once
/// per extraction.
pub trait TelemetryProbe {
    /// Contents of a sidecar track file next to the video, if one exists.
    fn sidecar_gpx(&self) -> Option<String>;

    /// Raw bytes of an embedded GPMF data stream.
    fn gpmf_stream(&self) -> Option<Vec<u8>>;

    /// Raw bytes of an embedded CAMM data stream.
    fn camm_stream(&self) -> Option<Vec<u8>>;

    /// Decoded text of a subtitle stream that may carry telemetry.
    fn subtitle_text(&self) -> Option<String>;

    /// Clip duration in seconds, when the container reports one.
    fn duration_secs(&self) -> Option<f64>;
}

/// A time-ordered GPS sample sequence recovered from one source.
#[derive(Debug, Default)]
pub struct TelemetryTrack {
    samples: Vec<GpsSample>,
    source: Option<TelemetrySource>,
}

impl TelemetryTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a track from samples the caller decoded itself.
    pub fn from_samples(samples: Vec<GpsSample>, source: TelemetrySource) -> Self {
        let mut track = Self::default();
        track.adopt(samples, source);
        track
    }

    /// Locate and decode a GPS source for the video behind `probe`.
    ///
    /// Priority: sidecar file, then GPMF, then CAMM, then subtitle telemetry.
    /// Exactly one decoder populates the track. Returns whether any GPS
    /// samples were recovered; a fruitless probe is not an error.
    pub fn extract(&mut self, probe: &dyn TelemetryProbe) -> bool {
        let duration = probe.duration_secs();

        if let Some(content) = probe.sidecar_gpx() {
            let samples = crate::gpx::decode(&content);
            if !samples.is_empty() {
                tracing::info!(samples = samples.len(), "Loaded GPS track from GPX sidecar");
                return self.adopt(samples, TelemetrySource::GpxSidecar);
            }
        }

        if let Some(raw) = probe.gpmf_stream() {
            let samples = crate::gpmf::decode(&raw, duration);
            if !samples.is_empty() {
                tracing::info!(samples = samples.len(), "Decoded GPMF telemetry stream");
                return self.adopt(samples, TelemetrySource::Gpmf);
            }
            tracing::warn!("GPMF stream present but no GPS samples decoded");
        }

        if let Some(raw) = probe.camm_stream() {
            let samples = crate::camm::decode(&raw, duration);
            if !samples.is_empty() {
                tracing::info!(samples = samples.len(), "Decoded CAMM telemetry stream");
                return self.adopt(samples, TelemetrySource::Camm);
            }
            tracing::warn!("CAMM stream present but no GPS samples decoded");
        }

        if let Some(text) = probe.subtitle_text() {
            let samples = crate::srt::decode(&text);
            if !samples.is_empty() {
                tracing::info!(samples = samples.len(), "Decoded subtitle telemetry");
                return self.adopt(samples, TelemetrySource::Subtitles);
            }
        }

        tracing::info!("No telemetry source found");
        false
    }

    fn adopt(&mut self, mut samples: Vec<GpsSample>, source: TelemetrySource) -> bool {
        // Decoders emit in stream order; enforce the non-decreasing
        // timestamp invariant the interpolator relies on.
        samples.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        self.samples = samples;
        self.source = Some(source);
        true
    }

    pub fn has_gps(&self) -> bool {
        !self.samples.is_empty()
    }

    pub fn source(&self) -> Option<TelemetrySource> {
        self.source
    }

    pub fn samples(&self) -> &[GpsSample] {
        &self.samples
    }

    /// Position at video time `t` seconds.
    ///
    /// Times before the first sample clamp to it, times after the last clamp
    /// to it; otherwise lat/lon/alt are linearly interpolated between the
    /// bracketing samples.
    pub fn gps_at(&self, t: f64) -> Option<GpsFix> {
        let first = self.samples.first()?;
        if t <= first.timestamp {
            return Some(fix(first));
        }
        let last = self.samples.last()?;
        if t >= last.timestamp {
            return Some(fix(last));
        }

        // Index of the first sample with timestamp >= t; bounded by the
        // clamps above.
        let idx = self.samples.partition_point(|s| s.timestamp < t);
        let after = &self.samples[idx];
        let before = &self.samples[idx - 1];

        let span = after.timestamp - before.timestamp;
        if span <= 0.0 {
            return Some(fix(after));
        }

        let ratio = (t - before.timestamp) / span;
        Some(GpsFix {
            lat: before.lat + (after.lat - before.lat) * ratio,
            lon: before.lon + (after.lon - before.lon) * ratio,
            alt: before.alt + (after.alt - before.alt) * ratio,
        })
    }
}

fn fix(sample: &GpsSample) -> GpsFix {
    GpsFix {
        lat: sample.lat,
        lon: sample.lon,
        alt: sample.alt,
    }
}

/// Fixes where both latitude and longitude sit at ~0 are GPS no-fix noise
/// ("null island") and are discarded by every decoder.
pub(crate) fn is_plausible_fix(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
        && (lat.abs() > 1e-4 || lon.abs() > 1e-4)
}
