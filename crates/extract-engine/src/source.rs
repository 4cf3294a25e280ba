//! The video frame source seam.
//!
//! Container demuxing and frame decoding are the application's concern; the
//! engine consumes decoded equirectangular frames through [`FrameSource`]
//! and opens sources through [`VideoBackend`].

use std::path::Path;

use image::RgbImage;
use panoframe_common::error::PanoframeResult;
use panoframe_telemetry::TelemetryProbe;

/// Sequential access to one video's decoded frames.
pub trait FrameSource: Send {
    /// Frames per second the stream was encoded at.
    fn fps(&self) -> f64;

    /// Total frame count, best effort; 0 when the container does not say.
    fn frame_count(&self) -> u64;

    /// Frame dimensions as (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Decode the next frame. `None` means end of stream; a decoder hiccup
    /// is treated the same way, not as an error.
    fn read(&mut self) -> Option<RgbImage>;
}

/// Opens videos and exposes their telemetry streams.
pub trait VideoBackend: Send + Sync {
    /// Open `path` for sequential decoding. Failure here is fatal for the
    /// job that needed the video, not for the queue.
    fn open(&self, path: &Path) -> PanoframeResult<Box<dyn FrameSource>>;

    /// Telemetry access for `path`, when the backend can demux metadata
    /// tracks. The default covers backends without that capability; the
    /// engine then falls back to a sidecar-only probe.
    fn telemetry_probe(&self, path: &Path) -> Option<Box<dyn TelemetryProbe>> {
        let _ = path;
        None
    }
}

/// Sidecar-only telemetry probe used when the video backend exposes no
/// metadata tracks. Looks for `<video_stem>.gpx` next to the source.
pub struct SidecarProbe {
    gpx_path: std::path::PathBuf,
    duration_secs: Option<f64>,
}

impl SidecarProbe {
    pub fn for_video(video: &Path, duration_secs: Option<f64>) -> Self {
        Self {
            gpx_path: video.with_extension("gpx"),
            duration_secs,
        }
    }
}

impl TelemetryProbe for SidecarProbe {
    fn sidecar_gpx(&self) -> Option<String> {
        std::fs::read_to_string(&self.gpx_path).ok()
    }

    fn gpmf_stream(&self) -> Option<Vec<u8>> {
        None
    }

    fn camm_stream(&self) -> Option<Vec<u8>> {
        None
    }

    fn subtitle_text(&self) -> Option<String> {
        None
    }

    fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_probe_reads_gpx_next_to_video() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("flight.mp4");
        std::fs::write(dir.path().join("flight.gpx"), "<gpx/>").unwrap();

        let probe = SidecarProbe::for_video(&video, Some(12.0));
        assert_eq!(probe.sidecar_gpx().as_deref(), Some("<gpx/>"));
        assert_eq!(probe.duration_secs(), Some(12.0));
    }

    #[test]
    fn test_sidecar_probe_missing_file() {
        let probe = SidecarProbe::for_video(Path::new("/nonexistent/clip.mp4"), None);
        assert!(probe.sidecar_gpx().is_none());
    }
}
