//! In-memory test doubles for the engine's trait seams.
//!
//! Used by this crate's own tests and available to applications that want to
//! exercise job logic without a real video decoder on the machine.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use image::{GrayImage, Rgb, RgbImage};
use panoframe_common::error::{PanoframeError, PanoframeResult};
use panoframe_job_model::OutputFormat;
use panoframe_telemetry::{GpsExifTags, GpsSample, TelemetrySource, TelemetryTrack};

use crate::sink::OutputSink;
use crate::source::{FrameSource, VideoBackend};

/// Frame source producing procedurally generated equirectangular frames.
///
/// Each frame carries a gradient shifted by the frame index so consecutive
/// frames differ; [`static_frames`](Self::static_frames) switches that off
/// for motion-gate tests.
pub struct SyntheticSource {
    frames: u64,
    fps: f64,
    width: u32,
    height: u32,
    next: u64,
    is_static: bool,
}

impl SyntheticSource {
    pub fn new(frames: u64, fps: f64, width: u32, height: u32) -> Self {
        Self {
            frames,
            fps,
            width,
            height,
            next: 0,
            is_static: false,
        }
    }

    /// Make every frame identical to the first.
    pub fn static_frames(mut self) -> Self {
        self.is_static = true;
        self
    }
}

impl FrameSource for SyntheticSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.frames
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read(&mut self) -> Option<RgbImage> {
        if self.next >= self.frames {
            return None;
        }
        let shift = if self.is_static { 0 } else { self.next as u32 * 7 };
        self.next += 1;

        Some(RgbImage::from_fn(self.width, self.height, move |x, y| {
            let r = ((x.wrapping_add(shift)) % 256) as u8;
            let g = (y % 256) as u8;
            let b = ((x ^ y) % 256) as u8;
            Rgb([r, g, b])
        }))
    }
}

/// Backend serving synthetic sources for any path.
pub struct SyntheticBackend {
    pub frames: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Paths the backend refuses to open, for fatal-error tests.
    pub fail_on: Vec<std::path::PathBuf>,
}

impl SyntheticBackend {
    pub fn new(frames: u64, fps: f64, width: u32, height: u32) -> Self {
        Self {
            frames,
            fps,
            width,
            height,
            fail_on: Vec::new(),
        }
    }
}

impl VideoBackend for SyntheticBackend {
    fn open(&self, path: &Path) -> PanoframeResult<Box<dyn FrameSource>> {
        if self.fail_on.iter().any(|p| p == path) {
            return Err(PanoframeError::extraction(format!(
                "Cannot open video {path:?}"
            )));
        }
        Ok(Box::new(SyntheticSource::new(
            self.frames,
            self.fps,
            self.width,
            self.height,
        )))
    }
}

/// Sink counting writes without touching the filesystem.
#[derive(Debug, Default)]
pub struct CountingSink {
    images: AtomicU64,
    masks: AtomicU64,
    geotags: AtomicU64,
    names: std::sync::Mutex<Vec<String>>,
}

impl CountingSink {
    pub fn images(&self) -> u64 {
        self.images.load(Ordering::SeqCst)
    }

    pub fn masks(&self) -> u64 {
        self.masks.load(Ordering::SeqCst)
    }

    pub fn geotags(&self) -> u64 {
        self.geotags.load(Ordering::SeqCst)
    }

    /// File names of written images, in write order.
    pub fn image_names(&self) -> Vec<String> {
        self.names.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

impl OutputSink for CountingSink {
    fn write_image(
        &self,
        path: &Path,
        _image: &RgbImage,
        _format: &OutputFormat,
    ) -> PanoframeResult<()> {
        self.images.fetch_add(1, Ordering::SeqCst);
        if let (Ok(mut names), Some(name)) = (self.names.lock(), path.file_name()) {
            names.push(name.to_string_lossy().into_owned());
        }
        Ok(())
    }

    fn write_mask(&self, _path: &Path, _mask: &GrayImage) -> PanoframeResult<()> {
        self.masks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn embed_gps(&self, _image_path: &Path, _tags: &GpsExifTags) -> PanoframeResult<()> {
        self.geotags.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A one-sample telemetry track at time 0.
pub fn track_with_fix(lat: f64, lon: f64, alt: f64) -> TelemetryTrack {
    TelemetryTrack::from_samples(
        vec![GpsSample {
            timestamp: 0.0,
            lat,
            lon,
            alt,
        }],
        TelemetrySource::GpxSidecar,
    )
}
