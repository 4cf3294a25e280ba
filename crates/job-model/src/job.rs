//! Extraction job parameters.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Virtual camera layout over the sphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraLayout {
    /// Equidistant views along the horizon.
    Ring,
    /// Six cube faces: Front/Right/Back/Left at the horizon, Up/Down at the poles.
    Cube,
    /// Golden-section spiral over the whole sphere.
    Fibonacci,
    /// Ring below 6 cameras, cube at exactly 6, fibonacci above.
    #[default]
    Adaptive,
}

/// How frames containing the operator are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AiMode {
    /// Detector is never invoked.
    #[default]
    None,
    /// Drop the view entirely when a person is detected.
    SkipFrame,
    /// Write a binary mask alongside the image (0 = person, 255 = background).
    GenerateMask,
}

/// Output image format with its encoder parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "format")]
pub enum OutputFormat {
    Jpg { quality: u8 },
    Png,
    Tiff,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Jpg { quality: 95 }
    }
}

impl OutputFormat {
    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpg { .. } => ".jpg",
            Self::Png => ".png",
            Self::Tiff => ".tif",
        }
    }

    /// Parse a user-facing format string; unknown formats fall back to jpg.
    pub fn from_name(name: &str, jpeg_quality: u8) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "tiff" | "tif" => Self::Tiff,
            _ => Self::Jpg {
                quality: jpeg_quality,
            },
        }
    }
}

/// Unit for the frame sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "unit", content = "value")]
pub enum Interval {
    /// Every Nth source frame.
    Frames(f64),
    /// One extraction instant every N seconds of video time.
    Seconds(f64),
}

impl Default for Interval {
    fn default() -> Self {
        Self::Seconds(1.0)
    }
}

impl Interval {
    /// Resolve the interval to a whole frame stride for a clip at `fps`.
    /// Always at least 1.
    pub fn frame_stride(&self, fps: f64) -> u64 {
        let stride = match self {
            Self::Frames(v) => v.max(1.0),
            Self::Seconds(v) => (fps * v).round().max(1.0),
        };
        stride as u64
    }
}

/// Blur filtering configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlurFilter {
    pub enabled: bool,
    /// Adaptive mode: compare against a rolling history of accepted scores
    /// in addition to the floor threshold.
    pub smart: bool,
    /// Minimum acceptable sharpness score.
    pub threshold: f64,
}

impl Default for BlurFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            smart: false,
            threshold: 100.0,
        }
    }
}

/// Unsharp-mask sharpening configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sharpening {
    pub enabled: bool,
    /// Blend strength; output = image * (1 + strength) - blurred * strength.
    pub strength: f64,
}

impl Default for Sharpening {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 0.5,
        }
    }
}

/// Motion-redundancy filtering configuration (frame-level).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionFilter {
    pub enabled: bool,
    /// Frames whose motion score against the last extracted frame is at or
    /// below this threshold are skipped entirely.
    pub threshold: f64,
}

impl Default for MotionFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 2.0,
        }
    }
}

/// One video extraction job. Owned by the caller, read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Path to the source equirectangular video.
    pub source: PathBuf,

    /// Optional base output directory; defaults to the video's parent.
    pub output_dir: Option<PathBuf>,

    /// Number of virtual cameras (2-36). Cube layout always emits 6.
    pub camera_count: u32,

    /// Camera layout over the sphere.
    pub layout: CameraLayout,

    /// Horizontal field of view per view, degrees.
    pub fov_deg: f64,

    /// Vertical inclination offset, degrees (e.g. -20 for a high rig).
    pub pitch_offset_deg: f64,

    /// Output resolution (square views).
    pub resolution: u32,

    /// Indices into the generated view order; `None` means all views.
    pub active_cameras: Option<Vec<usize>>,

    /// Frame sampling interval.
    pub interval: Interval,

    /// Output image format and encoder parameters.
    pub output_format: OutputFormat,

    /// Operator detection mode.
    pub ai_mode: AiMode,

    /// Detector confidence threshold.
    pub ai_confidence: f32,

    /// Per-view blur rejection.
    pub blur: BlurFilter,

    /// Post-reprojection sharpening.
    pub sharpening: Sharpening,

    /// Frame-level motion redundancy rejection.
    pub motion: MotionFilter,

    /// Whether to recover a telemetry track and geotag outputs.
    pub telemetry: bool,

    /// Output file naming scheme.
    pub naming: crate::naming::NamingMode,
}

impl Job {
    /// Create a job with default processing options for a source video.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_dir: None,
            camera_count: 6,
            layout: CameraLayout::Adaptive,
            fov_deg: 90.0,
            pitch_offset_deg: 0.0,
            resolution: 2048,
            active_cameras: None,
            interval: Interval::default(),
            output_format: OutputFormat::default(),
            ai_mode: AiMode::None,
            ai_confidence: 0.25,
            blur: BlurFilter::default(),
            sharpening: Sharpening::default(),
            motion: MotionFilter::default(),
            telemetry: false,
            naming: crate::naming::NamingMode::default(),
        }
    }

    /// Source file name without its extension.
    pub fn source_stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string())
    }

    /// Directory the job's outputs go to: `<base>/<stem>_processed`, where
    /// base is the custom output dir when it is set and is a directory,
    /// otherwise the source video's parent.
    pub fn resolved_output_dir(&self) -> PathBuf {
        let base = match &self.output_dir {
            Some(dir) if dir.is_dir() => dir.clone(),
            _ => self
                .source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        base.join(format!("{}_processed", self.source_stem()))
    }

    /// Whether a view index is part of the active subset.
    pub fn is_camera_active(&self, index: usize) -> bool {
        match &self.active_cameras {
            Some(active) => active.contains(&index),
            None => true,
        }
    }
}
