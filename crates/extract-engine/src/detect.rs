//! The person-detection seam.
//!
//! The engine never loads a model itself; it calls whatever [`Detector`] the
//! application wires in and degrades to passthrough when none is available
//! or a call fails.

use image::{GrayImage, RgbImage};
use panoframe_common::error::PanoframeResult;
use panoframe_job_model::AiMode;

/// Compute device a detector runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Cuda,
    Metal,
}

/// Reports which device a detector implementation would use.
pub trait DeviceProvider {
    fn device(&self) -> DeviceKind;
}

/// Result of one detector call.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorOutcome {
    /// No person above the confidence threshold; the view passes untouched.
    Clear,
    /// A person was detected; in skip-frame mode the view is dropped.
    PersonDetected,
    /// Segmentation mask: 0 = person, 255 = background. All-255 when
    /// nothing was detected.
    Mask(GrayImage),
}

/// One synchronous inference call per view. A slow detector slows
/// extraction linearly; that is accepted.
pub trait Detector: Send + Sync {
    fn infer(
        &self,
        image: &RgbImage,
        mode: AiMode,
        confidence: f64,
    ) -> PanoframeResult<DetectorOutcome>;

    fn device(&self) -> DeviceKind {
        DeviceKind::Cpu
    }
}

/// Detector that never detects anything. Stands in when no model is
/// configured so the pipeline code path stays uniform.
#[derive(Debug, Default)]
pub struct NullDetector;

impl Detector for NullDetector {
    fn infer(
        &self,
        image: &RgbImage,
        mode: AiMode,
        _confidence: f64,
    ) -> PanoframeResult<DetectorOutcome> {
        Ok(match mode {
            AiMode::GenerateMask => DetectorOutcome::Mask(GrayImage::from_pixel(
                image.width(),
                image.height(),
                image::Luma([255]),
            )),
            _ => DetectorOutcome::Clear,
        })
    }
}
