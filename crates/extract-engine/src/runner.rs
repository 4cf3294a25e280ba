//! The per-job extraction loop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use panoframe_common::error::{PanoframeError, PanoframeResult};
use panoframe_job_model::{AiMode, Job, NamingContext};
use panoframe_projection_core::map::build_reprojection_map;
use panoframe_projection_core::sample::{remap, sharpen, sharpness_score};
use panoframe_projection_core::{generate_views, BlurGate, MotionGate, ReprojectionMap, View};
use panoframe_telemetry::{GpsExifTags, TelemetryTrack};

use crate::detect::{Detector, DetectorOutcome};
use crate::sink::OutputSink;
use crate::source::FrameSource;

/// Lifecycle of one extraction job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Job created but not started.
    Idle,
    /// Extraction loop in progress.
    Running,
    /// Source exhausted, all outputs written.
    Completed,
    /// Stopped by the cancel flag; already-written outputs are kept.
    Cancelled,
    /// Aborted by a fatal per-job error.
    Failed,
}

/// One progress report, emitted per considered source frame.
#[derive(Debug, Clone)]
pub struct JobProgress {
    /// Percent of the source consumed, 0-100.
    pub percent: f64,
    /// Human-readable status line including the ETA.
    pub status: String,
}

/// Counters summarizing a finished (or cancelled) job.
#[derive(Debug, Clone, Default)]
pub struct JobReport {
    pub frames_considered: u64,
    pub frames_motion_skipped: u64,
    pub views_blur_rejected: u64,
    pub views_ai_skipped: u64,
    pub images_written: u64,
}

/// Runs one job's extraction loop against a frame source.
///
/// All state lives for the duration of [`run`](Self::run) and is discarded
/// afterwards; the pipeline itself holds only the collaborators and the
/// cancel flag.
pub struct ExtractionPipeline {
    sink: Arc<dyn OutputSink>,
    detector: Option<Arc<dyn Detector>>,
    cancel: Arc<AtomicBool>,
    state: JobState,
}

impl ExtractionPipeline {
    pub fn new(sink: Arc<dyn OutputSink>, detector: Option<Arc<dyn Detector>>) -> Self {
        Self {
            sink,
            detector,
            cancel: Arc::new(AtomicBool::new(false)),
            state: JobState::Idle,
        }
    }

    /// Share the cancel flag with a controller. Setting it stops the job
    /// after the frame currently being processed.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Use an externally owned cancel flag instead of the pipeline's own.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Execute `job` to completion, cancellation, or fatal error.
    ///
    /// Telemetry is optional; `progress` is called once per considered frame
    /// in processing order. Only fatal per-job errors (output directory
    /// creation here, video open at the caller) surface as `Err`.
    pub fn run(
        &mut self,
        job: &Job,
        source: &mut dyn FrameSource,
        telemetry: Option<&TelemetryTrack>,
        progress: &mut dyn FnMut(JobProgress),
    ) -> PanoframeResult<JobReport> {
        self.state = JobState::Running;

        let output_dir = job.resolved_output_dir();
        if let Err(e) = std::fs::create_dir_all(&output_dir) {
            self.state = JobState::Failed;
            return Err(PanoframeError::output(format!(
                "Cannot create output directory {output_dir:?}: {e}"
            )));
        }

        let setup = match JobSetup::prepare(job, source) {
            Ok(setup) => setup,
            Err(e) => {
                self.state = JobState::Failed;
                return Err(e);
            }
        };

        tracing::info!(
            source = %job.source.display(),
            views = setup.active_views.len(),
            stride = setup.stride,
            total_frames = setup.total_frames,
            "Starting extraction"
        );

        let mut blur_gate = job
            .blur
            .enabled
            .then(|| BlurGate::new(job.blur.smart, job.blur.threshold));
        let mut motion_gate = job.motion.enabled.then(|| MotionGate::new(job.motion.threshold));

        let mut report = JobReport::default();
        let started = Instant::now();
        let mut frame_index: u64 = 0;

        while let Some(frame) = source.read() {
            let index = frame_index;
            frame_index += 1;
            if index % setup.stride != 0 {
                continue;
            }

            if self.cancel.load(Ordering::SeqCst) {
                tracing::info!(frame = index, "Extraction cancelled");
                self.state = JobState::Cancelled;
                return Ok(report);
            }

            report.frames_considered += 1;

            let skip = match &mut motion_gate {
                Some(gate) => !gate.should_extract(&frame),
                None => false,
            };
            if skip {
                report.frames_motion_skipped += 1;
            } else if let Err(e) =
                self.process_frame(job, &setup, &frame, index, telemetry, &mut blur_gate, &mut report)
            {
                self.state = JobState::Failed;
                return Err(e);
            }

            progress(make_progress(index, &setup, &report, started));
        }

        tracing::info!(
            images = report.images_written,
            motion_skipped = report.frames_motion_skipped,
            blur_rejected = report.views_blur_rejected,
            ai_skipped = report.views_ai_skipped,
            "Extraction completed"
        );
        self.state = JobState::Completed;
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn process_frame(
        &self,
        job: &Job,
        setup: &JobSetup,
        frame: &RgbImage,
        frame_index: u64,
        telemetry: Option<&TelemetryTrack>,
        blur_gate: &mut Option<BlurGate>,
        report: &mut JobReport,
    ) -> PanoframeResult<()> {
        let frame_time = frame_index as f64 / setup.fps;

        for (view, map) in setup.active_views.iter().zip(&setup.maps) {
            let mut image = remap(frame, map);

            if let Some(gate) = blur_gate {
                let score = sharpness_score(&image);
                let decision = gate.evaluate(score);
                if !decision.is_accepted() {
                    tracing::debug!(view = %view.name, score, "View rejected as blurry");
                    report.views_blur_rejected += 1;
                    continue;
                }
            }

            if job.sharpening.enabled {
                image = sharpen(&image, job.sharpening.strength);
            }

            let mask = match self.run_detector(job, &image) {
                Some(DetectorOutcome::PersonDetected) if job.ai_mode == AiMode::SkipFrame => {
                    tracing::debug!(view = %view.name, "View skipped: person detected");
                    report.views_ai_skipped += 1;
                    continue;
                }
                Some(DetectorOutcome::Mask(mask)) => Some(mask),
                _ => None,
            };

            let ctx = NamingContext {
                filename: &setup.stem,
                frame: frame_index,
                camera: &view.name,
                ext: job.output_format.extension(),
            };
            let image_name = job.naming.image_name(&ctx);
            let image_path = setup.output_dir.join(&image_name);

            self.sink
                .write_image(&image_path, &image, &job.output_format)?;
            report.images_written += 1;

            if let Some(mask) = mask {
                let mask_path = setup.output_dir.join(job.naming.mask_name(&ctx, &image_name));
                self.sink.write_mask(&mask_path, &mask)?;
            }

            if job.telemetry {
                if let Some(fix) = telemetry.and_then(|t| t.gps_at(frame_time)) {
                    let tags = GpsExifTags::from_fix(fix);
                    if let Err(e) = self.sink.embed_gps(&image_path, &tags) {
                        tracing::warn!(error = %e, path = %image_path.display(), "Geotag not written");
                    }
                }
            }
        }

        Ok(())
    }

    /// Invoke the detector when the job asks for it. Unavailable or failing
    /// detectors degrade to passthrough.
    fn run_detector(&self, job: &Job, image: &RgbImage) -> Option<DetectorOutcome> {
        if job.ai_mode == AiMode::None {
            return None;
        }
        let detector = self.detector.as_ref()?;
        match detector.infer(image, job.ai_mode, job.ai_confidence as f64) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "Detector call failed; passing view through");
                None
            }
        }
    }
}

struct JobSetup {
    output_dir: PathBuf,
    stem: String,
    fps: f64,
    total_frames: u64,
    stride: u64,
    active_views: Vec<View>,
    maps: Vec<ReprojectionMap>,
}

impl JobSetup {
    fn prepare(job: &Job, source: &dyn FrameSource) -> PanoframeResult<Self> {
        let views = generate_views(job.camera_count, job.pitch_offset_deg, job.layout)?;
        let active_views: Vec<View> = views
            .into_iter()
            .enumerate()
            .filter(|(i, _)| job.is_camera_active(*i))
            .map(|(_, v)| v)
            .collect();
        if active_views.is_empty() {
            return Err(PanoframeError::extraction(
                "Active camera subset selects no views",
            ));
        }

        let (src_w, src_h) = source.dimensions();
        // One map per active view, reused for every frame of the job.
        let maps = active_views
            .iter()
            .map(|v| {
                build_reprojection_map(
                    src_h,
                    src_w,
                    job.resolution,
                    job.resolution,
                    job.fov_deg,
                    v.yaw_deg,
                    v.pitch_deg,
                    v.roll_deg,
                )
            })
            .collect();

        let fps = if source.fps() > 0.0 { source.fps() } else { 30.0 };
        Ok(Self {
            output_dir: job.resolved_output_dir(),
            stem: job.source_stem(),
            fps,
            total_frames: source.frame_count().max(1),
            stride: job.interval.frame_stride(fps),
            active_views,
            maps,
        })
    }
}

fn make_progress(frame_index: u64, setup: &JobSetup, report: &JobReport, started: Instant) -> JobProgress {
    let percent = (100.0 * frame_index as f64 / setup.total_frames as f64).min(100.0);

    let eta = if frame_index > 0 {
        let elapsed = started.elapsed().as_secs_f64();
        let rate = frame_index as f64 / elapsed.max(1e-9);
        let remaining_secs = (setup.total_frames.saturating_sub(frame_index)) as f64 / rate;
        format!("ETA: {}m {}s", (remaining_secs / 60.0) as u64, (remaining_secs % 60.0) as u64)
    } else {
        "ETA: --m --s".to_string()
    };

    JobProgress {
        percent,
        status: format!(
            "Frame {frame_index}/{} · {} images · {eta}",
            setup.total_frames, report.images_written
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::NullDetector;
    use crate::testing::{CountingSink, SyntheticSource};
    use panoframe_job_model::{CameraLayout, Interval};

    fn test_job(dir: &std::path::Path) -> Job {
        let mut job = Job::new(dir.join("clip.mp4"));
        job.output_dir = Some(dir.to_path_buf());
        job.camera_count = 4;
        job.layout = CameraLayout::Ring;
        job.resolution = 32;
        job.interval = Interval::Frames(10.0);
        job
    }

    #[test]
    fn test_extracts_every_tenth_frame() {
        let dir = tempfile::tempdir().unwrap();
        let job = test_job(dir.path());
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = ExtractionPipeline::new(sink.clone(), None);
        let mut source = SyntheticSource::new(30, 30.0, 128, 64);

        let mut updates = Vec::new();
        let report = pipeline
            .run(&job, &mut source, None, &mut |p| updates.push(p))
            .unwrap();

        // Frames 0, 10, 20 × 4 ring views.
        assert_eq!(report.frames_considered, 3);
        assert_eq!(report.images_written, 12);
        assert_eq!(sink.images(), 12);
        assert_eq!(pipeline.state(), JobState::Completed);
        assert_eq!(updates.len(), 3);
    }

    #[test]
    fn test_first_progress_has_placeholder_eta() {
        let dir = tempfile::tempdir().unwrap();
        let job = test_job(dir.path());
        let mut pipeline = ExtractionPipeline::new(Arc::new(CountingSink::default()), None);
        let mut source = SyntheticSource::new(15, 30.0, 128, 64);

        let mut statuses = Vec::new();
        pipeline
            .run(&job, &mut source, None, &mut |p| statuses.push(p.status))
            .unwrap();
        assert!(statuses[0].contains("ETA: --m --s"));
        assert!(statuses.last().unwrap().contains("ETA: "));
    }

    #[test]
    fn test_cancel_before_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let job = test_job(dir.path());
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = ExtractionPipeline::new(sink.clone(), None);
        pipeline.cancel_flag().store(true, Ordering::SeqCst);

        let mut source = SyntheticSource::new(30, 30.0, 128, 64);
        let report = pipeline.run(&job, &mut source, None, &mut |_| {}).unwrap();

        assert_eq!(pipeline.state(), JobState::Cancelled);
        assert_eq!(report.images_written, 0);
        assert_eq!(sink.images(), 0);
    }

    #[test]
    fn test_active_subset_limits_views() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = test_job(dir.path());
        job.active_cameras = Some(vec![0, 2]);
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = ExtractionPipeline::new(sink.clone(), None);
        let mut source = SyntheticSource::new(10, 30.0, 128, 64);

        let report = pipeline.run(&job, &mut source, None, &mut |_| {}).unwrap();
        assert_eq!(report.images_written, 2);
    }

    #[test]
    fn test_empty_subset_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = test_job(dir.path());
        job.active_cameras = Some(vec![]);
        let mut pipeline = ExtractionPipeline::new(Arc::new(CountingSink::default()), None);
        let mut source = SyntheticSource::new(10, 30.0, 128, 64);

        assert!(pipeline.run(&job, &mut source, None, &mut |_| {}).is_err());
        assert_eq!(pipeline.state(), JobState::Failed);
    }

    #[test]
    fn test_mask_mode_writes_masks() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = test_job(dir.path());
        job.ai_mode = AiMode::GenerateMask;
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = ExtractionPipeline::new(sink.clone(), Some(Arc::new(NullDetector)));
        let mut source = SyntheticSource::new(10, 30.0, 128, 64);

        let report = pipeline.run(&job, &mut source, None, &mut |_| {}).unwrap();
        assert_eq!(report.images_written, 4);
        assert_eq!(sink.masks(), 4);
    }

    #[test]
    fn test_ai_mode_without_detector_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = test_job(dir.path());
        job.ai_mode = AiMode::SkipFrame;
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = ExtractionPipeline::new(sink.clone(), None);
        let mut source = SyntheticSource::new(10, 30.0, 128, 64);

        let report = pipeline.run(&job, &mut source, None, &mut |_| {}).unwrap();
        assert_eq!(report.images_written, 4);
        assert_eq!(report.views_ai_skipped, 0);
    }

    #[test]
    fn test_motion_gate_skips_static_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = test_job(dir.path());
        job.interval = Interval::Frames(1.0);
        job.motion.enabled = true;
        job.motion.threshold = 2.0;
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = ExtractionPipeline::new(sink.clone(), None);
        // Static source: every frame identical to the first.
        let mut source = SyntheticSource::new(5, 30.0, 128, 64).static_frames();

        let report = pipeline.run(&job, &mut source, None, &mut |_| {}).unwrap();
        assert_eq!(report.frames_considered, 5);
        assert_eq!(report.frames_motion_skipped, 4);
        assert_eq!(report.images_written, 4);
    }

    #[test]
    fn test_geotags_embedded_when_telemetry_present() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = test_job(dir.path());
        job.telemetry = true;
        let sink = Arc::new(CountingSink::default());
        let mut pipeline = ExtractionPipeline::new(sink.clone(), None);
        let mut source = SyntheticSource::new(10, 30.0, 128, 64);

        let track = crate::testing::track_with_fix(48.0, 2.0, 30.0);
        pipeline
            .run(&job, &mut source, Some(&track), &mut |_| {})
            .unwrap();
        assert_eq!(sink.geotags(), 4);
    }
}
