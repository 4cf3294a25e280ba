//! PanoFrame Extract Engine
//!
//! Orchestrates still-frame extraction from 360° video: interval gating,
//! the motion gate, per-view reprojection, the blur gate, sharpening, the
//! person-detection capability, output naming, and geotag embedding. Jobs
//! run strictly sequentially on a blocking worker; the caller observes
//! progress through an event channel and stops work through a shared
//! cancel flag.
//!
//! Video decoding, the detection model, and EXIF byte-level serialization
//! stay behind the [`VideoBackend`], [`Detector`], and [`OutputSink`] trait
//! seams.

pub mod detect;
pub mod queue;
pub mod runner;
pub mod sink;
pub mod source;
pub mod testing;

pub use detect::{Detector, DetectorOutcome, DeviceKind, DeviceProvider, NullDetector};
pub use queue::{JobQueue, JobResult, QueueEvent};
pub use runner::{ExtractionPipeline, JobProgress, JobReport, JobState};
pub use sink::{FsOutputSink, OutputSink};
pub use source::{FrameSource, SidecarProbe, VideoBackend};
