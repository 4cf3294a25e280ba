//! Sequential job queue.
//!
//! Jobs run strictly one at a time on a blocking worker so all per-job state
//! stays single-threaded; the caller observes progress and completion
//! through a bounded event channel and stops work through the shared cancel
//! flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use panoframe_job_model::Job;
use panoframe_telemetry::TelemetryTrack;
use tokio::sync::mpsc;

use crate::detect::Detector;
use crate::runner::{ExtractionPipeline, JobProgress, JobReport, JobState};
use crate::sink::OutputSink;
use crate::source::{SidecarProbe, VideoBackend};

/// Events emitted while the queue runs, in processing order.
#[derive(Debug)]
pub enum QueueEvent {
    JobStarted { index: usize },
    Progress { index: usize, progress: JobProgress },
    JobFinished { index: usize, result: JobResult },
}

/// Terminal outcome of one job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub index: usize,
    pub state: JobState,
    pub report: JobReport,
    /// Message for jobs that ended in [`JobState::Failed`].
    pub error: Option<String>,
}

/// Runs a batch of extraction jobs sequentially.
pub struct JobQueue {
    backend: Arc<dyn VideoBackend>,
    sink: Arc<dyn OutputSink>,
    detector: Option<Arc<dyn Detector>>,
    cancel: Arc<AtomicBool>,
}

impl JobQueue {
    pub fn new(
        backend: Arc<dyn VideoBackend>,
        sink: Arc<dyn OutputSink>,
        detector: Option<Arc<dyn Detector>>,
    ) -> Self {
        Self {
            backend,
            sink,
            detector,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared cancel flag. Setting it stops the running job after its
    /// current frame and skips the jobs not yet started.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Run all jobs on a blocking worker.
    ///
    /// Returns the worker handle, resolving to the per-job results, and the
    /// event stream. Dropping the receiver does not stop the queue; events
    /// are simply discarded.
    pub fn spawn(
        self,
        jobs: Vec<Job>,
    ) -> (
        tokio::task::JoinHandle<Vec<JobResult>>,
        mpsc::Receiver<QueueEvent>,
    ) {
        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::task::spawn_blocking(move || self.run_all(jobs, tx));
        (handle, rx)
    }

    fn run_all(&self, jobs: Vec<Job>, events: mpsc::Sender<QueueEvent>) -> Vec<JobResult> {
        let mut results = Vec::with_capacity(jobs.len());

        for (index, job) in jobs.into_iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::info!(index, "Queue cancelled; skipping remaining jobs");
                results.push(JobResult {
                    index,
                    state: JobState::Cancelled,
                    report: JobReport::default(),
                    error: None,
                });
                continue;
            }

            let _ = events.blocking_send(QueueEvent::JobStarted { index });
            let result = self.run_one(index, &job, &events);
            tracing::info!(index, state = ?result.state, "Job finished");
            let _ = events.blocking_send(QueueEvent::JobFinished {
                index,
                result: result.clone(),
            });
            results.push(result);
        }

        results
    }

    fn run_one(&self, index: usize, job: &Job, events: &mpsc::Sender<QueueEvent>) -> JobResult {
        let mut source = match self.backend.open(&job.source) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(index, error = %e, "Cannot open source video");
                return JobResult {
                    index,
                    state: JobState::Failed,
                    report: JobReport::default(),
                    error: Some(e.to_string()),
                };
            }
        };

        let telemetry = job.telemetry.then(|| {
            let duration = duration_secs(source.as_ref());
            let probe = self
                .backend
                .telemetry_probe(&job.source)
                .unwrap_or_else(|| Box::new(SidecarProbe::for_video(&job.source, duration)));
            let mut track = TelemetryTrack::new();
            track.extract(probe.as_ref());
            track
        });

        // The queue's flag doubles as the per-job flag.
        let mut pipeline = ExtractionPipeline::new(self.sink.clone(), self.detector.clone())
            .with_cancel_flag(self.cancel.clone());

        let mut progress = |p: JobProgress| {
            let _ = events.blocking_send(QueueEvent::Progress { index, progress: p });
        };

        match pipeline.run(job, source.as_mut(), telemetry.as_ref(), &mut progress) {
            Ok(report) => JobResult {
                index,
                state: pipeline.state(),
                report,
                error: None,
            },
            Err(e) => {
                tracing::error!(index, error = %e, "Job aborted");
                JobResult {
                    index,
                    state: JobState::Failed,
                    report: JobReport::default(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn duration_secs(source: &dyn crate::source::FrameSource) -> Option<f64> {
    let fps = source.fps();
    let frames = source.frame_count();
    (fps > 0.0 && frames > 0).then(|| frames as f64 / fps)
}
