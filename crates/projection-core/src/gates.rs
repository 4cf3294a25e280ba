//! Stateful per-job filter gates.
//!
//! One instance of each gate is created per job, mutated through the
//! extraction loop, and discarded at job end. Nothing here is shared or
//! global.

use std::collections::VecDeque;

use image::RgbImage;

use crate::sample::motion_score;

/// Accepted-score history bound for the adaptive blur gate.
const BLUR_HISTORY_LEN: usize = 10;

/// Adaptive rejection ratio: a view is blurry when it scores below this
/// fraction of the rolling mean of accepted scores.
const ADAPTIVE_RATIO: f64 = 0.6;

/// Consecutive rejections tolerated before the gate force-accepts a view so
/// a long blurry stretch cannot starve the output entirely.
const MAX_CONSECUTIVE_REJECTS: u32 = 6;

/// Outcome of a blur gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurDecision {
    Accept,
    /// Accepted only by the consecutive-rejection safety override.
    ForceAccept,
    Reject,
}

impl BlurDecision {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Reject)
    }
}

/// Per-view blur rejection gate.
///
/// Standard mode is a plain threshold. Smart mode additionally rejects views
/// that score well below the rolling mean of recently accepted scores, with
/// a safety override after too many consecutive rejections.
#[derive(Debug)]
pub struct BlurGate {
    smart: bool,
    threshold: f64,
    history: VecDeque<f64>,
    consecutive_rejects: u32,
}

impl BlurGate {
    pub fn new(smart: bool, threshold: f64) -> Self {
        Self {
            smart,
            threshold,
            history: VecDeque::with_capacity(BLUR_HISTORY_LEN),
            consecutive_rejects: 0,
        }
    }

    /// Evaluate one view's sharpness score.
    pub fn evaluate(&mut self, score: f64) -> BlurDecision {
        if !self.smart {
            return if score < self.threshold {
                BlurDecision::Reject
            } else {
                BlurDecision::Accept
            };
        }

        let below_floor = score < self.threshold;
        let below_history = !self.history.is_empty()
            && score < ADAPTIVE_RATIO * self.history_mean();

        if below_floor || below_history {
            self.consecutive_rejects += 1;
            if self.consecutive_rejects > MAX_CONSECUTIVE_REJECTS {
                tracing::warn!(
                    score,
                    rejects = self.consecutive_rejects,
                    "Force-accepting view after consecutive blur rejections"
                );
                self.consecutive_rejects = 0;
                self.push_accepted(score);
                return BlurDecision::ForceAccept;
            }
            return BlurDecision::Reject;
        }

        self.consecutive_rejects = 0;
        self.push_accepted(score);
        BlurDecision::Accept
    }

    /// Current count of consecutive rejections.
    pub fn consecutive_rejects(&self) -> u32 {
        self.consecutive_rejects
    }

    fn history_mean(&self) -> f64 {
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }

    fn push_accepted(&mut self, score: f64) {
        if self.history.len() == BLUR_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(score);
    }
}

/// Frame-level motion redundancy gate.
///
/// Holds the last *extracted* frame; a new frame passes only when its motion
/// score against that reference exceeds the threshold. Skipped frames leave
/// the reference unchanged.
pub struct MotionGate {
    threshold: f64,
    last_extracted: Option<RgbImage>,
}

impl MotionGate {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_extracted: None,
        }
    }

    /// Decide whether `frame` should be extracted. Accepting stores the frame
    /// as the new reference; the first frame is always accepted.
    pub fn should_extract(&mut self, frame: &RgbImage) -> bool {
        if let Some(reference) = &self.last_extracted {
            let score = motion_score(reference, frame);
            if score <= self.threshold {
                tracing::debug!(score, threshold = self.threshold, "Skipping static frame");
                return false;
            }
        }
        self.last_extracted = Some(frame.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_standard_mode_plain_threshold() {
        let mut gate = BlurGate::new(false, 100.0);
        assert_eq!(gate.evaluate(150.0), BlurDecision::Accept);
        assert_eq!(gate.evaluate(99.9), BlurDecision::Reject);
        // Standard mode never force-accepts.
        for _ in 0..20 {
            assert_eq!(gate.evaluate(1.0), BlurDecision::Reject);
        }
    }

    #[test]
    fn test_smart_mode_floor_rejection() {
        let mut gate = BlurGate::new(true, 100.0);
        assert_eq!(gate.evaluate(50.0), BlurDecision::Reject);
        assert_eq!(gate.consecutive_rejects(), 1);
    }

    #[test]
    fn test_smart_mode_history_rejection() {
        let mut gate = BlurGate::new(true, 100.0);
        // Build a history around 1000.
        for _ in 0..5 {
            assert_eq!(gate.evaluate(1000.0), BlurDecision::Accept);
        }
        // 550 clears the floor but is below 0.6 * 1000.
        assert_eq!(gate.evaluate(550.0), BlurDecision::Reject);
        // 700 is above 0.6 * 1000 and accepted.
        assert_eq!(gate.evaluate(700.0), BlurDecision::Accept);
    }

    #[test]
    fn test_smart_mode_seventh_rejection_forced() {
        let mut gate = BlurGate::new(true, 100.0);
        let mut score = 50.0;
        for _ in 0..6 {
            assert_eq!(gate.evaluate(score), BlurDecision::Reject);
            score -= 5.0;
        }
        assert_eq!(gate.consecutive_rejects(), 6);
        // Seventh consecutive rejection candidate is force-accepted and the
        // counter resets.
        assert_eq!(gate.evaluate(score), BlurDecision::ForceAccept);
        assert_eq!(gate.consecutive_rejects(), 0);
    }

    #[test]
    fn test_forced_score_enters_history() {
        let mut gate = BlurGate::new(true, 100.0);
        for _ in 0..7 {
            gate.evaluate(10.0);
        }
        // Forced score 10 is now the whole history; 7 > 0.6 * 10 passes the
        // adaptive check but still fails the floor.
        assert_eq!(gate.evaluate(7.0), BlurDecision::Reject);
        assert_eq!(gate.consecutive_rejects(), 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut gate = BlurGate::new(true, 0.0);
        for i in 0..50 {
            gate.evaluate(1000.0 + i as f64);
        }
        assert!(gate.history.len() <= BLUR_HISTORY_LEN);
    }

    fn solid(value: u8) -> RgbImage {
        RgbImage::from_pixel(64, 64, Rgb([value, value, value]))
    }

    #[test]
    fn test_motion_gate_first_frame_accepted() {
        let mut gate = MotionGate::new(5.0);
        assert!(gate.should_extract(&solid(100)));
    }

    #[test]
    fn test_motion_gate_skips_static_then_accepts_change() {
        let mut gate = MotionGate::new(5.0);
        assert!(gate.should_extract(&solid(100)));
        // Identical frame: motion score 0 <= threshold, skipped.
        assert!(!gate.should_extract(&solid(100)));
        // Reference unchanged, so a big change is measured against frame 1.
        assert!(gate.should_extract(&solid(200)));
    }

    #[test]
    fn test_motion_gate_reference_not_advanced_on_skip() {
        let mut gate = MotionGate::new(10.0);
        assert!(gate.should_extract(&solid(100)));
        // Small drifts below threshold keep being measured against the
        // original reference and keep being skipped.
        assert!(!gate.should_extract(&solid(104)));
        assert!(!gate.should_extract(&solid(108)));
        // Cumulative drift eventually exceeds the threshold.
        assert!(gate.should_extract(&solid(115)));
    }
}
