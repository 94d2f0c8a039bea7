//! Collaborator interfaces of a tracking session.

use spot_track_core::FramePixels;

use crate::target::TargetId;

/// One frame as delivered by a [`FrameSource`].
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub pixels: FramePixels,
    /// Capture time in seconds, if the source knows it. Once a frame arrives
    /// without one the session falls back to a fixed per-frame increment for
    /// the rest of the run.
    pub seconds: Option<f64>,
}

/// Lazy, finite, index-addressed sequence of frames.
pub trait FrameSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the frame at `index`. `None` marks the frame unusable; it is
    /// dropped from the sequence without being analyzed.
    fn frame(&mut self, index: usize) -> Option<Frame>;
}

/// Outcome of a failure-policy consultation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureDecision {
    /// Relax the threshold for the active metric and commit the best match
    /// found during the search.
    Accept,
    /// Leave all running state untouched and drop the frame from the output.
    Skip,
    /// Terminate the run.
    Stop,
}

/// Decides what to do when the search for a target is exhausted.
///
/// `resolve` blocks the tracking worker until a decision is available; a
/// human operator behind a channel is a valid implementation.
pub trait FailurePolicy {
    fn resolve(&mut self, target: TargetId, frame_index: usize) -> FailureDecision;

    /// Offered after three consecutive spot skips. Returning a search
    /// half-width cap enables automatic skipping of further spot failures up
    /// to that cap; `None` declines.
    fn offer_auto_skip(&mut self, suggested_cap: usize) -> Option<usize> {
        let _ = suggested_cap;
        None
    }
}

/// Policy applying the same decision to every failure. Useful for unattended
/// runs and tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedPolicy(pub FailureDecision);

impl FailurePolicy for FixedPolicy {
    fn resolve(&mut self, _target: TargetId, _frame_index: usize) -> FailureDecision {
        self.0
    }

    fn offer_auto_skip(&mut self, suggested_cap: usize) -> Option<usize> {
        match self.0 {
            FailureDecision::Skip => Some(suggested_cap),
            _ => None,
        }
    }
}
