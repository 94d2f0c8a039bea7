use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use spot_track_core::RectU;

use crate::target::TargetId;

/// Observational per-frame geometry for visualization. Never read back by
/// the session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FrameOverlay {
    /// Matched template footprints, one per target in [`TargetId::ALL`] order.
    pub footprints: Vec<RectU>,
    /// Search windows the accepted matches came from, same order.
    pub windows: Vec<RectU>,
    /// Mark1-compensated spot positions of every committed frame so far.
    pub trajectory: Vec<Point2<f64>>,
}

/// One committed frame of tracking output. Append-only; never mutated after
/// creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameRecord {
    pub index: usize,
    /// Seconds since the reference frame.
    pub seconds: f64,
    /// Baseline-relative pixel displacement per target, in
    /// [`TargetId::ALL`] order.
    pub displacements: [Vector2<f64>; 5],
    /// Raw match scores, same order. The reference frame reports each
    /// target's ideal self-match score.
    pub scores: [f64; 5],
    /// Spot displacement with mark1's (global) motion subtracted.
    pub dx_pix: f64,
    pub dy_pix: f64,
    /// Spot position in mark-distance units along the mark1 -> mark2 axis.
    pub x_abs: f64,
    /// Spot position in mark-distance units along the mark1 -> mark4 axis.
    pub y_abs: f64,
    /// Cumulative scalar displacement from the first normalized position.
    pub dl: f64,
    pub overlay: FrameOverlay,
}

impl FrameRecord {
    pub fn displacement(&self, id: TargetId) -> Vector2<f64> {
        let slot = TargetId::ALL.iter().position(|&t| t == id).unwrap_or(0);
        self.displacements[slot]
    }
}

/// Outcome of analyzing one frame.
#[derive(Clone, Debug)]
pub enum FrameOutcome {
    Committed(FrameRecord),
    /// Frame dropped; no session state was mutated.
    Skipped,
    /// The failure policy ended the run.
    Stopped,
}
