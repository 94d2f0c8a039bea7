//! Tracked targets: the laser spot and the four fiducial marks.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use spot_track_core::{gaussian_blur, Raster, RasterView, RectU};

use crate::matcher::self_match_score;
use crate::metric::MatchMetric;
use crate::tracker::TrackError;

/// Smoothing applied to every template once and to every search window before
/// each match attempt.
pub(crate) const BLUR_SIGMA: f64 = 2.0;
pub(crate) const BLUR_ACCURACY: f64 = 0.02;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetId {
    Spot,
    Mark1,
    Mark2,
    Mark3,
    Mark4,
}

impl TargetId {
    pub const ALL: [TargetId; 5] = [
        TargetId::Mark1,
        TargetId::Mark2,
        TargetId::Mark3,
        TargetId::Mark4,
        TargetId::Spot,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TargetId::Spot => "spot",
            TargetId::Mark1 => "mark1",
            TargetId::Mark2 => "mark2",
            TargetId::Mark3 => "mark3",
            TargetId::Mark4 => "mark4",
        }
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the five template seeds supplied when a session starts.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct InitialTemplate {
    pub id: TargetId,
    /// Center of the template patch in the reference frame.
    pub center: Point2<f64>,
    /// Half the template side length in pixels.
    pub half_size: usize,
}

/// Per-target tracking state.
///
/// The reference template and rectangle are fixed at session start; `dis`
/// accumulates the target's displacement from the reference rectangle and is
/// reported relative to `baseline`, the displacement at the first committed
/// frame.
#[derive(Clone, Debug)]
pub struct Target {
    pub id: TargetId,
    pub template: Raster,
    pub rect: RectU,
    pub ideal: f64,
    pub dis: Vector2<f64>,
    pub baseline: Option<Vector2<f64>>,
    /// Whether this target is eligible for search-window growth.
    pub grows: bool,
}

impl Target {
    /// Extract the reference patch from the reference frame, smooth it and
    /// compute the ideal self-match score.
    pub fn extract(
        frame: RasterView<'_>,
        init: &InitialTemplate,
        metric: MatchMetric,
        grows: bool,
    ) -> Result<Self, TrackError> {
        let side = 2 * init.half_size;
        let x = init.center.x.round() as i64 - init.half_size as i64;
        let y = init.center.y.round() as i64 - init.half_size as i64;
        if side == 0
            || x < 0
            || y < 0
            || x + side as i64 > frame.width as i64
            || y + side as i64 > frame.height as i64
        {
            return Err(TrackError::TemplateOutOfBounds {
                id: init.id,
                cx: init.center.x,
                cy: init.center.y,
                half: init.half_size,
                width: frame.width,
                height: frame.height,
            });
        }
        let rect = RectU::new(x as usize, y as usize, side, side);
        let mut template = frame.crop(rect);
        gaussian_blur(&mut template, BLUR_SIGMA, BLUR_ACCURACY);
        let ideal = self_match_score(template.view(), metric.ideal_metric())?;
        Ok(Self {
            id: init.id,
            template,
            rect,
            ideal,
            dis: Vector2::zeros(),
            baseline: None,
            grows,
        })
    }

    /// Predicted center for the next frame: reference center plus the running
    /// displacement.
    pub fn predicted(&self) -> Point2<f64> {
        Point2::new(
            self.rect.x as f64 + self.rect.width as f64 / 2.0 + self.dis.x,
            self.rect.y as f64 + self.rect.height as f64 / 2.0 + self.dis.y,
        )
    }

    /// Displacement relative to the first committed frame.
    pub fn reported_dis(&self) -> Vector2<f64> {
        match self.baseline {
            Some(base) => self.dis - base,
            None => self.dis,
        }
    }
}
