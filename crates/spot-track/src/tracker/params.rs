use serde::{Deserialize, Serialize};

use crate::metric::MatchMetric;
use crate::tracker::TrackError;
use crate::validate::ThresholdTable;

/// Session configuration.
///
/// Template geometry is carried by the per-target seeds, not here.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub metric: MatchMetric,
    /// Search half-width around the predicted position. Zero searches the
    /// whole frame and disables window growth.
    pub search_radius: usize,
    /// Physical distance between adjacent marks; normalized coordinates are
    /// reported in this unit.
    pub mark_dist: f64,
    pub subpixel: bool,
    /// Reduce color frames to intensity before matching. Consulted by frame
    /// adapters; the session itself always matches intensity rasters.
    pub match_intensity: bool,
    pub thresholds: ThresholdTable,
    /// Start with automatic skipping of spot failures enabled, and keep it
    /// enabled across successful matches.
    pub auto_skip_default: bool,
    /// Maximum spot search half-width under automatic skipping. `None`
    /// defaults to ten times the search radius.
    pub auto_skip_cap: Option<usize>,
    /// Per-frame time increment used when the source stops providing
    /// timestamps.
    pub time_step: f64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            metric: MatchMetric::CorrCoeffNormed,
            search_radius: 20,
            mark_dist: 1.0,
            subpixel: true,
            match_intensity: true,
            thresholds: ThresholdTable::default(),
            auto_skip_default: false,
            auto_skip_cap: None,
            time_step: 1.0,
        }
    }
}

impl TrackConfig {
    pub(crate) fn validate(&self) -> Result<(), TrackError> {
        if !(self.mark_dist.is_finite() && self.mark_dist > 0.0) {
            return Err(TrackError::InvalidConfig(format!(
                "mark_dist must be positive, got {}",
                self.mark_dist
            )));
        }
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return Err(TrackError::InvalidConfig(format!(
                "time_step must be positive, got {}",
                self.time_step
            )));
        }
        Ok(())
    }

    /// Effective spot half-width cap under automatic skipping.
    pub(crate) fn effective_auto_skip_cap(&self) -> usize {
        self.auto_skip_cap.unwrap_or(10 * self.search_radius)
    }
}
