use serde::{Deserialize, Serialize};

/// Correlation metric between a template and a window.
///
/// The numbering follows the conventional template-matching method table:
/// squared-difference metrics are minimized, correlation metrics maximized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMetric {
    /// Sum of squared differences (minimized).
    SqDiff,
    /// Normalized sum of squared differences (minimized).
    SqDiffNormed,
    /// Cross correlation.
    CrossCorr,
    /// Normalized cross correlation.
    CrossCorrNormed,
    /// Correlation coefficient (zero-mean cross correlation).
    CorrCoeff,
    /// Normalized correlation coefficient.
    CorrCoeffNormed,
}

impl MatchMetric {
    pub const COUNT: usize = 6;

    /// Stable index used by the threshold table.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            MatchMetric::SqDiff => 0,
            MatchMetric::SqDiffNormed => 1,
            MatchMetric::CrossCorr => 2,
            MatchMetric::CrossCorrNormed => 3,
            MatchMetric::CorrCoeff => 4,
            MatchMetric::CorrCoeffNormed => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Some(match index {
            0 => MatchMetric::SqDiff,
            1 => MatchMetric::SqDiffNormed,
            2 => MatchMetric::CrossCorr,
            3 => MatchMetric::CrossCorrNormed,
            4 => MatchMetric::CorrCoeff,
            5 => MatchMetric::CorrCoeffNormed,
            _ => return None,
        })
    }

    /// Whether the best score is the surface minimum (true for the
    /// squared-difference metrics).
    #[inline]
    pub fn is_minimized(self) -> bool {
        matches!(self, MatchMetric::SqDiff | MatchMetric::SqDiffNormed)
    }

    /// Metric used to compute a template's ideal self-match score.
    ///
    /// Self-match under `SqDiff` is identically zero, which breaks ratio
    /// validation, so the ideal is computed with `CrossCorr` instead.
    #[inline]
    pub fn ideal_metric(self) -> Self {
        match self {
            MatchMetric::SqDiff => MatchMetric::CrossCorr,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips() {
        for i in 0..MatchMetric::COUNT {
            let m = MatchMetric::from_index(i).expect("valid index");
            assert_eq!(m.index(), i);
        }
        assert!(MatchMetric::from_index(6).is_none());
    }

    #[test]
    fn only_square_difference_metrics_are_minimized() {
        assert!(MatchMetric::SqDiff.is_minimized());
        assert!(MatchMetric::SqDiffNormed.is_minimized());
        assert!(!MatchMetric::CrossCorrNormed.is_minimized());
        assert!(!MatchMetric::CorrCoeffNormed.is_minimized());
    }

    #[test]
    fn sqdiff_ideal_falls_back_to_cross_correlation() {
        assert_eq!(MatchMetric::SqDiff.ideal_metric(), MatchMetric::CrossCorr);
        assert_eq!(
            MatchMetric::CorrCoeffNormed.ideal_metric(),
            MatchMetric::CorrCoeffNormed
        );
    }
}
