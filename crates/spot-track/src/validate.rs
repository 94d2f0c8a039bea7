//! Match-quality validation.
//!
//! A match is accepted when its score is close enough to the target's ideal
//! self-match score under the per-metric threshold, and its coordinate does
//! not abut the search-window boundary (a peak on the boundary implies the
//! true position may lie outside the searched area).

use serde::{Deserialize, Serialize};

use crate::metric::MatchMetric;

/// Per-metric acceptance thresholds.
///
/// One scalar per correlation metric. Entries are relaxed only by an explicit
/// "accept despite poor match" decision, which widens the entry to 1.1x the
/// observed deviation for the remainder of the run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    entries: [f64; MatchMetric::COUNT],
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            entries: [0.10, 0.10, 0.05, 0.05, 0.20, 0.20],
        }
    }
}

impl ThresholdTable {
    pub fn new(entries: [f64; MatchMetric::COUNT]) -> Self {
        Self { entries }
    }

    #[inline]
    pub fn get(&self, metric: MatchMetric) -> f64 {
        self.entries[metric.index()]
    }

    /// Relax the threshold for `metric` so that the observed `score` against
    /// `ideal` would now pass, with a 10% margin.
    pub fn relax(&mut self, metric: MatchMetric, score: f64, ideal: f64) {
        let deviation = match metric {
            MatchMetric::SqDiff => score / ideal,
            MatchMetric::SqDiffNormed => score,
            MatchMetric::CrossCorr | MatchMetric::CorrCoeff => ((score - ideal) / ideal).abs(),
            MatchMetric::CrossCorrNormed | MatchMetric::CorrCoeffNormed => (score - ideal).abs(),
        };
        self.entries[metric.index()] = 1.1 * deviation;
    }
}

/// Accept or reject a match. Pure function of its arguments.
///
/// `window_span` is the searchable span of the window (twice the search
/// half-width); zero disables the edge-proximity rule (unbounded search).
pub fn validate_match(
    score: f64,
    ideal: f64,
    metric: MatchMetric,
    x: f64,
    y: f64,
    window_span: usize,
    template_size: usize,
    thresholds: &ThresholdTable,
) -> bool {
    let thrsh = thresholds.get(metric);
    let score_ok = match metric {
        MatchMetric::SqDiff => score / ideal <= thrsh,
        MatchMetric::SqDiffNormed => score <= thrsh,
        MatchMetric::CrossCorr | MatchMetric::CorrCoeff => {
            ((score - ideal) / ideal).abs() <= thrsh
        }
        MatchMetric::CrossCorrNormed | MatchMetric::CorrCoeffNormed => {
            (score - ideal).abs() <= thrsh
        }
    };
    if !score_ok {
        return false;
    }

    if window_span != 0 {
        let span = window_span as f64;
        let margin = (0.05 * template_size as f64).min(0.05 * span);
        if x < margin || y < margin || x > span - margin || y > span - margin {
            return false;
        }
    }
    true
}
