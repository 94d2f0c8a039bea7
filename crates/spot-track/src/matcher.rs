//! Template-correlation matching.
//!
//! [`ScoreSurface`] holds the dense metric evaluation of a template against
//! every placement inside a search raster; [`match_template`] selects the
//! extremum and optionally refines it to subpixel precision. The directional
//! variant [`match_template_along`] restricts the search to samples on a
//! caller-supplied line through the surface.

use spot_track_core::RasterView;

use crate::metric::MatchMetric;
use crate::refine;

#[derive(thiserror::Error, Debug)]
pub enum MatchError {
    #[error("template {tpl_width}x{tpl_height} larger than search window {win_width}x{win_height}")]
    TemplateTooLarge {
        tpl_width: usize,
        tpl_height: usize,
        win_width: usize,
        win_height: usize,
    },
    #[error("empty template or search window")]
    EmptyInput,
}

/// Best-aligned template placement inside a search window.
///
/// `x`/`y` are the top-left offset of the template within the window,
/// fractional when subpixel refinement was applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchLocation {
    pub x: f64,
    pub y: f64,
    pub score: f64,
}

/// Line through the score surface for directional search: a point
/// `(x0, y0)` and a direction `(dx, dy)`.
#[derive(Clone, Copy, Debug)]
pub struct SearchLine {
    pub x0: f64,
    pub y0: f64,
    pub dx: f64,
    pub dy: f64,
}

/// Dense metric evaluation of every template placement.
#[derive(Clone, Debug)]
pub struct ScoreSurface {
    pub width: usize,
    pub height: usize,
    data: Vec<f32>,
}

impl ScoreSurface {
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Evaluate `metric` for every placement of `tpl` inside `search`.
    ///
    /// The surface has dimensions `(S.w - T.w + 1) x (S.h - T.h + 1)`.
    pub fn compute(
        search: RasterView<'_>,
        tpl: RasterView<'_>,
        metric: MatchMetric,
    ) -> Result<Self, MatchError> {
        if tpl.width == 0 || tpl.height == 0 || search.width == 0 || search.height == 0 {
            return Err(MatchError::EmptyInput);
        }
        if tpl.width > search.width || tpl.height > search.height {
            return Err(MatchError::TemplateTooLarge {
                tpl_width: tpl.width,
                tpl_height: tpl.height,
                win_width: search.width,
                win_height: search.height,
            });
        }

        let out_w = search.width - tpl.width + 1;
        let out_h = search.height - tpl.height + 1;
        let n = (tpl.width * tpl.height) as f64;

        // template statistics are shared by all placements
        let mut sum_t = 0.0f64;
        let mut sum_tt = 0.0f64;
        for &t in tpl.data {
            sum_t += t as f64;
            sum_tt += (t as f64) * (t as f64);
        }
        let mean_t = sum_t / n;
        let var_t = sum_tt - n * mean_t * mean_t;

        let mut data = vec![0.0f32; out_w * out_h];
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut sum_s = 0.0f64;
                let mut sum_ss = 0.0f64;
                let mut sum_ts = 0.0f64;
                for ty in 0..tpl.height {
                    let srow = (oy + ty) * search.width + ox;
                    let trow = ty * tpl.width;
                    for tx in 0..tpl.width {
                        let s = search.data[srow + tx] as f64;
                        let t = tpl.data[trow + tx] as f64;
                        sum_s += s;
                        sum_ss += s * s;
                        sum_ts += t * s;
                    }
                }

                let score = match metric {
                    MatchMetric::SqDiff => sum_tt - 2.0 * sum_ts + sum_ss,
                    MatchMetric::SqDiffNormed => {
                        let denom = (sum_tt * sum_ss).sqrt();
                        if denom > 0.0 {
                            (sum_tt - 2.0 * sum_ts + sum_ss) / denom
                        } else {
                            0.0
                        }
                    }
                    MatchMetric::CrossCorr => sum_ts,
                    MatchMetric::CrossCorrNormed => {
                        let denom = (sum_tt * sum_ss).sqrt();
                        if denom > 0.0 {
                            sum_ts / denom
                        } else {
                            0.0
                        }
                    }
                    MatchMetric::CorrCoeff => {
                        let mean_s = sum_s / n;
                        sum_ts - n * mean_t * mean_s
                    }
                    MatchMetric::CorrCoeffNormed => {
                        let mean_s = sum_s / n;
                        let cov = sum_ts - n * mean_t * mean_s;
                        let var_s = sum_ss - n * mean_s * mean_s;
                        let denom = (var_t * var_s).sqrt();
                        if denom > 0.0 {
                            cov / denom
                        } else {
                            0.0
                        }
                    }
                };
                data[oy * out_w + ox] = score as f32;
            }
        }

        Ok(Self {
            width: out_w,
            height: out_h,
            data,
        })
    }

    fn extremum(&self, metric: MatchMetric) -> (usize, usize, f64) {
        let minimize = metric.is_minimized();
        let mut best = (0usize, 0usize, self.at(0, 0) as f64);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = self.at(x, y) as f64;
                if (minimize && v < best.2) || (!minimize && v > best.2) {
                    best = (x, y, v);
                }
            }
        }
        best
    }

    fn extremum_along(&self, metric: MatchMetric, line: &SearchLine) -> (usize, usize, f64) {
        let minimize = metric.is_minimized();
        let mut best: Option<(usize, usize, f64)> = None;
        if line.dx.abs() > line.dy.abs() {
            for col in 0..self.width {
                let row = (line.y0 + line.dy * (col as f64 - line.x0) / line.dx) as i64;
                if row < 0 || row >= self.height as i64 {
                    continue;
                }
                let v = self.at(col, row as usize) as f64;
                let better = match best {
                    None => true,
                    Some((_, _, b)) => (minimize && v < b) || (!minimize && v > b),
                };
                if better {
                    best = Some((col, row as usize, v));
                }
            }
        } else {
            for row in 0..self.height {
                let col = (line.x0 + line.dx * (row as f64 - line.y0) / line.dy) as i64;
                if col < 0 || col >= self.width as i64 {
                    continue;
                }
                let v = self.at(col as usize, row) as f64;
                let better = match best {
                    None => true,
                    Some((_, _, b)) => (minimize && v < b) || (!minimize && v > b),
                };
                if better {
                    best = Some((col as usize, row, v));
                }
            }
        }
        best.unwrap_or((0, 0, self.at(0, 0) as f64))
    }
}

/// Locate the best template placement inside `search`.
pub fn match_template(
    search: RasterView<'_>,
    tpl: RasterView<'_>,
    metric: MatchMetric,
    subpixel: bool,
) -> Result<MatchLocation, MatchError> {
    let surface = ScoreSurface::compute(search, tpl, metric)?;
    let (x, y, score) = surface.extremum(metric);
    let (dx, dy) = if subpixel {
        refine::quadratic_offset(&surface, x, y)
    } else {
        (0.0, 0.0)
    };
    Ok(MatchLocation {
        x: x as f64 + dx,
        y: y as f64 + dy,
        score,
    })
}

/// Locate the best template placement restricted to samples on `line`.
///
/// Subpixel refinement is applied along the line direction only. This mode is
/// part of the matcher interface but is not exercised by the tracking
/// pipeline.
pub fn match_template_along(
    search: RasterView<'_>,
    tpl: RasterView<'_>,
    metric: MatchMetric,
    subpixel: bool,
    line: &SearchLine,
) -> Result<MatchLocation, MatchError> {
    if line.dx == 0.0 && line.dy == 0.0 {
        return match_template(search, tpl, metric, subpixel);
    }
    let surface = ScoreSurface::compute(search, tpl, metric)?;
    let (x, y, score) = surface.extremum_along(metric, line);
    let (dx, dy) = if subpixel {
        let angle = line.dy.atan2(line.dx);
        refine::quadratic_offset_along(&surface, x, y, angle.cos(), angle.sin())
    } else {
        (0.0, 0.0)
    };
    Ok(MatchLocation {
        x: x as f64 + dx,
        y: y as f64 + dy,
        score,
    })
}

/// Ideal self-match score of a template: the metric value of the template
/// matched against itself in a single-placement surface.
pub fn self_match_score(tpl: RasterView<'_>, metric: MatchMetric) -> Result<f64, MatchError> {
    let surface = ScoreSurface::compute(tpl, tpl, metric)?;
    Ok(surface.at(0, 0) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use spot_track_core::Raster;

    fn blob(width: usize, height: usize, cx: f64, cy: f64) -> Raster {
        let mut r = Raster::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                r.set(x, y, (200.0 * (-(dx * dx + dy * dy) / 8.0).exp()) as f32);
            }
        }
        r
    }

    const ALL_METRICS: [MatchMetric; 6] = [
        MatchMetric::SqDiff,
        MatchMetric::SqDiffNormed,
        MatchMetric::CrossCorr,
        MatchMetric::CrossCorrNormed,
        MatchMetric::CorrCoeff,
        MatchMetric::CorrCoeffNormed,
    ];

    #[test]
    fn self_match_yields_extremal_value() {
        let tpl = blob(11, 11, 5.0, 5.0);
        for metric in ALL_METRICS {
            let ideal = self_match_score(tpl.view(), metric).expect("self match");
            match metric {
                MatchMetric::SqDiff | MatchMetric::SqDiffNormed => {
                    assert_relative_eq!(ideal, 0.0, epsilon = 1e-3)
                }
                MatchMetric::CrossCorrNormed | MatchMetric::CorrCoeffNormed => {
                    assert_relative_eq!(ideal, 1.0, epsilon = 1e-4)
                }
                _ => assert!(ideal > 0.0),
            }
        }
    }

    #[test]
    fn finds_known_integer_offset() {
        let search = blob(41, 31, 23.0, 14.0);
        let tpl = search.crop(spot_track_core::RectU::new(18, 9, 11, 11));
        for metric in ALL_METRICS {
            let m = match_template(search.view(), tpl.view(), metric, false).expect("match");
            assert_eq!((m.x, m.y), (18.0, 9.0), "metric {metric:?}");
        }
    }

    #[test]
    fn surface_has_expected_dimensions() {
        let search = blob(20, 16, 10.0, 8.0);
        let tpl = blob(7, 5, 3.0, 2.0);
        let s = ScoreSurface::compute(search.view(), tpl.view(), MatchMetric::CorrCoeffNormed)
            .expect("surface");
        assert_eq!((s.width, s.height), (14, 12));
    }

    #[test]
    fn template_larger_than_window_is_an_error() {
        let search = blob(5, 5, 2.0, 2.0);
        let tpl = blob(7, 7, 3.0, 3.0);
        assert!(matches!(
            match_template(search.view(), tpl.view(), MatchMetric::CorrCoeffNormed, false),
            Err(MatchError::TemplateTooLarge { .. })
        ));
    }

    #[test]
    fn subpixel_recovers_fractional_peak() {
        // blob centered between integer placements
        let search = blob(41, 41, 20.4, 19.7);
        let tpl = blob(11, 11, 5.0, 5.0);
        let m = match_template(search.view(), tpl.view(), MatchMetric::CorrCoeffNormed, true)
            .expect("match");
        assert_relative_eq!(m.x, 15.4, epsilon = 0.15);
        assert_relative_eq!(m.y, 14.7, epsilon = 0.15);
    }

    #[test]
    fn directional_search_stays_on_the_line() {
        let search = blob(41, 41, 20.0, 20.0);
        let tpl = blob(11, 11, 5.0, 5.0);
        // horizontal line through the true peak row
        let line = SearchLine {
            x0: 0.0,
            y0: 15.0,
            dx: 1.0,
            dy: 0.0,
        };
        let m = match_template_along(
            search.view(),
            tpl.view(),
            MatchMetric::CorrCoeffNormed,
            false,
            &line,
        )
        .expect("match");
        assert_eq!((m.x, m.y), (15.0, 15.0));

        // a line offset from the peak still reports a sample on that line
        let off = SearchLine {
            x0: 0.0,
            y0: 12.0,
            dx: 1.0,
            dy: 0.0,
        };
        let m = match_template_along(
            search.view(),
            tpl.view(),
            MatchMetric::CorrCoeffNormed,
            false,
            &off,
        )
        .expect("match");
        assert_eq!(m.y, 12.0);
    }
}
