//! Subpixel refinement of a score-surface extremum.
//!
//! A Newton step on the quadratic Taylor model built from central finite
//! differences. Extrema on the surface border are not refined, and offsets
//! from an ill-conditioned Hessian or exceeding one pixel are discarded;
//! both cases return a zero offset.

use crate::matcher::ScoreSurface;

struct Derivatives {
    fx: f64,
    fy: f64,
    fxx: f64,
    fyy: f64,
    fxy: f64,
}

fn central_differences(s: &ScoreSurface, x: usize, y: usize) -> Derivatives {
    let v = |dx: i64, dy: i64| -> f64 {
        s.at((x as i64 + dx) as usize, (y as i64 + dy) as usize) as f64
    };
    Derivatives {
        fx: (v(1, 0) - v(-1, 0)) / 2.0,
        fy: (v(0, 1) - v(0, -1)) / 2.0,
        fxx: v(-1, 0) - 2.0 * v(0, 0) + v(1, 0),
        fyy: v(0, -1) - 2.0 * v(0, 0) + v(0, 1),
        fxy: (v(1, 1) + v(-1, -1) - v(1, -1) - v(-1, 1)) / 4.0,
    }
}

#[inline]
fn on_border(s: &ScoreSurface, x: usize, y: usize) -> bool {
    x == 0 || y == 0 || x == s.width - 1 || y == s.height - 1
}

/// Full 2D Newton step nulling the local gradient at `(x, y)`.
pub(crate) fn quadratic_offset(s: &ScoreSurface, x: usize, y: usize) -> (f64, f64) {
    if on_border(s, x, y) {
        return (0.0, 0.0);
    }
    let d = central_differences(s, x, y);
    let denom = d.fxy * d.fxy - d.fxx * d.fyy;
    if denom == 0.0 {
        return (0.0, 0.0);
    }
    let dx = (d.fyy * d.fx - d.fxy * d.fy) / denom;
    let dy = (d.fxx * d.fy - d.fxy * d.fx) / denom;
    if dx.abs() > 1.0 || dy.abs() > 1.0 {
        return (0.0, 0.0);
    }
    (dx, dy)
}

/// Newton step constrained to the direction `(cos, sin)`.
pub(crate) fn quadratic_offset_along(
    s: &ScoreSurface,
    x: usize,
    y: usize,
    cos: f64,
    sin: f64,
) -> (f64, f64) {
    if on_border(s, x, y) {
        return (0.0, 0.0);
    }
    let d = central_differences(s, x, y);
    let fr = d.fx * cos + d.fy * sin;
    let frr = d.fxx * cos * cos + d.fyy * sin * sin + d.fxy * sin * cos;
    if frr == 0.0 {
        return (0.0, 0.0);
    }
    let dx = -fr / frr * cos;
    let dy = -fr / frr * sin;
    if dx.abs() > 1.0 || dy.abs() > 1.0 {
        return (0.0, 0.0);
    }
    (dx, dy)
}
