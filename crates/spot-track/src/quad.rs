//! Perspective compensation against the four fiducial marks.
//!
//! The marks are treated as corners of a bilinear patch; the spot's pixel
//! position is inverted through the patch to the (u, v) parameters that
//! reproduce it, scaled by the physical mark spacing. Eliminating one axis
//! from the bilinear system leaves one quadratic per axis in the corner
//! difference vectors; a degenerate leading coefficient (parallelogram case)
//! falls back to the affine solution.

use nalgebra::{Point2, Vector2};

/// Normalized spot coordinate for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedPoint {
    /// Position along the m1 -> m2 axis, in `mark_dist` units.
    pub x_abs: f64,
    /// Position along the m1 -> m4 axis, in `mark_dist` units.
    pub y_abs: f64,
    /// Distance from the first recorded normalized position.
    pub dl: f64,
}

/// Maps mark/spot pixel positions into mark-spacing units.
///
/// Corner order: m1..m4 are adjacent corners (m1/m3 and m2/m4 diagonal), with
/// m1 -> m2 the x axis and m1 -> m4 the y axis.
#[derive(Clone, Debug)]
pub struct QuadNormalizer {
    mark_dist: f64,
    origin: Option<Point2<f64>>,
}

fn quadratic_root(a: f64, b: f64, c: f64, negative: bool) -> f64 {
    if a.abs() < 1e-9 * b.abs().max(1.0) {
        return c / b;
    }
    let disc = (b * b + 4.0 * a * c).max(0.0).sqrt();
    if negative {
        (-disc - b) / (2.0 * a)
    } else {
        (disc - b) / (2.0 * a)
    }
}

impl QuadNormalizer {
    pub fn new(mark_dist: f64) -> Self {
        Self {
            mark_dist,
            origin: None,
        }
    }

    /// Invert the bilinear patch at the spot position and update the
    /// cumulative displacement reference.
    pub fn normalize(&mut self, marks: [Point2<f64>; 4], spot: Point2<f64>) -> NormalizedPoint {
        let [m1, m2, m3, m4] = marks;
        let a1: Vector2<f64> = m4 - m1;
        let b1: Vector2<f64> = m2 - m1;
        let a2: Vector2<f64> = m3 - m2;
        let b2: Vector2<f64> = m3 - m4;
        let r: Vector2<f64> = spot - m1;

        let ay = b1.x * (a1.y - a2.y) + b1.y * (a2.x - a1.x);
        let by = -b1.x * a1.y + b1.y * a1.x - r.x * (a1.y - a2.y) - r.y * (a2.x - a1.x);
        let cy = -r.x * a1.y + r.y * a1.x;
        let x_abs = quadratic_root(ay, by, cy, true) * self.mark_dist;

        let ax = a1.x * (b1.y - b2.y) + a1.y * (b2.x - b1.x);
        let bx = -a1.x * b1.y + a1.y * b1.x - r.x * (b1.y - b2.y) - r.y * (b2.x - b1.x);
        let cx = -r.x * b1.y + r.y * b1.x;
        let y_abs = quadratic_root(ax, bx, cx, false) * self.mark_dist;

        let here = Point2::new(x_abs, y_abs);
        let origin = *self.origin.get_or_insert(here);
        NormalizedPoint {
            x_abs,
            y_abs,
            dl: (here - origin).norm(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(side: f64) -> [Point2<f64>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(side, 0.0),
            Point2::new(side, side),
            Point2::new(0.0, side),
        ]
    }

    #[test]
    fn square_corners_round_trip() {
        let marks = square(100.0);
        for (corner, expect) in [
            (marks[0], (0.0, 0.0)),
            (marks[1], (100.0, 0.0)),
            (marks[2], (100.0, 100.0)),
            (marks[3], (0.0, 100.0)),
        ] {
            let mut n = QuadNormalizer::new(100.0);
            let p = n.normalize(marks, corner);
            assert_relative_eq!(p.x_abs, expect.0, epsilon = 1e-9);
            assert_relative_eq!(p.y_abs, expect.1, epsilon = 1e-9);
        }
    }

    #[test]
    fn skewed_quad_corners_round_trip() {
        let marks = [
            Point2::new(10.0, 20.0),
            Point2::new(110.0, 25.0),
            Point2::new(118.0, 131.0),
            Point2::new(6.0, 115.0),
        ];
        for (corner, expect) in [
            (marks[0], (0.0, 0.0)),
            (marks[1], (100.0, 0.0)),
            (marks[2], (100.0, 100.0)),
            (marks[3], (0.0, 100.0)),
        ] {
            let mut n = QuadNormalizer::new(100.0);
            let p = n.normalize(marks, corner);
            assert_relative_eq!(p.x_abs, expect.0, epsilon = 1e-6);
            assert_relative_eq!(p.y_abs, expect.1, epsilon = 1e-6);
        }
    }

    #[test]
    fn interior_bilinear_point_inverts_on_a_non_parallelogram() {
        // bilinear interpolation of the corners at u = v = 0.5
        let marks = [
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(120.0, 110.0),
            Point2::new(0.0, 100.0),
        ];
        let spot = Point2::new(55.0, 52.5);
        let mut n = QuadNormalizer::new(100.0);
        let p = n.normalize(marks, spot);
        assert_relative_eq!(p.x_abs, 50.0, epsilon = 1e-9);
        assert_relative_eq!(p.y_abs, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn displacement_is_measured_from_the_first_frame() {
        let marks = square(100.0);
        let mut n = QuadNormalizer::new(100.0);
        let p0 = n.normalize(marks, Point2::new(50.0, 50.0));
        assert_relative_eq!(p0.x_abs, 50.0, epsilon = 1e-9);
        assert_relative_eq!(p0.y_abs, 50.0, epsilon = 1e-9);
        assert_eq!(p0.dl, 0.0);

        let p1 = n.normalize(marks, Point2::new(60.0, 50.0));
        assert_relative_eq!(p1.dl, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn displacement_is_a_magnitude() {
        let marks = square(100.0);
        let mut n = QuadNormalizer::new(100.0);
        n.normalize(marks, Point2::new(50.0, 50.0));
        let p = n.normalize(marks, Point2::new(40.0, 47.0));
        assert!(p.dl > 0.0);
        assert_relative_eq!(p.dl, (100.0f64 + 9.0).sqrt(), epsilon = 1e-9);
    }
}
