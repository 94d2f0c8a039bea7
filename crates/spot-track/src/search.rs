//! Search-window placement and adaptive growth.
//!
//! A target is looked for inside a square window centered at its predicted
//! position. When a match is rejected the window's half-width doubles until
//! either a match is accepted or the window has been clamped against all four
//! image edges, at which point the whole frame has been searched.

use nalgebra::Point2;
use spot_track_core::RectU;

/// A placed search window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchWindow {
    /// Region of the frame to crop and match against.
    pub rect: RectU,
    /// Searchable span (twice the half-width) fed to the edge-proximity rule
    /// of the validator. Zero means the whole frame was searched and the rule
    /// is disabled.
    pub span: usize,
}

fn clamp_axis(center: f64, reach: usize, frame: usize) -> (usize, usize, bool, bool) {
    let lo = center.round() as i64 - reach as i64;
    let hi = center.round() as i64 + reach as i64 + 1;
    let clamped_lo = lo < 0;
    let clamped_hi = hi > frame as i64;
    let lo = lo.max(0) as usize;
    let hi = (hi.min(frame as i64) as usize).max(lo + 1);
    (lo, hi - lo, clamped_lo, clamped_hi)
}

/// Place the initial window for a frame: size `template_size + 2 * half`,
/// shifted (not shrunk) to stay inside the frame where possible.
///
/// `half == 0` searches the whole frame.
pub fn initial_window(
    center: Point2<f64>,
    template_size: usize,
    half: usize,
    frame_width: usize,
    frame_height: usize,
) -> SearchWindow {
    if half == 0 {
        return SearchWindow {
            rect: RectU::new(0, 0, frame_width, frame_height),
            span: 0,
        };
    }
    let w = (template_size + 2 * half).min(frame_width);
    let h = (template_size + 2 * half).min(frame_height);
    let place = |c: f64, size: usize, frame: usize| -> usize {
        let ideal = c.round() as i64 - (size as i64) / 2;
        ideal.clamp(0, (frame - size) as i64) as usize
    };
    SearchWindow {
        rect: RectU::new(
            place(center.x, w, frame_width),
            place(center.y, h, frame_height),
            w,
            h,
        ),
        span: 2 * half,
    }
}

/// Per-target, per-frame growth state.
///
/// Tracks the current half-width and which frame edges the grown window has
/// been clamped against. Growth is exhausted once all four edges have been
/// reached without an accepted match, or when the half-width would exceed the
/// cap (spot target under automatic skipping only).
#[derive(Clone, Copy, Debug)]
pub struct WindowGrowth {
    half: usize,
    cap: Option<usize>,
    left: bool,
    right: bool,
    top: bool,
    bottom: bool,
}

impl WindowGrowth {
    pub fn new(initial_half: usize, cap: Option<usize>) -> Self {
        Self {
            half: initial_half,
            cap,
            left: false,
            right: false,
            top: false,
            bottom: false,
        }
    }

    #[inline]
    pub fn half(&self) -> usize {
        self.half
    }

    fn exhausted(&self) -> bool {
        self.left && self.right && self.top && self.bottom
    }

    /// Double the half-width and place the grown window, clamping it to the
    /// frame and recording which edges were hit. Returns `None` once growth
    /// is exhausted.
    pub fn grow(
        &mut self,
        center: Point2<f64>,
        template_size: usize,
        frame_width: usize,
        frame_height: usize,
    ) -> Option<SearchWindow> {
        if self.half == 0 || self.exhausted() {
            return None;
        }
        self.half *= 2;
        if let Some(cap) = self.cap {
            if self.half > cap {
                return None;
            }
        }
        let reach = template_size / 2 + self.half;
        let (x, w, l, r) = clamp_axis(center.x, reach, frame_width);
        let (y, h, t, b) = clamp_axis(center.y, reach, frame_height);
        self.left |= l;
        self.right |= r;
        self.top |= t;
        self.bottom |= b;
        Some(SearchWindow {
            rect: RectU::new(x, y, w, h),
            span: 2 * self.half,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_window_is_centered_on_the_prediction() {
        let w = initial_window(Point2::new(50.0, 50.0), 10, 8, 200, 200);
        assert_eq!(w.rect, RectU::new(37, 37, 26, 26));
        assert_eq!(w.span, 16);
    }

    #[test]
    fn initial_window_shifts_inside_the_frame() {
        let w = initial_window(Point2::new(3.0, 197.0), 10, 8, 200, 200);
        assert_eq!(w.rect, RectU::new(0, 174, 26, 26));
    }

    #[test]
    fn zero_radius_searches_the_whole_frame() {
        let w = initial_window(Point2::new(50.0, 50.0), 10, 0, 200, 120);
        assert_eq!(w.rect, RectU::new(0, 0, 200, 120));
        assert_eq!(w.span, 0);
    }

    #[test]
    fn growth_doubles_the_half_width() {
        let mut g = WindowGrowth::new(8, None);
        let w = g.grow(Point2::new(100.0, 100.0), 10, 400, 400).expect("grown");
        assert_eq!(g.half(), 16);
        assert_eq!(w.span, 32);
        assert_eq!(w.rect, RectU::new(79, 79, 43, 43));
    }

    #[test]
    fn growth_exhausts_after_covering_the_frame() {
        let (fw, fh) = (640usize, 480usize);
        let mut g = WindowGrowth::new(8, None);
        let mut grown = 0usize;
        while g
            .grow(Point2::new(320.0, 240.0), 10, fw, fh)
            .is_some()
        {
            grown += 1;
        }
        let bound = (fw.max(fh) as f64).log2().ceil() as usize;
        assert!(grown <= bound, "{grown} doublings exceeds bound {bound}");
        // the last grown window covered the whole frame
        let mut g2 = WindowGrowth::new(8, None);
        let mut last = None;
        while let Some(w) = g2.grow(Point2::new(320.0, 240.0), 10, fw, fh) {
            last = Some(w);
        }
        assert_eq!(last.expect("at least one").rect, RectU::new(0, 0, fw, fh));
    }

    #[test]
    fn cap_stops_growth_early() {
        let mut g = WindowGrowth::new(8, Some(20));
        assert!(g.grow(Point2::new(320.0, 240.0), 10, 640, 480).is_some());
        assert!(g.grow(Point2::new(320.0, 240.0), 10, 640, 480).is_none());
    }

    #[test]
    fn unbounded_search_never_grows() {
        let mut g = WindowGrowth::new(0, None);
        assert!(g.grow(Point2::new(320.0, 240.0), 10, 640, 480).is_none());
    }
}
