//! Raster types and image utilities for laser-spot tracking.
//!
//! This crate is intentionally small. It owns the floating-point raster
//! representation that template matching runs on, conversions from the
//! supported pixel formats, Gaussian smoothing, and a minimal logger. It does
//! *not* know anything about targets, search windows, or tracking state.

mod blur;
mod logger;
mod raster;

pub use blur::gaussian_blur;
pub use logger::init_with_level;
pub use raster::{FramePixels, PixelFormatError, Raster, RasterView, RectU};
