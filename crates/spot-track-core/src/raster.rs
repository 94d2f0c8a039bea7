use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates (top-left origin).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectU {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl RectU {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Pixel payload of one frame as delivered by a frame source.
///
/// Matching always runs on `f32` rasters; these variants cover the formats a
/// session accepts and the rescaling each one needs.
#[derive(Clone, Debug)]
pub enum FramePixels {
    /// 8-bit grayscale, kept on the 0..255 range.
    Gray8(Vec<u8>),
    /// 16-bit grayscale, rescaled to 0..1 (raw 16-bit correlation is not
    /// supported by the matching primitive).
    Gray16(Vec<u16>),
    /// Pre-converted floating intensity.
    GrayF32(Vec<f32>),
    /// Interleaved RGB, converted to intensity as the unweighted channel mean.
    Rgb8(Vec<u8>),
}

#[derive(thiserror::Error, Debug)]
pub enum PixelFormatError {
    #[error("pixel buffer length {len} does not match {width}x{height}")]
    LengthMismatch {
        len: usize,
        width: usize,
        height: usize,
    },
}

/// Owned row-major floating-point raster.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

/// Borrowed view of a raster.
#[derive(Clone, Copy, Debug)]
pub struct RasterView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [f32],
}

impl Raster {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Convert a frame buffer into a matchable raster.
    pub fn from_frame(
        pixels: &FramePixels,
        width: usize,
        height: usize,
    ) -> Result<Self, PixelFormatError> {
        let n = width * height;
        let mismatch = |len| PixelFormatError::LengthMismatch { len, width, height };
        let data = match pixels {
            FramePixels::Gray8(buf) => {
                if buf.len() != n {
                    return Err(mismatch(buf.len()));
                }
                buf.iter().map(|&v| v as f32).collect()
            }
            FramePixels::Gray16(buf) => {
                if buf.len() != n {
                    return Err(mismatch(buf.len()));
                }
                buf.iter().map(|&v| v as f32 / 65535.0).collect()
            }
            FramePixels::GrayF32(buf) => {
                if buf.len() != n {
                    return Err(mismatch(buf.len()));
                }
                buf.clone()
            }
            FramePixels::Rgb8(buf) => {
                if buf.len() != 3 * n {
                    return Err(mismatch(buf.len()));
                }
                buf.chunks_exact(3)
                    .map(|px| (px[0] as f32 + px[1] as f32 + px[2] as f32) / 3.0)
                    .collect()
            }
        };
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn view(&self) -> RasterView<'_> {
        RasterView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    /// Extract a sub-raster. The rectangle must lie inside the raster.
    pub fn crop(&self, rect: RectU) -> Raster {
        self.view().crop(rect)
    }
}

impl<'a> RasterView<'a> {
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn crop(&self, rect: RectU) -> Raster {
        debug_assert!(rect.x + rect.width <= self.width);
        debug_assert!(rect.y + rect.height <= self.height);
        let mut data = Vec::with_capacity(rect.width * rect.height);
        for row in rect.y..rect.y + rect.height {
            let start = row * self.width + rect.x;
            data.extend_from_slice(&self.data[start..start + rect.width]);
        }
        Raster {
            width: rect.width,
            height: rect.height,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray16_is_rescaled_to_unit_range() {
        let r = Raster::from_frame(&FramePixels::Gray16(vec![0, 65535, 32767, 1]), 2, 2)
            .expect("convert");
        assert_eq!(r.at(0, 0), 0.0);
        assert_eq!(r.at(1, 0), 1.0);
        assert!((r.at(0, 1) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn rgb_uses_channel_mean() {
        let r = Raster::from_frame(&FramePixels::Rgb8(vec![30, 60, 90]), 1, 1).expect("convert");
        assert_eq!(r.at(0, 0), 60.0);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = Raster::from_frame(&FramePixels::Gray8(vec![0; 5]), 2, 2);
        assert!(matches!(
            err,
            Err(PixelFormatError::LengthMismatch { len: 5, .. })
        ));
    }

    #[test]
    fn crop_extracts_expected_window() {
        let mut r = Raster::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                r.set(x, y, (y * 4 + x) as f32);
            }
        }
        let c = r.crop(RectU::new(1, 2, 2, 2));
        assert_eq!(c.width, 2);
        assert_eq!(c.data, vec![9.0, 10.0, 13.0, 14.0]);
    }
}
