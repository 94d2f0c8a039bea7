use thiserror::Error;

use crate::matcher::MatchError;
use crate::target::TargetId;
use spot_track_core::PixelFormatError;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "template for {id} at ({cx:.1}, {cy:.1}) with half-size {half} \
         falls outside the {width}x{height} frame"
    )]
    TemplateOutOfBounds {
        id: TargetId,
        cx: f64,
        cy: f64,
        half: usize,
        width: usize,
        height: usize,
    },

    #[error("frame {index} is {width}x{height}, session reference is {ref_width}x{ref_height}")]
    FrameSizeMismatch {
        index: usize,
        width: usize,
        height: usize,
        ref_width: usize,
        ref_height: usize,
    },

    #[error("frame source produced no usable frames")]
    EmptySequence,

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    PixelFormat(#[from] PixelFormatError),
}
