//! Multi-target frame tracking session.

mod error;
mod params;
mod pipeline;
mod ports;
mod result;

pub use error::TrackError;
pub use params::TrackConfig;
pub use pipeline::{run, TrackerSession};
pub use ports::{FailureDecision, FailurePolicy, FixedPolicy, Frame, FrameSource};
pub use result::{FrameOutcome, FrameOverlay, FrameRecord};
