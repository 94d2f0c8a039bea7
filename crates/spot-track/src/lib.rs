//! Template-correlation tracking of a laser spot against four fiducial marks.
//!
//! A [`tracker::TrackerSession`] locates five templates in every frame of a
//! sequence, growing search windows geometrically on rejection, and reports
//! per-frame displacements plus a perspective-compensated spot coordinate
//! obtained by inverting the bilinear patch spanned by the marks.

pub mod matcher;
pub mod metric;
pub mod quad;
mod refine;
pub mod search;
pub mod target;
pub mod tracker;
pub mod validate;

pub use matcher::{
    match_template, match_template_along, self_match_score, MatchError, MatchLocation,
    ScoreSurface, SearchLine,
};
pub use metric::MatchMetric;
pub use quad::{NormalizedPoint, QuadNormalizer};
pub use search::{initial_window, SearchWindow, WindowGrowth};
pub use target::{InitialTemplate, Target, TargetId};
pub use tracker::{
    run, FailureDecision, FailurePolicy, FixedPolicy, Frame, FrameOutcome, FrameOverlay,
    FrameRecord, FrameSource, TrackConfig, TrackError, TrackerSession,
};
pub use validate::{validate_match, ThresholdTable};
