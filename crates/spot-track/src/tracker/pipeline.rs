//! Per-frame tracking pipeline.
//!
//! Fixed order within a frame: locate mark1 with window growth, shift the
//! remaining windows by mark1's observed deviation, locate marks 2-4 with a
//! single attempt each, locate the spot with window growth, normalize against
//! the mark quadrilateral and append one record. New displacements are staged
//! in locals and committed only when the whole frame succeeds, so a skipped
//! frame leaves the session exactly as the previous committed frame left it.

use log::{debug, info, warn};
use nalgebra::{Point2, Vector2};
use spot_track_core::{gaussian_blur, Raster, RasterView, RectU};

use crate::matcher::{match_template, self_match_score};
use crate::metric::MatchMetric;
use crate::quad::QuadNormalizer;
use crate::search::{initial_window, SearchWindow, WindowGrowth};
use crate::target::{InitialTemplate, Target, TargetId, BLUR_ACCURACY, BLUR_SIGMA};
use crate::tracker::params::TrackConfig;
use crate::tracker::ports::{FailureDecision, FailurePolicy, Frame, FrameSource};
use crate::tracker::result::{FrameOutcome, FrameOverlay, FrameRecord};
use crate::tracker::TrackError;
use crate::validate::{validate_match, ThresholdTable};

const SPOT: usize = 4;
const CONSECUTIVE_SKIPS_BEFORE_OFFER: u32 = 3;

/// An accepted (or best-so-far) match in frame coordinates.
#[derive(Clone, Copy, Debug)]
struct Located {
    /// Displacement of the target from its reference rectangle.
    dis: Vector2<f64>,
    score: f64,
    window: RectU,
    footprint: RectU,
}

enum Search {
    Found(Located),
    Exhausted { best: Option<Located> },
}

enum Resolved {
    Commit(Located),
    Skip,
    Stop,
}

#[derive(Clone, Copy, Debug)]
struct AutoSkip {
    active: bool,
    cap: usize,
    consecutive_skips: u32,
}

/// Stateful tracking session over one frame sequence.
///
/// Owns all mutable tracking state; frames must be analyzed strictly in
/// order, each building on the previous committed frame.
pub struct TrackerSession<P: FailurePolicy> {
    cfg: TrackConfig,
    policy: P,
    /// `TargetId::ALL` order: mark1..mark4, then the spot.
    targets: [Target; 5],
    thresholds: ThresholdTable,
    normalizer: QuadNormalizer,
    ref_width: usize,
    ref_height: usize,
    seconds: f64,
    ref_seconds: Option<f64>,
    timeline_fallback: bool,
    auto_skip: AutoSkip,
    trajectory: Vec<Point2<f64>>,
}

fn attempt(
    raster: &Raster,
    template: RasterView<'_>,
    rect: RectU,
    ideal: f64,
    window: SearchWindow,
    metric: MatchMetric,
    subpixel: bool,
    thresholds: &ThresholdTable,
) -> Result<(Located, bool), TrackError> {
    let mut crop = raster.crop(window.rect);
    gaussian_blur(&mut crop, BLUR_SIGMA, BLUR_ACCURACY);
    let m = match_template(crop.view(), template, metric, subpixel)?;
    let valid = validate_match(
        m.score,
        ideal,
        metric,
        m.x,
        m.y,
        window.span,
        rect.width,
        thresholds,
    );
    let located = Located {
        dis: Vector2::new(
            window.rect.x as f64 + m.x - rect.x as f64,
            window.rect.y as f64 + m.y - rect.y as f64,
        ),
        score: m.score,
        window: window.rect,
        footprint: RectU::new(
            window.rect.x + m.x.round().max(0.0) as usize,
            window.rect.y + m.y.round().max(0.0) as usize,
            template.width,
            template.height,
        ),
    };
    Ok((located, valid))
}

fn better(metric: MatchMetric, candidate: f64, incumbent: f64) -> bool {
    if metric.is_minimized() {
        candidate < incumbent
    } else {
        candidate > incumbent
    }
}

impl<P: FailurePolicy> TrackerSession<P> {
    /// Build a session from the reference frame and emit its record.
    ///
    /// Extracts and smooths the five reference templates, computes their
    /// ideal scores and checks that the spot template plus the search radius
    /// fits inside the frame.
    pub fn new(
        cfg: TrackConfig,
        seeds: &[InitialTemplate; 5],
        index: usize,
        reference: &Frame,
        policy: P,
    ) -> Result<(Self, FrameRecord), TrackError> {
        cfg.validate()?;
        let raster = Raster::from_frame(&reference.pixels, reference.width, reference.height)?;

        let mut targets: Vec<Target> = Vec::with_capacity(5);
        for id in TargetId::ALL {
            let seed = seeds
                .iter()
                .find(|s| s.id == id)
                .ok_or_else(|| TrackError::InvalidConfig(format!("missing template for {id}")))?;
            let grows = matches!(id, TargetId::Spot | TargetId::Mark1);
            targets.push(Target::extract(raster.view(), seed, cfg.metric, grows)?);
        }
        let targets: [Target; 5] = targets
            .try_into()
            .map_err(|_| TrackError::InvalidConfig("expected five templates".into()))?;

        let r = cfg.search_radius;
        if r > 0 {
            let spot = &targets[SPOT];
            if spot.rect.x < r
                || spot.rect.y < r
                || spot.rect.x + spot.rect.width + r > reference.width
                || spot.rect.y + spot.rect.height + r > reference.height
            {
                return Err(TrackError::InvalidConfig(format!(
                    "spot template plus search radius {r} does not fit the \
                     {}x{} frame",
                    reference.width, reference.height
                )));
            }
        }

        let auto_skip = AutoSkip {
            active: cfg.auto_skip_default,
            cap: cfg.effective_auto_skip_cap(),
            consecutive_skips: 0,
        };
        let mut normalizer = QuadNormalizer::new(cfg.mark_dist);
        let marks = [
            targets[0].predicted(),
            targets[1].predicted(),
            targets[2].predicted(),
            targets[3].predicted(),
        ];
        let spot_pos = targets[SPOT].predicted();
        let normalized = normalizer.normalize(marks, spot_pos);

        info!(
            "session start: metric {:?}, radius {}, spot at ({:.1}, {:.1})",
            cfg.metric, cfg.search_radius, spot_pos.x, spot_pos.y
        );

        let record = FrameRecord {
            index,
            seconds: 0.0,
            displacements: [Vector2::zeros(); 5],
            scores: [
                targets[0].ideal,
                targets[1].ideal,
                targets[2].ideal,
                targets[3].ideal,
                targets[SPOT].ideal,
            ],
            dx_pix: 0.0,
            dy_pix: 0.0,
            x_abs: normalized.x_abs,
            y_abs: normalized.y_abs,
            dl: normalized.dl,
            overlay: FrameOverlay {
                footprints: targets.iter().map(|t| t.rect).collect(),
                windows: targets.iter().map(|t| t.rect).collect(),
                trajectory: vec![spot_pos],
            },
        };
        let thresholds = cfg.thresholds;
        let session = Self {
            ref_width: reference.width,
            ref_height: reference.height,
            seconds: 0.0,
            ref_seconds: reference.seconds,
            timeline_fallback: reference.seconds.is_none(),
            auto_skip,
            trajectory: vec![spot_pos],
            cfg,
            policy,
            targets,
            thresholds,
            normalizer,
        };
        Ok((session, record))
    }

    pub fn reference_size(&self) -> (usize, usize) {
        (self.ref_width, self.ref_height)
    }

    fn next_seconds(&self, stamp: Option<f64>) -> (f64, bool) {
        if !self.timeline_fallback {
            if let (Some(s), Some(r)) = (stamp, self.ref_seconds) {
                return (s - r, false);
            }
        }
        (self.seconds + self.cfg.time_step, true)
    }

    /// Search with geometric window growth (mark1 and the spot).
    fn locate_grow(
        &self,
        raster: &Raster,
        slot: usize,
        ideal: f64,
        predicted: Point2<f64>,
        cap: Option<usize>,
    ) -> Result<Search, TrackError> {
        let t = &self.targets[slot];
        let window = initial_window(
            predicted,
            t.rect.width,
            self.cfg.search_radius,
            self.ref_width,
            self.ref_height,
        );
        let mut growth = WindowGrowth::new(self.cfg.search_radius, cap);
        let mut best: Option<Located> = None;
        let mut window = Some(window);
        while let Some(w) = window {
            if w.rect.width >= t.rect.width && w.rect.height >= t.rect.height {
                let (loc, valid) = attempt(
                    raster,
                    t.template.view(),
                    t.rect,
                    ideal,
                    w,
                    self.cfg.metric,
                    self.cfg.subpixel,
                    &self.thresholds,
                )?;
                if valid {
                    return Ok(Search::Found(loc));
                }
                debug!(
                    "{}: rejected at half-width {} (score {:.4}, ideal {:.4})",
                    t.id,
                    growth.half(),
                    loc.score,
                    ideal
                );
                if best.is_none() || better(self.cfg.metric, loc.score, best.unwrap().score) {
                    best = Some(loc);
                }
            }
            window = growth.grow(predicted, t.rect.width, self.ref_width, self.ref_height);
        }
        Ok(Search::Exhausted { best })
    }

    /// Single-attempt search (marks 2-4).
    fn locate_once(
        &self,
        raster: &Raster,
        slot: usize,
        predicted: Point2<f64>,
    ) -> Result<Search, TrackError> {
        let t = &self.targets[slot];
        let window = initial_window(
            predicted,
            t.rect.width,
            self.cfg.search_radius,
            self.ref_width,
            self.ref_height,
        );
        let (loc, valid) = attempt(
            raster,
            t.template.view(),
            t.rect,
            t.ideal,
            window,
            self.cfg.metric,
            self.cfg.subpixel,
            &self.thresholds,
        )?;
        if valid {
            Ok(Search::Found(loc))
        } else {
            Ok(Search::Exhausted { best: Some(loc) })
        }
    }

    /// Consult the failure policy after an exhausted search.
    fn resolve_failure(
        &mut self,
        slot: usize,
        best: Option<Located>,
        ideal: f64,
        frame_index: usize,
    ) -> Resolved {
        let id = self.targets[slot].id;
        warn!("{id}: search exhausted at frame {frame_index}");
        match self.policy.resolve(id, frame_index) {
            FailureDecision::Accept => match best {
                Some(loc) => {
                    self.thresholds.relax(self.cfg.metric, loc.score, ideal);
                    info!(
                        "{id}: accepted despite score {:.4}, threshold relaxed to {:.4}",
                        loc.score,
                        self.thresholds.get(self.cfg.metric)
                    );
                    Resolved::Commit(loc)
                }
                None => {
                    warn!("{id}: nothing to accept, skipping frame {frame_index}");
                    Resolved::Skip
                }
            },
            FailureDecision::Skip => Resolved::Skip,
            FailureDecision::Stop => Resolved::Stop,
        }
    }

    /// Bookkeeping for a spot skip; may enable automatic skipping.
    fn note_spot_skip(&mut self) {
        self.auto_skip.consecutive_skips += 1;
        if self.auto_skip.consecutive_skips >= CONSECUTIVE_SKIPS_BEFORE_OFFER {
            self.auto_skip.consecutive_skips = 0;
            if !self.auto_skip.active {
                if let Some(cap) = self
                    .policy
                    .offer_auto_skip(self.cfg.effective_auto_skip_cap())
                {
                    info!("automatic spot skipping enabled, half-width cap {cap}");
                    self.auto_skip.active = true;
                    self.auto_skip.cap = cap;
                }
            }
        }
    }

    /// Analyze one frame against the last committed state.
    pub fn analyze_frame(
        &mut self,
        index: usize,
        frame: &Frame,
    ) -> Result<FrameOutcome, TrackError> {
        if frame.width != self.ref_width || frame.height != self.ref_height {
            return Err(TrackError::FrameSizeMismatch {
                index,
                width: frame.width,
                height: frame.height,
                ref_width: self.ref_width,
                ref_height: self.ref_height,
            });
        }
        let raster = Raster::from_frame(&frame.pixels, frame.width, frame.height)?;
        let (seconds, fallback) = self.next_seconds(frame.seconds);

        // mark1 anchors the frame's global motion estimate
        let m1_ideal = self.targets[0].ideal;
        let m1 = match self.locate_grow(&raster, 0, m1_ideal, self.targets[0].predicted(), None)? {
            Search::Found(loc) => loc,
            Search::Exhausted { best } => {
                match self.resolve_failure(0, best, m1_ideal, index) {
                    Resolved::Commit(loc) => loc,
                    Resolved::Skip => return Ok(FrameOutcome::Skipped),
                    Resolved::Stop => return Ok(FrameOutcome::Stopped),
                }
            }
        };
        let shift = m1.dis - self.targets[0].dis;

        let mut located: [Option<Located>; 5] = [Some(m1), None, None, None, None];
        for slot in 1..=3 {
            let predicted = self.targets[slot].predicted() + shift;
            let loc = match self.locate_once(&raster, slot, predicted)? {
                Search::Found(loc) => loc,
                Search::Exhausted { best } => {
                    let ideal = self.targets[slot].ideal;
                    match self.resolve_failure(slot, best, ideal, index) {
                        Resolved::Commit(loc) => loc,
                        Resolved::Skip => return Ok(FrameOutcome::Skipped),
                        Resolved::Stop => return Ok(FrameOutcome::Stopped),
                    }
                }
            };
            located[slot] = Some(loc);
        }

        // ideal score for the spot is rederived every frame
        let spot_ideal = self_match_score(
            self.targets[SPOT].template.view(),
            self.cfg.metric.ideal_metric(),
        )?;
        let spot_cap = self.auto_skip.active.then_some(self.auto_skip.cap);
        let spot_pred = self.targets[SPOT].predicted() + shift;
        let spot = match self.locate_grow(&raster, SPOT, spot_ideal, spot_pred, spot_cap)? {
            Search::Found(loc) => loc,
            Search::Exhausted { best } => {
                if self.auto_skip.active {
                    debug!("spot: skipped automatically at frame {index}");
                    return Ok(FrameOutcome::Skipped);
                }
                match self.resolve_failure(SPOT, best, spot_ideal, index) {
                    Resolved::Commit(loc) => loc,
                    Resolved::Skip => {
                        self.note_spot_skip();
                        return Ok(FrameOutcome::Skipped);
                    }
                    Resolved::Stop => return Ok(FrameOutcome::Stopped),
                }
            }
        };
        located[SPOT] = Some(spot);
        self.auto_skip.consecutive_skips = 0;
        if !self.cfg.auto_skip_default {
            self.auto_skip.active = false;
        }

        // all five found: commit
        let locs: Vec<Located> = located.into_iter().map(|l| l.expect("located")).collect();
        let mut positions = [Point2::origin(); 5];
        for (slot, loc) in locs.iter().enumerate() {
            let t = &mut self.targets[slot];
            t.dis = loc.dis;
            if t.baseline.is_none() {
                t.baseline = Some(loc.dis);
            }
            positions[slot] = t.predicted();
        }
        let normalized = self.normalizer.normalize(
            [positions[0], positions[1], positions[2], positions[3]],
            positions[SPOT],
        );
        self.seconds = seconds;
        self.timeline_fallback |= fallback;
        self.trajectory.push(positions[SPOT] - locs[0].dis);

        let displacements = [
            self.targets[0].reported_dis(),
            self.targets[1].reported_dis(),
            self.targets[2].reported_dis(),
            self.targets[3].reported_dis(),
            self.targets[SPOT].reported_dis(),
        ];
        let record = FrameRecord {
            index,
            seconds,
            displacements,
            scores: [
                locs[0].score,
                locs[1].score,
                locs[2].score,
                locs[3].score,
                locs[SPOT].score,
            ],
            dx_pix: displacements[SPOT].x - displacements[0].x,
            dy_pix: displacements[SPOT].y - displacements[0].y,
            x_abs: normalized.x_abs,
            y_abs: normalized.y_abs,
            dl: normalized.dl,
            overlay: FrameOverlay {
                footprints: locs.iter().map(|l| l.footprint).collect(),
                windows: locs.iter().map(|l| l.window).collect(),
                trajectory: self.trajectory.clone(),
            },
        };
        debug!(
            "frame {index}: x_abs {:.3}, y_abs {:.3}, dL {:.3}",
            record.x_abs, record.y_abs, record.dl
        );
        Ok(FrameOutcome::Committed(record))
    }
}

/// Drive a session over a whole frame source.
///
/// The first usable frame becomes the reference; unusable or wrong-sized
/// frames are dropped from the sequence.
pub fn run<S, P>(
    cfg: TrackConfig,
    seeds: &[InitialTemplate; 5],
    source: &mut S,
    policy: P,
) -> Result<Vec<FrameRecord>, TrackError>
where
    S: FrameSource,
    P: FailurePolicy,
{
    let n = source.len();
    let mut reference = None;
    for index in 0..n {
        if let Some(frame) = source.frame(index) {
            reference = Some((index, frame));
            break;
        }
        warn!("frame {index} unusable, dropped");
    }
    let Some((ref_index, ref_frame)) = reference else {
        return Err(TrackError::EmptySequence);
    };
    let (mut session, first) = TrackerSession::new(cfg, seeds, ref_index, &ref_frame, policy)?;
    let mut records = vec![first];
    for index in ref_index + 1..n {
        let Some(frame) = source.frame(index) else {
            warn!("frame {index} unusable, dropped");
            continue;
        };
        if (frame.width, frame.height) != session.reference_size() {
            warn!(
                "frame {index} is {}x{}, expected {}x{}, dropped",
                frame.width,
                frame.height,
                session.reference_size().0,
                session.reference_size().1
            );
            continue;
        }
        match session.analyze_frame(index, &frame)? {
            FrameOutcome::Committed(record) => records.push(record),
            FrameOutcome::Skipped => {}
            FrameOutcome::Stopped => break,
        }
    }
    Ok(records)
}
