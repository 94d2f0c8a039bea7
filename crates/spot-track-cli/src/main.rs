//! spot-track CLI — track a laser spot and four fiducial marks through a
//! folder of frames and print one displacement record per frame.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use log::warn;
use spot_track::{
    run, FailureDecision, FixedPolicy, Frame, FrameSource, InitialTemplate, MatchMetric,
    TrackConfig,
};
use spot_track_core::{init_with_level, FramePixels};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "spot-track")]
#[command(about = "Track a laser spot against four fiducial marks in an image sequence")]
#[command(version)]
struct Cli {
    /// Directory of frames, analyzed in file-name order.
    frames: PathBuf,

    /// JSON file with the five template seeds:
    /// [{"id": "Spot", "center": [x, y], "half_size": 8}, ...]
    #[arg(long)]
    templates: PathBuf,

    /// Matching metric.
    #[arg(long, value_enum, default_value_t = MetricArg::CorrCoeffNormed)]
    metric: MetricArg,

    /// Search half-width in pixels; 0 searches the whole frame.
    #[arg(long, default_value = "20")]
    radius: usize,

    /// Physical distance between adjacent marks; normalized coordinates are
    /// reported in this unit.
    #[arg(long, default_value = "1.0")]
    mark_dist: f64,

    /// Disable subpixel refinement.
    #[arg(long)]
    no_subpixel: bool,

    /// Decision applied when a target cannot be matched anywhere.
    #[arg(long, value_enum, default_value_t = FailureArg::Skip)]
    on_failure: FailureArg,

    /// Skip spot failures automatically from the start.
    #[arg(long)]
    auto_skip: bool,

    /// Spot search half-width cap under automatic skipping
    /// (default: ten times the radius).
    #[arg(long)]
    auto_skip_cap: Option<usize>,

    /// Seconds per frame when the source carries no timestamps.
    #[arg(long, default_value = "1.0")]
    time_step: f64,

    /// Write the full record sequence (including overlay data) as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MetricArg {
    SqDiff,
    SqDiffNormed,
    CrossCorr,
    CrossCorrNormed,
    CorrCoeff,
    CorrCoeffNormed,
}

impl MetricArg {
    fn to_core(self) -> MatchMetric {
        match self {
            Self::SqDiff => MatchMetric::SqDiff,
            Self::SqDiffNormed => MatchMetric::SqDiffNormed,
            Self::CrossCorr => MatchMetric::CrossCorr,
            Self::CrossCorrNormed => MatchMetric::CrossCorrNormed,
            Self::CorrCoeff => MatchMetric::CorrCoeff,
            Self::CorrCoeffNormed => MatchMetric::CorrCoeffNormed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FailureArg {
    Accept,
    Skip,
    Stop,
}

impl FailureArg {
    fn to_core(self) -> FailureDecision {
        match self {
            Self::Accept => FailureDecision::Accept,
            Self::Skip => FailureDecision::Skip,
            Self::Stop => FailureDecision::Stop,
        }
    }
}

const FRAME_EXTENSIONS: [&str; 6] = ["bmp", "jpeg", "jpg", "png", "tif", "tiff"];

/// Frames read lazily from a directory, ordered by file name.
struct FolderSource {
    files: Vec<PathBuf>,
}

impl FolderSource {
    fn scan(dir: &Path) -> CliResult<Self> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                    })
            })
            .collect();
        files.sort();
        Ok(Self { files })
    }
}

fn to_frame(img: image::DynamicImage) -> Frame {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let pixels = match img {
        image::DynamicImage::ImageLuma8(buf) => FramePixels::Gray8(buf.into_raw()),
        image::DynamicImage::ImageLuma16(buf) => FramePixels::Gray16(buf.into_raw()),
        other => FramePixels::Rgb8(other.to_rgb8().into_raw()),
    };
    Frame {
        width,
        height,
        pixels,
        seconds: None,
    }
}

impl FrameSource for FolderSource {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn frame(&mut self, index: usize) -> Option<Frame> {
        let path = &self.files[index];
        match image::open(path) {
            Ok(img) => Some(to_frame(img)),
            Err(err) => {
                warn!("{}: {err}", path.display());
                None
            }
        }
    }
}

fn load_seeds(path: &Path) -> CliResult<[InitialTemplate; 5]> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("{}: {err}", path.display()))?;
    let seeds: Vec<InitialTemplate> = serde_json::from_str(&text)
        .map_err(|err| format!("{}: {err}", path.display()))?;
    seeds
        .try_into()
        .map_err(|v: Vec<_>| format!("expected exactly five templates, got {}", v.len()).into())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = init_with_level(level);

    let seeds = load_seeds(&cli.templates)?;
    let mut source = FolderSource::scan(&cli.frames)?;
    if source.is_empty() {
        return Err(format!("no frames found in {}", cli.frames.display()).into());
    }

    let cfg = TrackConfig {
        metric: cli.metric.to_core(),
        search_radius: cli.radius,
        mark_dist: cli.mark_dist,
        subpixel: !cli.no_subpixel,
        auto_skip_default: cli.auto_skip,
        auto_skip_cap: cli.auto_skip_cap,
        time_step: cli.time_step,
        ..TrackConfig::default()
    };
    let records = run(cfg, &seeds, &mut source, FixedPolicy(cli.on_failure.to_core()))?;

    println!("index,seconds,x_abs,y_abs,dL,dx_pix,dy_pix,mark1,mark2,mark3,mark4,spot");
    for r in &records {
        println!(
            "{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.6},{:.6},{:.6},{:.6},{:.6}",
            r.index,
            r.seconds,
            r.x_abs,
            r.y_abs,
            r.dl,
            r.dx_pix,
            r.dy_pix,
            r.scores[0],
            r.scores[1],
            r.scores[2],
            r.scores[3],
            r.scores[4],
        );
    }

    if let Some(path) = &cli.json {
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &records)?;
    }
    Ok(())
}
