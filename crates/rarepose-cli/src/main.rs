//! rarepose CLI: fit per-bone FB8 models and score pose rareness.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use rarepose::{
    Aggregation, Fb8Distribution, Fb8Family, Fb8Fitter, RarenessConfig, Skeleton, Spherical,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "rarepose")]
#[command(about = "Estimate how rare human poses are from per-bone FB8 direction models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit per-bone models on a corpus and score the same corpus.
    Fit(CliFitArgs),

    /// Score a corpus against previously fitted models.
    Score(CliScoreArgs),

    /// Print the skeleton bone table.
    SkeletonInfo {
        /// Skeleton JSON (`rarepose.skeleton.v1`); default MPI-INF-3DHP table.
        #[arg(long)]
        skeleton: Option<PathBuf>,
    },

    /// Convert a Cartesian vector to spherical coordinates (degrees).
    Spherical {
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long, allow_hyphen_values = true)]
        z: f64,
    },
}

/// Options shared by `fit` and `score`.
#[derive(Debug, Clone, Args)]
struct CommonArgs {
    /// Pose corpus JSON: array of {joints, label, metadata}.
    #[arg(long)]
    corpus: PathBuf,

    /// Skeleton JSON (`rarepose.skeleton.v1`); default MPI-INF-3DHP table.
    #[arg(long)]
    skeleton: Option<PathBuf>,

    /// Configuration JSON overlay; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for model and rareness files.
    #[arg(long)]
    res_dir: Option<PathBuf>,

    /// Toy run: output names carry a `toy` marker.
    #[arg(long)]
    toy: bool,

    /// How per-bone densities are combined into a pose score.
    #[arg(long, value_enum)]
    aggregation: Option<AggregationArg>,
}

#[derive(Debug, Clone, Args)]
struct CliFitArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Directory for per-bone density maps (PNG); disabled when omitted.
    #[arg(long)]
    figs_dir: Option<PathBuf>,

    /// Largest FB8 sub-family to fit.
    #[arg(long, value_enum)]
    family: Option<FamilyArg>,

    /// Maximum Nelder–Mead iterations per stage.
    #[arg(long)]
    max_iters: Option<usize>,

    /// Fit each bone on at most this many randomly chosen samples.
    #[arg(long)]
    max_samples: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct CliScoreArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Models JSON written by `rarepose fit`.
    #[arg(long)]
    models: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AggregationArg {
    LogLikelihood,
    DensitySum,
    DensityProduct,
}

impl AggregationArg {
    fn to_core(self) -> Aggregation {
        match self {
            Self::LogLikelihood => Aggregation::LogLikelihood,
            Self::DensitySum => Aggregation::DensitySum,
            Self::DensityProduct => Aggregation::DensityProduct,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FamilyArg {
    Fb5,
    Fb6,
    Fb8,
}

impl FamilyArg {
    fn to_core(self) -> Fb8Family {
        match self {
            Self::Fb5 => Fb8Family::Fb5,
            Self::Fb6 => Fb8Family::Fb6,
            Self::Fb8 => Fb8Family::Fb8,
        }
    }
}

fn load_skeleton(path: Option<&Path>) -> CliResult<Skeleton> {
    match path {
        Some(p) => {
            tracing::info!("Loading skeleton: {}", p.display());
            Ok(Skeleton::from_json_file(p)?)
        }
        None => Ok(Skeleton::default()),
    }
}

/// Configuration file (or defaults) with command-line overrides applied.
fn build_config(common: &CommonArgs, fit: Option<&CliFitArgs>) -> CliResult<RarenessConfig> {
    let mut config = match &common.config {
        Some(p) => RarenessConfig::from_json_file(p)?,
        None => RarenessConfig::default(),
    };

    if let Some(dir) = &common.res_dir {
        config.output.res_dir = dir.clone();
    }
    if common.toy {
        config.output.toy = true;
    }
    if let Some(agg) = common.aggregation {
        config.aggregation = agg.to_core();
    }

    if let Some(args) = fit {
        if let Some(dir) = &args.figs_dir {
            config.output.figs_dir = Some(dir.clone());
        }
        if let Some(family) = args.family {
            config.fit.family = family.to_core();
        }
        if let Some(n) = args.max_iters {
            config.fit.max_iters = n;
        }
        if args.max_samples.is_some() {
            config.fit.max_samples = args.max_samples;
        }
    }

    Ok(config)
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fit(args) => run_fit(&args),
        Commands::Score(args) => run_score(&args),
        Commands::SkeletonInfo { skeleton } => run_skeleton_info(skeleton.as_deref()),
        Commands::Spherical { x, y, z } => run_spherical(x, y, z),
    }
}

// ── fit ────────────────────────────────────────────────────────────────

fn run_fit(args: &CliFitArgs) -> CliResult<()> {
    let config = build_config(&args.common, Some(args))?;
    let skeleton = load_skeleton(args.common.skeleton.as_deref())?;

    tracing::info!("Loading corpus: {}", args.common.corpus.display());
    let corpus = rarepose::load_corpus(&args.common.corpus)?;
    tracing::info!("{} poses, {} bones", corpus.len(), skeleton.n_bones());

    let fitter = Fb8Fitter::new(config.fit.clone());
    let run = rarepose::calc_rareness(&corpus, &skeleton, &fitter, &config)?;

    for failure in &run.fit.failures {
        let label = skeleton
            .bone_label(failure.bone)
            .unwrap_or_else(|| failure.bone.to_string());
        tracing::warn!(
            "Bone {} ({}) not fitted: {}",
            failure.bone,
            label,
            failure.error
        );
    }
    tracing::info!(
        "Fitted {}/{} bones",
        run.fit.models.len(),
        skeleton.n_bones()
    );
    tracing::info!("Models written to {}", run.paths.models.display());
    tracing::info!("Rareness written to {}", run.paths.rareness.display());

    Ok(())
}

// ── score ──────────────────────────────────────────────────────────────

fn run_score(args: &CliScoreArgs) -> CliResult<()> {
    let config = build_config(&args.common, None)?;
    let skeleton = load_skeleton(args.common.skeleton.as_deref())?;

    tracing::info!("Loading models: {}", args.models.display());
    let models = rarepose::load_models::<Fb8Distribution>(&args.models)?;
    tracing::info!("Loading corpus: {}", args.common.corpus.display());
    let corpus = rarepose::load_corpus(&args.common.corpus)?;

    let scores = rarepose::calc_rareness_with_model(&corpus, &skeleton, &models, &config)?;
    let unscored = scores.records.iter().filter(|r| r.score.is_none()).count();
    tracing::info!(
        "Scored {} poses ({} without any scorable bone)",
        scores.records.len(),
        unscored
    );
    tracing::info!("Rareness written to {}", scores.path.display());

    Ok(())
}

// ── skeleton-info ──────────────────────────────────────────────────────

fn run_skeleton_info(path: Option<&Path>) -> CliResult<()> {
    let skeleton = load_skeleton(path)?;

    println!("rarepose skeleton");
    println!("  name:           {}", skeleton.name());
    println!("  joints:         {}", skeleton.n_joints());
    println!("  bones:          {}", skeleton.n_bones());
    println!("  min pose size:  {}", skeleton.min_pose_joints());
    for (i, pair) in skeleton.bone_pairs().iter().enumerate() {
        let label = skeleton.bone_label(i).unwrap_or_default();
        let root = if pair.is_root() { "  (root)" } else { "" };
        println!(
            "  bone {:>2}: {:>2} -> {:>2}  {}{}",
            i, pair.child, pair.parent, label, root
        );
    }

    Ok(())
}

// ── spherical ──────────────────────────────────────────────────────────

fn run_spherical(x: f64, y: f64, z: f64) -> CliResult<()> {
    match Spherical::from_cartesian([x, y, z]) {
        Some(s) => println!("{}", serde_json::to_string_pretty(&s)?),
        None => println!("null"),
    }
    Ok(())
}
