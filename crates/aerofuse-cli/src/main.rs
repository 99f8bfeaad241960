//! aerofuse CLI — tile preparation, mask fusion and mosaicking.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use aerofuse::{AnalysisConfig, OrthophotoService, Pipeline, TileKey};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "aerofuse")]
#[command(about = "Fuse building detection masks from oblique aerial images into ground tiles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select images and write tile crops plus descriptors.
    Prepare(CliPrepareArgs),

    /// Fuse detection masks of prepared tiles.
    Analyze(CliAnalyzeArgs),

    /// Mosaic tile results already on disk.
    Compose(CliComposeArgs),

    /// Project a single point through one image's camera.
    Project(CliProjectArgs),

    /// Download reference orthophotos for prepared tiles.
    Ortho(CliRunArgs),
}

#[derive(Debug, Clone, Args)]
struct CliRunArgs {
    /// Path to the analysis configuration (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Area folder; overrides the configured one.
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Worker threads (default: all cores).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct CliPrepareArgs {
    #[command(flatten)]
    run: CliRunArgs,

    /// Replace existing tile descriptors.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    #[command(flatten)]
    run: CliRunArgs,

    /// Analyze only this tile (`<x>_<y>`).
    #[arg(long)]
    tile: Option<TileKey>,

    /// Path to write a JSON run summary.
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliComposeArgs {
    #[command(flatten)]
    run: CliRunArgs,

    /// Output directory (default: `<folder>/mosaic`).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliProjectArgs {
    /// Path to the analysis configuration (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Image name as listed in the image index.
    #[arg(long)]
    image: String,

    /// World point to project into the image.
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    world: Option<Vec<f64>>,

    /// Image point to project onto the ground (requires --z).
    #[arg(long, num_args = 2, value_names = ["X", "Y"], conflicts_with = "world", requires = "z")]
    pixel: Option<Vec<f64>>,

    /// Ground height for --pixel.
    #[arg(long, allow_negative_numbers = true)]
    z: Option<f64>,
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
        Commands::Prepare(args) => run_prepare(&args),
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Compose(args) => run_compose(&args),
        Commands::Project(args) => run_project(&args),
        Commands::Ortho(args) => run_ortho(&args),
    }
}

fn load_config(path: &Path) -> CliResult<AnalysisConfig> {
    AnalysisConfig::from_json_file(path).map_err(|e| -> CliError {
        format!("failed to load config {}: {}", path.display(), e).into()
    })
}

impl CliRunArgs {
    fn pipeline(&self) -> CliResult<Pipeline> {
        if let Some(n) = self.threads {
            rayon::ThreadPoolBuilder::new().num_threads(n).build_global()?;
        }
        let config = load_config(&self.config)?;
        let mut pipeline = Pipeline::from_config(config)?;
        if let Some(folder) = &self.folder {
            pipeline = pipeline.with_folder(folder);
        }
        tracing::info!(
            "Catalog: {} images, area folder {}",
            pipeline.catalog().len(),
            pipeline.folder().display()
        );
        Ok(pipeline)
    }
}

// ── prepare ────────────────────────────────────────────────────────────

fn run_prepare(args: &CliPrepareArgs) -> CliResult<()> {
    let pipeline = args.run.pipeline()?.with_overwrite(args.overwrite);
    let descriptors = pipeline.prepare_area()?;
    tracing::info!("Prepared {} tiles", descriptors.len());
    Ok(())
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    let pipeline = args.run.pipeline()?;

    let report = match args.tile {
        Some(key) => {
            let outcome = pipeline.analyze_tile(key)?;
            aerofuse::AnalyzeReport {
                outcomes: vec![outcome],
                failures: Vec::new(),
            }
        }
        None => pipeline.analyze_area()?,
    };

    let fused = report.outcomes.iter().filter(|o| o.output.is_some()).count();
    tracing::info!(
        "Analyzed {} tiles ({} fused, {} empty, {} failed)",
        report.outcomes.len() + report.failures.len(),
        fused,
        report.outcomes.len() - fused,
        report.failures.len(),
    );

    if let Some(path) = &args.summary {
        let summary = serde_json::json!({
            "tiles": report.outcomes.iter().map(|o| serde_json::json!({
                "tile": o.key.to_string(),
                "fused": o.output.is_some(),
                "cameras_used": o.cameras_used.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "cameras_skipped": o.cameras_skipped.iter()
                    .map(|(c, why)| serde_json::json!({"camera": c.to_string(), "reason": why}))
                    .collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
            "failures": report.failures.iter()
                .map(|(k, e)| serde_json::json!({"tile": k.to_string(), "error": e.to_string()}))
                .collect::<Vec<_>>(),
        });
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        tracing::info!("Summary written to {}", path.display());
    }

    if !report.failures.is_empty() {
        for (key, err) in &report.failures {
            eprintln!("tile {key}: {err}");
        }
        return Err(format!("{} tiles failed", report.failures.len()).into());
    }
    Ok(())
}

// ── compose ────────────────────────────────────────────────────────────

fn run_compose(args: &CliComposeArgs) -> CliResult<()> {
    let pipeline = args.run.pipeline()?;
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| pipeline.folder().join("mosaic"));
    let written = pipeline.compose_from_disk(&out)?;
    if written.is_empty() {
        tracing::warn!("No tile results found under {}", pipeline.folder().display());
    }
    Ok(())
}

// ── project ────────────────────────────────────────────────────────────

fn run_project(args: &CliProjectArgs) -> CliResult<()> {
    let config = load_config(&args.config)?;
    let catalog = config.load_catalog()?;
    let record = catalog
        .get(&args.image)
        .ok_or_else(|| -> CliError { format!("image {} is not in the catalog", args.image).into() })?;

    let result = match (&args.world, &args.pixel, args.z) {
        (Some(w), _, _) => {
            let [x, y] = record.forward().project([w[0], w[1], w[2]])?;
            serde_json::json!({"image": record.name(), "world": w, "pixel": [x, y]})
        }
        (None, Some(p), Some(z)) => {
            let [x, y] = record.inverse().unproject([p[0], p[1]], z)?;
            serde_json::json!({"image": record.name(), "pixel": p, "world": [x, y, z]})
        }
        _ => return Err("provide --world X Y Z or --pixel X Y --z Z".into()),
    };
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

// ── ortho ──────────────────────────────────────────────────────────────

fn run_ortho(args: &CliRunArgs) -> CliResult<()> {
    let pipeline = args.pipeline()?;
    let service = OrthophotoService::new(pipeline.config().orthophoto.clone());
    let px = pipeline.config().tile.raster_px;

    let mut failed = 0usize;
    for key in pipeline.prepared_tiles()? {
        let tile = pipeline.tile(key);
        let path = pipeline.tile_dir(key).join("orthophoto.png");
        let res = service
            .fetch(&tile.bbox(), px, px)
            .map_err(CliError::from)
            .and_then(|img: image::RgbImage| img.save(&path).map_err(CliError::from));
        match res {
            Ok(()) => tracing::info!("Orthophoto written to {}", path.display()),
            Err(e) => {
                eprintln!("tile {key}: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(format!("{failed} orthophotos failed").into());
    }
    Ok(())
}
