use anyhow::{Context, Result};
use clap::Parser;
use ndarray::Array4;
use partlens::attribution::{PrecomputedAttribution, PrecomputedEvidence};
use partlens::segmentation::Preprocessor;
use partlens::{
    loader, EmptyMaskPolicy, EngineConfig, EngineVariant, Explainer, MassBaseline,
    PartImportanceEngine,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Score the parts an explanation points at", long_about = None)]
struct Args {
    /// Category-colored segmentation map of the input image
    #[arg(short, long)]
    segmentation: PathBuf,

    /// JSON list of {"color": [r, g, b], "part": "..."} entries
    #[arg(short, long)]
    parts: PathBuf,

    /// Saved dense attribution map (JSON array of rows)
    #[arg(long, conflicts_with = "evidence", required_unless_present = "evidence")]
    attribution: Option<PathBuf>,

    /// Saved prototype evidence (JSON with img_size and prototypes)
    #[arg(long)]
    evidence: Option<PathBuf>,

    /// Input image; only its shape matters to saved attributions
    #[arg(long)]
    image: Option<PathBuf>,

    /// attribution, prototype-attrib-like or prototype-area-averaged
    #[arg(long, default_value = "attribution")]
    variant: EngineVariant,

    /// Relative-threshold mass for prototype-attrib-like: box-coverage or signal
    #[arg(long, default_value = "box-coverage")]
    baseline: MassBaseline,

    /// Target class the attribution explains
    #[arg(short, long, default_value_t = 0)]
    target: usize,

    /// Include the 50 background sub-regions
    #[arg(long)]
    with_bg: bool,

    /// Fail instead of scoring 0 when an area-averaged part has no pixels
    #[arg(long)]
    strict_empty_mask: bool,

    /// Comma-separated thresholds (default: 80 points over [0.01, 0.50])
    #[arg(long, value_delimiter = ',')]
    thresholds: Vec<f64>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // Logs go to stderr so the report on stdout stays parseable
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("partlens starting");
    tracing::info!("Variant: {}", args.variant);

    let colors = loader::load_part_colors(&args.parts).context("Failed to load part colors")?;
    tracing::info!("Loaded {} part colors", colors.len());

    let (explainer, grid_size) = load_explainer(&args)?;
    let (height, width) = grid_size;

    let part_map = loader::load_segmentation(&args.segmentation, Some((width as u32, height as u32)))
        .context("Failed to load segmentation map")?;

    let image = match &args.image {
        Some(path) => {
            let render = image::open(path)
                .with_context(|| format!("Failed to open image {}", path.display()))?
                .to_rgb8();
            Preprocessor::new(width as u32, height as u32).preprocess(&render)?
        }
        None => Array4::zeros((1, 3, height, width)),
    };

    let mut config = EngineConfig::new(args.variant).with_baseline(args.baseline);
    if args.strict_empty_mask {
        config = config.with_empty_mask(EmptyMaskPolicy::Error);
    }
    if !args.thresholds.is_empty() {
        config = config.with_thresholds(args.thresholds.clone());
    }
    let thresholds = config.thresholds.clone();

    let mut engine = PartImportanceEngine::new(explainer, config)
        .context("Explainer does not fit the selected variant")?;
    let report = engine
        .sweep(&image, &part_map, args.target, &colors, &thresholds, args.with_bg)
        .context("Failed to compute part importance")?;

    tracing::info!(
        "Scored {} parts over {} thresholds",
        report.part_importance.len(),
        report.thresholds.len()
    );

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);

    Ok(())
}

/// Replay a saved attribution; returns the explainer and its grid as (height, width)
fn load_explainer(args: &Args) -> Result<(Explainer, (usize, usize))> {
    if let Some(path) = &args.evidence {
        let (img_size, evidence) =
            loader::load_evidence(path).context("Failed to load prototype evidence")?;
        tracing::info!("Loaded {} prototypes at {}x{}", evidence.len(), img_size, img_size);
        let explainer = Explainer::prototype(PrecomputedEvidence::new(img_size, evidence));
        return Ok((explainer, (img_size, img_size)));
    }

    let path = args
        .attribution
        .as_ref()
        .context("Either --attribution or --evidence is required")?;
    let grid = loader::load_dense_grid(path).context("Failed to load attribution map")?;
    let dims = grid.dim();
    tracing::info!("Loaded {}x{} attribution map", dims.0, dims.1);
    let explainer =
        Explainer::pixel(PrecomputedAttribution::from_grid(grid).for_target(args.target));
    Ok((explainer, dims))
}
