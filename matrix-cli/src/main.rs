use anyhow::{Context, Result};
use clap::Parser;
use hotspot_matrix::render::sizing::CellSizingEngine;
use hotspot_matrix::{
    ColorScheme, PipelineInputs, PipelineOptions, PipelineOutput, RenderOptions, ViewTier,
    ViewTiers, Viewport, records_from_reader, render_matrix, run,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Hotspot matrix - gene x cancer-type mutation frequency heatmap data
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "hotspot-matrix")]
#[command(about = "Reduce a mutation record dump to heatmap cells with an adaptive color scale", long_about = None)]
struct Cli {
    /// JSON array of mutation records
    #[arg(value_name = "INPUT_JSON")]
    input: PathBuf,

    /// Detail tier (overview, standard, detailed, complete)
    #[arg(short, long, default_value = "standard")]
    tier: String,

    /// Pick the most detailed tier that fits the viewport (overrides --tier)
    #[arg(long)]
    auto_tier: bool,

    /// Genes to hide (comma-separated, e.g., "TP53,KRAS")
    #[arg(long, value_delimiter = ',')]
    hide_gene: Vec<String>,

    /// Cancer types to hide (comma-separated)
    #[arg(long, value_delimiter = ',')]
    hide_cancer_type: Vec<String>,

    /// Minimum effective frequency; replaces the tier's own floor
    #[arg(long)]
    threshold: Option<f64>,

    /// Viewport width in pixels
    #[arg(long, default_value = "1200")]
    width: f64,

    /// Viewport height in pixels
    #[arg(long, default_value = "800")]
    height: f64,

    /// Maximum number of records passed to aggregation
    #[arg(long, default_value = "5000")]
    max_samples: usize,

    /// Sampler seed (defaults to a fixed seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Color scheme
    #[arg(short, long, value_enum, default_value = "heat")]
    scheme: SchemeArg,

    /// Write the JSON report here instead of stdout
    #[arg(short, long, value_name = "REPORT_PATH")]
    output: Option<PathBuf>,

    /// Also render a PNG preview of the matrix
    #[arg(long, value_name = "PNG_PATH")]
    preview: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum SchemeArg {
    /// White-blue through yellow and orange to dark red
    Heat,
    Viridis,
    Plasma,
    Inferno,
    Magma,
    Turbo,
    Cividis,
}

impl From<SchemeArg> for ColorScheme {
    fn from(scheme: SchemeArg) -> Self {
        match scheme {
            SchemeArg::Heat => ColorScheme::Heat,
            SchemeArg::Viridis => ColorScheme::Viridis,
            SchemeArg::Plasma => ColorScheme::Plasma,
            SchemeArg::Inferno => ColorScheme::Inferno,
            SchemeArg::Magma => ColorScheme::Magma,
            SchemeArg::Turbo => ColorScheme::Turbo,
            SchemeArg::Cividis => ColorScheme::Cividis,
        }
    }
}

/// JSON document written by the CLI
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    tier: &'a ViewTier,
    rejected_records: usize,
    /// Hex fill color per cell, in cell order
    cell_colors: Vec<String>,
    legend: Vec<LegendStop>,
    #[serde(flatten)]
    output: &'a PipelineOutput,
}

#[derive(Serialize)]
struct LegendStop {
    value: f64,
    color: String,
}

fn build_report<'a>(tier: &'a ViewTier, rejected_records: usize, output: &'a PipelineOutput) -> Report<'a> {
    let cell_colors = output
        .cells
        .iter()
        .filter_map(|cell| output.cell_color(cell))
        .map(|c| c.to_hex())
        .collect();
    let legend = output
        .color_scale
        .as_ref()
        .map(|scale| {
            scale
                .legend(6)
                .into_iter()
                .map(|(value, color)| LegendStop {
                    value,
                    color: color.to_hex(),
                })
                .collect()
        })
        .unwrap_or_default();
    Report {
        tier,
        rejected_records,
        cell_colors,
        legend,
        output,
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing subscriber with environment filter
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let start_time = Instant::now();
    let file = File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let ingested = records_from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse records from {}", args.input.display()))?;
    info!(
        "Loaded {} records from {} ({} rejected)",
        ingested.records.len(),
        args.input.display(),
        ingested.rejected
    );

    let options = PipelineOptions::new()
        .max_samples(args.max_samples)
        .seed(args.seed.unwrap_or(hotspot_matrix::reduce::sampling::DEFAULT_SEED))
        .color_scheme(ColorScheme::from(args.scheme))
        .build()
        .context("invalid pipeline options")?;

    let viewport = Viewport::new(args.width, args.height);
    let tiers = ViewTiers::default();
    let tier = if args.auto_tier {
        let hidden_genes = args.hide_gene.iter().cloned().collect();
        let hidden_cancer_types = args.hide_cancer_type.iter().cloned().collect();
        // rank candidates under the floor the run will actually use
        let candidates = tiers
            .with_frequency_threshold(args.threshold)
            .context("invalid --threshold")?;
        let recommended = candidates
            .recommend(
                &ingested.records,
                &hidden_genes,
                &hidden_cancer_types,
                viewport,
                &CellSizingEngine::new(options.sizing.clone()),
            )
            .context("tier table is empty")?;
        info!("Recommended tier: {}", recommended.name);
        tiers.get(&recommended.name)?.clone()
    } else {
        tiers
            .get(&args.tier)
            .with_context(|| format!("available tiers: {}", tiers.names().join(", ")))?
            .clone()
    };

    let inputs = PipelineInputs::new(ingested.records, tier, viewport)
        .with_hidden_genes(args.hide_gene)
        .with_hidden_cancer_types(args.hide_cancer_type)
        .with_frequency_threshold(args.threshold);
    let output = run(&inputs, &options).context("pipeline run failed")?;

    if !output.sizing.feasible {
        warn!(
            "{} x {} matrix is too dense for a {} x {} viewport; try a smaller tier",
            output.genes.len(),
            output.cancer_types.len(),
            args.width,
            args.height
        );
    }

    let report = build_report(&inputs.tier, ingested.rejected, &output);
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &report)?;
            writer.flush()?;
            info!("Report written to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &report)?;
            writeln!(writer)?;
        }
    }

    if let Some(path) = &args.preview {
        let bytes = render_matrix(&output, &RenderOptions::default())?;
        std::fs::write(path, &bytes)
            .with_context(|| format!("failed to write preview to {}", path.display()))?;
        info!("Preview written to {} ({} bytes)", path.display(), bytes.len());
    }

    debug!("Finished in {:?}", start_time.elapsed());
    Ok(())
}
