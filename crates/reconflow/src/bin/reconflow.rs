use clap::Parser;
use log::LevelFilter;
use reconflow::{run_pipeline, PipelineConfig, RunOptions, SimulatedEngine, StageFlags};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Pipeline(#[from] reconflow::PipelineError),
    #[error(transparent)]
    Config(#[from] reconflow::pipeline::ConfigIoError),
}

/// Align photos, build dense products and export rasters for one project.
#[derive(Parser, Debug)]
#[command(name = "reconflow", version, about)]
struct Cli {
    /// Root directory of the project.
    #[arg(long)]
    base_path: PathBuf,

    /// Name of the project; a new project gets today's date appended.
    #[arg(long)]
    project_name: String,

    /// Location of the images relative to the base path.
    #[arg(long, default_value = "images")]
    image_folder: PathBuf,

    /// Image file suffix, e.g. `.JPG` or `.tif` (default from config: `.JPG`).
    #[arg(long)]
    image_type: Option<String>,

    /// Dense cloud quality: ultra, high, medium, low or lowest.
    #[arg(long, default_value = "high")]
    dense_cloud_quality: String,

    /// Export DEM and orthomosaic.
    #[arg(long)]
    with_export: bool,

    /// Align photos and filter the sparse cloud.
    #[arg(long)]
    step_one_align: bool,

    /// Build dense cloud, DEM and orthomosaic.
    #[arg(long)]
    step_two_dense_cloud: bool,

    /// Exact name of an earlier project to continue.
    #[arg(long, default_value = "")]
    continue_proj: String,

    /// Use the fixed test footprint when resizing the region.
    #[arg(long)]
    test_area: bool,

    /// Recompute the reconstruction region from the aligned cameras.
    #[arg(long)]
    resize_region: bool,

    /// Pipeline config JSON; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a JSON run report here.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON log lines (needs the `tracing` feature).
    #[arg(long)]
    json_log: bool,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            base_path: self.base_path.clone(),
            project_name: self.project_name.clone(),
            image_folder: self.image_folder.clone(),
            image_type: self.image_type.clone(),
            dense_quality: self.dense_cloud_quality.clone(),
            continue_name: self.continue_proj.clone(),
            flags: StageFlags {
                align_requested: self.step_one_align,
                dense_requested: self.step_two_dense_cloud,
                export_requested: self.with_export,
                resize_region: self.resize_region,
            },
            test_area: self.test_area,
        }
    }
}

#[cfg(feature = "tracing")]
fn init_tracing_if_requested(cli: &Cli) -> bool {
    if cli.json_log || std::env::var_os("RUST_LOG").is_some() {
        reconflow::init_tracing(cli.json_log);
        return true;
    }
    false
}

#[cfg(not(feature = "tracing"))]
fn init_tracing_if_requested(cli: &Cli) -> bool {
    if cli.json_log {
        eprintln!("--json-log needs the `tracing` feature; using plain logs");
    }
    false
}

fn init_logging(cli: &Cli) {
    if init_tracing_if_requested(cli) {
        return;
    }
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = reconflow::init_with_level(level);
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    if let Err(err) = try_main(&cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main(cli: &Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load_json(path)?,
        None => PipelineConfig::default(),
    };
    let options = cli.run_options();

    let mut engine = SimulatedEngine::new();
    let today = chrono::Local::now().date_naive();
    let report = run_pipeline(&mut engine, &options, &config, today)?;

    if let Some(notice) = &report.notice {
        println!("{notice}");
    }
    for path in &report.exported {
        println!("exported {}", path.display());
    }
    println!(
        "project {} ({})",
        report.project_path.display(),
        report
            .completed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    if let Some(path) = &cli.report {
        report.write_json(path)?;
    }
    Ok(())
}
