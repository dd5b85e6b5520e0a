//! Top-level entry point: engine setup, project lifecycle and the stages.

use chrono::NaiveDate;
use reconflow_core::RegionBounds;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::{
    gpu_mask, ChunkSetup, EngineSettings, PipelineConfig, PipelineError, ProjectIdentity,
    ProjectStateManager, ReconstructionEngine, Stage, StageFlags, StageOrchestrator, StageOutcome,
};

/// Caller inputs of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOptions {
    pub base_path: PathBuf,
    pub project_name: String,
    /// Image folder relative to `base_path`.
    pub image_folder: PathBuf,
    /// Image file suffix; `None` uses the configured default.
    pub image_type: Option<String>,
    pub dense_quality: String,
    /// Exact name of a project to resume; empty starts a new one.
    pub continue_name: String,
    pub flags: StageFlags,
    pub test_area: bool,
}

impl RunOptions {
    pub fn new(base_path: impl Into<PathBuf>, project_name: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            project_name: project_name.into(),
            image_folder: PathBuf::from("images"),
            image_type: None,
            dense_quality: "high".to_string(),
            continue_name: String::new(),
            flags: StageFlags::default(),
            test_area: false,
        }
    }
}

/// Summary of a successful run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub identity: ProjectIdentity,
    pub project_path: PathBuf,
    /// The project artifact was created by this run.
    pub created: bool,
    pub completed: Vec<Stage>,
    pub region: Option<RegionBounds>,
    pub exported: Vec<PathBuf>,
    pub notice: Option<String>,
}

impl RunReport {
    pub fn write_json(&self, path: &Path) -> Result<(), crate::ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Run the workflow against `engine`.
///
/// Once the project is open, any failure first saves the project and then
/// returns the original error. A failing rescue save is logged, not returned.
pub fn run_pipeline<E: ReconstructionEngine + ?Sized>(
    engine: &mut E,
    options: &RunOptions,
    config: &PipelineConfig,
    today: NaiveDate,
) -> Result<RunReport, PipelineError> {
    let manager = ProjectStateManager::new(config);
    let identity = manager.resolve_identity(
        &options.base_path,
        &options.project_name,
        &options.continue_name,
        today,
    );
    log::info!("project identity: {}", identity.name);

    let devices = engine.gpu_devices();
    for (i, device) in devices.iter().enumerate() {
        log::info!("compute device {i}: {device}");
    }
    engine.configure(&EngineSettings {
        gpu_mask: gpu_mask(devices.len()),
        cpu_enable: config.cpu_enable,
        log_path: identity.engine_log_path(config),
    })?;

    let handle = manager.open(engine, &identity)?;

    let staged = setup_and_run(engine, options, config, &identity);
    let outcome = match staged {
        Ok(outcome) => outcome,
        Err(err) => {
            log::error!("{err}; saving project before abort");
            if let Err(save_err) = manager.save(engine) {
                log::error!("saving {} failed: {save_err}", handle.path.display());
            }
            return Err(err);
        }
    };

    Ok(RunReport {
        identity,
        project_path: handle.path,
        created: handle.created,
        completed: outcome.completed,
        region: outcome.region,
        exported: outcome.exported,
        notice: outcome.notice,
    })
}

fn setup_and_run<E: ReconstructionEngine + ?Sized>(
    engine: &mut E,
    options: &RunOptions,
    config: &PipelineConfig,
    identity: &ProjectIdentity,
) -> Result<StageOutcome, PipelineError> {
    engine.setup_chunk(&ChunkSetup {
        crs_epsg: config.crs_epsg,
        camera_location_accuracy: config.camera_accuracy.location,
        camera_rotation_accuracy: config.camera_accuracy.rotation,
    })?;
    StageOrchestrator::new(engine, config, identity, options).run()
}
