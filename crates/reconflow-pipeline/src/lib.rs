//! Stage orchestration for photogrammetry reconstruction runs.
//!
//! A run resolves a project identity, creates the project artifact if it is
//! missing, then walks the requested stages against a [`ReconstructionEngine`]:
//!
//! 1. **align**: discover images, validate and import the reference file,
//!    match photos and align cameras;
//! 2. **filter**: prune the sparse cloud by reprojection error and projection
//!    accuracy, re-optimizing cameras after each pass;
//! 3. **resize region** (optional): recompute the reconstruction region from
//!    the aligned cameras;
//! 4. **dense**: depth maps, dense cloud, DEM and orthomosaic;
//! 5. **export**: DEM and orthomosaic rasters next to the project.
//!
//! The project is saved after every stage, and [`run_pipeline`] saves it once
//! more before returning any error.
//!
//! [`SimulatedEngine`] implements the engine contract with synthetic geometry
//! and a JSON project document.
//!
//! ```no_run
//! use reconflow_pipeline::{run_pipeline, PipelineConfig, RunOptions, SimulatedEngine};
//!
//! let mut options = RunOptions::new("/data/site_a", "survey");
//! options.flags.align_requested = true;
//!
//! let mut engine = SimulatedEngine::new();
//! let today = chrono::Local::now().date_naive();
//! let report = run_pipeline(&mut engine, &options, &PipelineConfig::default(), today)?;
//! println!("{} -> {:?}", report.identity.name, report.completed);
//! # Ok::<(), reconflow_pipeline::PipelineError>(())
//! ```

mod config;
mod engine;
mod error;
mod images;
mod orchestrator;
mod project;
mod reference;
mod run;
mod sim;
mod stage;

pub use config::{
    CameraAccuracy, ConfigIoError, DenseQualityTable, MatchingParams, PipelineConfig,
    SparseFilterParams,
};
pub use engine::{
    gpu_mask, ChunkSetup, DataSource, EngineError, EngineSettings, ExportRasterOptions,
    FilterCriterion, FilterMode, ImageCompression, MatchPhotosOptions, RasterFormat,
    ReconstructionEngine, ReferenceFormat,
};
pub use error::PipelineError;
pub use images::discover_images;
pub use orchestrator::{StageOrchestrator, StageOutcome, NO_STAGE_NOTICE};
pub use project::{IdentityOrigin, ProjectHandle, ProjectIdentity, ProjectStateManager};
pub use reference::{
    read_reference_entries, ReferenceEntry, ReferenceValidator, REFERENCE_DELIMITER,
};
pub use run::{run_pipeline, RunOptions, RunReport};
pub use sim::{
    ChunkState, DepthMapsInfo, ModelInfo, ProjectDocument, Raster, SimulatedEngine, TiePoint,
    NO_DATA,
};
pub use stage::{DenseQualityLevel, Stage, StageFlags};
