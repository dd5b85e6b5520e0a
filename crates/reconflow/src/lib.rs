//! High-level facade for the `reconflow` workspace.
//!
//! Re-exports the geometry crate as [`core`] and the orchestration crate as
//! [`pipeline`], and lifts the most used items to the crate root.
//!
//! ```no_run
//! use reconflow::{run_pipeline, PipelineConfig, RunOptions, SimulatedEngine};
//!
//! let mut options = RunOptions::new("/data/site_a", "survey");
//! options.flags.align_requested = true;
//! options.flags.dense_requested = true;
//! options.flags.export_requested = true;
//!
//! let mut engine = SimulatedEngine::new();
//! let report = run_pipeline(
//!     &mut engine,
//!     &options,
//!     &PipelineConfig::default(),
//!     chrono::Local::now().date_naive(),
//! )?;
//! for path in &report.exported {
//!     println!("{}", path.display());
//! }
//! # Ok::<(), reconflow::PipelineError>(())
//! ```

pub use reconflow_core as core;
pub use reconflow_pipeline as pipeline;

pub use reconflow_core::{
    init_with_level, BoundingError, CameraRecord, ChunkGeometry, CoordinateSystem,
    GeographicCrs, Region, RegionBoundingCalculator, RegionBoundingParams, RegionBounds,
    SimilarityTransform,
};
pub use reconflow_pipeline::{
    run_pipeline, DenseQualityLevel, EngineError, PipelineConfig, PipelineError,
    ProjectIdentity, ReconstructionEngine, RunOptions, RunReport, SimulatedEngine, Stage,
    StageFlags, StageOrchestrator,
};

#[cfg(feature = "tracing")]
pub use reconflow_core::init_tracing;
