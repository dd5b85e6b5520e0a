use reconflow_core::BoundingError;
use std::path::PathBuf;

use crate::{ConfigIoError, EngineError};

/// Errors that end an orchestration run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("no '{image_type}' files found in {folder}")]
    NoImagesFound { folder: PathBuf, image_type: String },

    #[error("reference file not found: {path}")]
    MissingReferenceFile { path: PathBuf },

    #[error("reference file {path} has no data rows")]
    EmptyReferenceFile { path: PathBuf },

    #[error(
        "reference file has different source image types (given: {expected}, first image: {first_image})"
    )]
    ReferenceTypeMismatch {
        expected: String,
        first_image: String,
    },

    #[error("reference file {path} is unreadable: {source}")]
    ReferenceRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot create project {path}: {source}")]
    ProjectCreate {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Bounding(#[from] BoundingError),

    #[error("config: {0}")]
    Config(#[from] ConfigIoError),
}

impl PipelineError {
    /// Input validation failures detected before any expensive engine call.
    pub fn is_fatal_with_save(&self) -> bool {
        matches!(
            self,
            PipelineError::NoImagesFound { .. }
                | PipelineError::MissingReferenceFile { .. }
                | PipelineError::EmptyReferenceFile { .. }
                | PipelineError::ReferenceTypeMismatch { .. }
                | PipelineError::ReferenceRead { .. }
        )
    }
}
