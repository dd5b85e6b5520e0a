//! Contract of the reconstruction engine.
//!
//! The engine owns the heavy lifting (matching, bundle adjustment, depth maps,
//! rasterization) and the open project document with its active chunk. The
//! orchestrator only sequences calls into it. All calls are synchronous and
//! may block for a long time.

use reconflow_core::ChunkGeometry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors reported by an engine.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("no project is open")]
    NoProjectOpen,
    #[error("project document {path} has no chunk")]
    NoChunk { path: PathBuf },
    #[error("chunk has no photos")]
    NoPhotos,
    #[error("photos have not been matched")]
    NotMatched,
    #[error("chunk has no aligned cameras")]
    NotAligned,
    #[error("missing {0}; build it before this step")]
    MissingProduct(&'static str),
    #[error("projection EPSG:{0} is not supported")]
    UnsupportedProjection(u32),
}

/// Process-wide engine settings applied before a project is opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Bit mask of enabled GPU devices.
    pub gpu_mask: u32,
    pub cpu_enable: bool,
    /// Engine log destination.
    pub log_path: PathBuf,
}

/// Bit mask enabling the first `devices` GPUs.
pub fn gpu_mask(devices: usize) -> u32 {
    match devices {
        0 => 0,
        n if n >= 32 => u32::MAX,
        n => (1u32 << n) - 1,
    }
}

/// Reference data setup of the active chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkSetup {
    pub crs_epsg: u32,
    /// Camera position accuracy in metres.
    pub camera_location_accuracy: [f64; 3],
    /// Camera orientation accuracy in degrees.
    pub camera_rotation_accuracy: [f64; 3],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceFormat {
    Csv,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPhotosOptions {
    pub downscale: u32,
    pub generic_preselection: bool,
    pub reference_preselection: bool,
    pub keypoint_limit: u32,
    pub tiepoint_limit: u32,
}

/// Statistic used to prune sparse points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterCriterion {
    ReprojectionError,
    ProjectionAccuracy,
}

/// Depth map filtering strength.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    NoFiltering,
    Mild,
    Moderate,
    Aggressive,
}

/// Chunk product used as input for another step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    PointCloud,
    DenseCloud,
    ElevationData,
    OrthomosaicData,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterFormat {
    Tiff,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCompression {
    pub tiff_big: bool,
}

/// One raster export.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportRasterOptions {
    pub path: PathBuf,
    pub source: DataSource,
    /// EPSG code of the output projection.
    pub projection_epsg: u32,
    pub compression: Option<ImageCompression>,
    pub format: RasterFormat,
}

/// Operations the orchestrator drives.
///
/// Geometry access for region bounding comes from the [`ChunkGeometry`]
/// supertrait.
pub trait ReconstructionEngine: ChunkGeometry {
    /// Names of the compute devices the engine can use.
    fn gpu_devices(&self) -> Vec<String>;

    fn configure(&mut self, settings: &EngineSettings) -> Result<(), EngineError>;

    /// Create and persist a new document with exactly one empty chunk.
    fn create_project(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Open an existing document read-write; its first chunk becomes active.
    fn open_project(&mut self, path: &Path) -> Result<(), EngineError>;

    fn save_project(&mut self) -> Result<(), EngineError>;

    fn setup_chunk(&mut self, setup: &ChunkSetup) -> Result<(), EngineError>;

    fn add_photos(&mut self, paths: &[PathBuf]) -> Result<(), EngineError>;

    fn import_reference(
        &mut self,
        path: &Path,
        delimiter: char,
        format: ReferenceFormat,
    ) -> Result<(), EngineError>;

    fn match_photos(&mut self, options: &MatchPhotosOptions) -> Result<(), EngineError>;

    fn align_cameras(&mut self) -> Result<(), EngineError>;

    /// Remove sparse points whose `criterion` exceeds `threshold`.
    fn filter_points(
        &mut self,
        criterion: FilterCriterion,
        threshold: f64,
    ) -> Result<(), EngineError>;

    fn optimize_cameras(&mut self) -> Result<(), EngineError>;

    fn build_model(&mut self, source: DataSource) -> Result<(), EngineError>;

    fn reduce_overlap(&mut self, overlap: u32) -> Result<(), EngineError>;

    fn build_depth_maps(&mut self, downscale: u32, filter_mode: FilterMode)
        -> Result<(), EngineError>;

    fn build_dense_cloud(&mut self) -> Result<(), EngineError>;

    fn build_dem(&mut self) -> Result<(), EngineError>;

    fn build_orthomosaic(&mut self, surface: DataSource) -> Result<(), EngineError>;

    fn export_raster(&mut self, options: &ExportRasterOptions) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_mask_sets_low_bits() {
        assert_eq!(gpu_mask(0), 0);
        assert_eq!(gpu_mask(1), 0b1);
        assert_eq!(gpu_mask(3), 0b111);
        assert_eq!(gpu_mask(31), 0x7fff_ffff);
        assert_eq!(gpu_mask(40), u32::MAX);
    }
}
