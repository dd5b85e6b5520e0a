//! Immutable run configuration.
//!
//! Every tunable of a run lives here and is handed by reference to the
//! components that need it. All fields have defaults, so a JSON config file
//! only needs to name what it overrides.

use reconflow_core::RegionBoundingParams;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::DenseQualityLevel;

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Photo matching settings passed to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingParams {
    /// Image downscale for matching; 0 selects the engine's highest accuracy.
    pub downscale: u32,
    pub generic_preselection: bool,
    pub reference_preselection: bool,
    pub keypoint_limit: u32,
    /// 0 means unlimited.
    pub tiepoint_limit: u32,
}

impl Default for MatchingParams {
    fn default() -> Self {
        Self {
            downscale: 0,
            generic_preselection: true,
            reference_preselection: true,
            keypoint_limit: 40_000,
            tiepoint_limit: 0,
        }
    }
}

/// Sparse cloud pruning thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseFilterParams {
    pub reprojection_error: f64,
    pub projection_accuracy: f64,
    /// Overlap factor for the reduced-overlap model built after filtering.
    pub reduce_overlap: u32,
}

impl Default for SparseFilterParams {
    fn default() -> Self {
        Self {
            reprojection_error: 0.3,
            projection_accuracy: 10.0,
            reduce_overlap: 6,
        }
    }
}

/// Depth map downscale per dense quality level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseQualityTable {
    pub ultra: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub lowest: u32,
}

impl Default for DenseQualityTable {
    fn default() -> Self {
        Self {
            ultra: 1,
            high: 2,
            medium: 4,
            low: 8,
            lowest: 16,
        }
    }
}

impl DenseQualityTable {
    pub fn downscale(&self, level: DenseQualityLevel) -> u32 {
        match level {
            DenseQualityLevel::Ultra => self.ultra,
            DenseQualityLevel::High => self.high,
            DenseQualityLevel::Medium => self.medium,
            DenseQualityLevel::Low => self.low,
            DenseQualityLevel::Lowest => self.lowest,
        }
    }
}

/// A-priori accuracy of the reference data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraAccuracy {
    /// Camera position accuracy in metres.
    pub location: [f64; 3],
    /// Camera orientation accuracy in degrees.
    pub rotation: [f64; 3],
}

impl Default for CameraAccuracy {
    fn default() -> Self {
        Self {
            location: [1.0, 1.0, 1.0],
            rotation: [1.0, 1.0, 1.0],
        }
    }
}

/// Configuration for one orchestration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reference file name, relative to the base path.
    pub reference_file: String,
    /// Extension of the project artifact (without dot).
    pub project_extension: String,
    /// Extension of exported rasters (without dot).
    pub raster_extension: String,
    /// Suffix of the engine log file appended to the project identity.
    pub engine_log_suffix: String,
    /// Image suffix used when the caller does not name one.
    pub default_image_type: String,
    pub matching: MatchingParams,
    pub sparse_filter: SparseFilterParams,
    pub dense_quality: DenseQualityTable,
    pub camera_accuracy: CameraAccuracy,
    /// CRS of the reference data and exports.
    pub crs_epsg: u32,
    pub cpu_enable: bool,
    /// Request BigTIFF output for the orthomosaic export.
    pub export_big_tiff: bool,
    pub region: RegionBoundingParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference_file: "images_metadata_gps.csv".to_string(),
            project_extension: "reconproj".to_string(),
            raster_extension: "tif".to_string(),
            engine_log_suffix: "_engine.log".to_string(),
            default_image_type: ".JPG".to_string(),
            matching: MatchingParams::default(),
            sparse_filter: SparseFilterParams::default(),
            dense_quality: DenseQualityTable::default(),
            camera_accuracy: CameraAccuracy::default(),
            crs_epsg: 4326,
            cpu_enable: true,
            export_big_tiff: true,
            region: RegionBoundingParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
