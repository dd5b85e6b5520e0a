//! On-disk project document of the simulated engine.

use nalgebra::Point3;
use reconflow_core::{CameraRecord, Region, SimilarityTransform};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::raster::Raster;
use crate::{DataSource, EngineError, FilterMode, MatchPhotosOptions, ReferenceEntry};

pub const FORMAT_VERSION: u32 = 1;

/// Sparse point with its quality statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TiePoint {
    /// Local chunk frame.
    pub position: Point3<f64>,
    /// Pixels.
    pub reprojection_error: f64,
    pub projection_accuracy: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub source: DataSource,
    pub faces: usize,
    /// Set once the overlap has been reduced.
    #[serde(default)]
    pub overlap: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthMapsInfo {
    pub downscale: u32,
    pub filter_mode: FilterMode,
    pub cameras: usize,
}

/// One chunk and every product built in it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkState {
    pub label: String,
    pub crs_epsg: u32,
    pub camera_location_accuracy: [f64; 3],
    pub camera_rotation_accuracy: [f64; 3],
    pub photos: Vec<PathBuf>,
    pub cameras: Vec<CameraRecord>,
    pub reference: Vec<ReferenceEntry>,
    pub matching: Option<MatchPhotosOptions>,
    pub transform: Option<SimilarityTransform>,
    pub region: Option<Region>,
    pub tie_points: Vec<TiePoint>,
    pub optimization_passes: u32,
    pub model: Option<ModelInfo>,
    pub depth_maps: Option<DepthMapsInfo>,
    pub dense_cloud: Vec<Point3<f64>>,
    pub dem: Option<Raster>,
    pub orthomosaic: Option<Raster>,
}

impl ChunkState {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            crs_epsg: 4326,
            ..Self::default()
        }
    }

    pub fn aligned_cameras(&self) -> usize {
        self.cameras.iter().filter(|c| c.is_aligned()).count()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub format_version: u32,
    pub chunks: Vec<ChunkState>,
}

impl Default for ProjectDocument {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            chunks: vec![ChunkState::new("Chunk 1")],
        }
    }
}

impl ProjectDocument {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
