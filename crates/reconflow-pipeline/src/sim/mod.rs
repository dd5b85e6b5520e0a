//! A deterministic, file-backed [`ReconstructionEngine`].
//!
//! [`SimulatedEngine`] keeps the whole project in a JSON document and fakes
//! the photogrammetric steps with cheap synthetic geometry: cameras are placed
//! at their reference positions, sparse points are scattered on a gentle
//! terrain below them, and the DEM/orthomosaic are gridded from the dense
//! points. It is good enough to drive every stage end to end, observe the
//! persisted state, and produce real TIFF files on export.

mod document;
mod raster;

pub use document::{ChunkState, DepthMapsInfo, ModelInfo, ProjectDocument, TiePoint};
pub use raster::{Raster, NO_DATA};

use nalgebra::{Point3, Rotation3};
use reconflow_core::{
    CameraRecord, ChunkGeometry, CoordinateSystem, GeographicCrs, Region, SimilarityTransform,
};
use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    read_reference_entries, ChunkSetup, DataSource, EngineError, EngineSettings,
    ExportRasterOptions, FilterCriterion, FilterMode, MatchPhotosOptions, RasterFormat,
    ReconstructionEngine, ReferenceFormat,
};

/// Sparse points generated per aligned camera.
const POINTS_PER_CAMERA: usize = 48;
/// Radius of the point patch under each camera, metres.
const PATCH_RADIUS: f64 = 30.0;
/// Ground level below the cameras, metres.
const GROUND_CLEARANCE: f64 = 60.0;
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;
/// Longest DEM side in cells.
const DEM_MAX_DIM: u32 = 256;

struct OpenProject {
    path: PathBuf,
    document: ProjectDocument,
}

/// File-backed engine with synthetic processing.
pub struct SimulatedEngine {
    devices: Vec<String>,
    settings: Option<EngineSettings>,
    project: Option<OpenProject>,
    crs: GeographicCrs,
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEngine {
    /// Engine without GPU devices.
    pub fn new() -> Self {
        Self::with_devices(Vec::new())
    }

    pub fn with_devices(devices: Vec<String>) -> Self {
        Self {
            devices,
            settings: None,
            project: None,
            crs: GeographicCrs::wgs84(),
        }
    }

    pub fn settings(&self) -> Option<&EngineSettings> {
        self.settings.as_ref()
    }

    /// Path of the open project document.
    pub fn project_path(&self) -> Option<&Path> {
        self.project.as_ref().map(|p| p.path.as_path())
    }

    pub fn document(&self) -> Option<&ProjectDocument> {
        self.project.as_ref().map(|p| &p.document)
    }

    fn chunk(&self) -> Result<&ChunkState, EngineError> {
        let project = self.project.as_ref().ok_or(EngineError::NoProjectOpen)?;
        project
            .document
            .chunks
            .first()
            .ok_or_else(|| EngineError::NoChunk {
                path: project.path.clone(),
            })
    }

    fn chunk_mut(&mut self) -> Result<&mut ChunkState, EngineError> {
        let project = self.project.as_mut().ok_or(EngineError::NoProjectOpen)?;
        let path = &project.path;
        project
            .document
            .chunks
            .first_mut()
            .ok_or_else(|| EngineError::NoChunk { path: path.clone() })
    }

    /// Append a line to the engine log, if one is configured.
    fn journal(&self, message: &str) {
        log::debug!("{message}");
        let Some(settings) = &self.settings else {
            return;
        };
        let line = format!(
            "{} {message}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&settings.log_path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(err) = written {
            log::warn!(
                "cannot write engine log {}: {err}",
                settings.log_path.display()
            );
        }
    }

    fn require_aligned(&self) -> Result<(), EngineError> {
        let chunk = self.chunk()?;
        if chunk.transform.is_none() || chunk.aligned_cameras() == 0 {
            return Err(EngineError::NotAligned);
        }
        Ok(())
    }

    fn crs_for(epsg: u32) -> Result<GeographicCrs, EngineError> {
        GeographicCrs::from_epsg(epsg).ok_or(EngineError::UnsupportedProjection(epsg))
    }
}

/// Smooth synthetic relief, metres.
fn terrain(x: f64, y: f64) -> f64 {
    2.0 * (x / 15.0).sin() + 1.5 * (y / 20.0).cos()
}

fn frac(v: f64) -> f64 {
    v - v.floor()
}

/// Deterministic sparse points under one camera.
fn tie_points_below(center: &Point3<f64>, count: usize, first_index: usize) -> Vec<TiePoint> {
    (0..count)
        .map(|j| {
            let n = first_index + j;
            let angle = n as f64 * GOLDEN_ANGLE;
            let r = PATCH_RADIUS * ((j as f64 + 0.5) / count as f64).sqrt();
            let x = center.x + r * angle.cos();
            let y = center.y + r * angle.sin();
            TiePoint {
                position: Point3::new(x, y, center.z - GROUND_CLEARANCE + terrain(x, y)),
                reprojection_error: 0.6 * frac(n as f64 * 0.618_034),
                projection_accuracy: 20.0 * frac(n as f64 * 0.754_877 + 0.1),
            }
        })
        .collect()
}

impl ChunkGeometry for SimulatedEngine {
    fn cameras(&self) -> Vec<CameraRecord> {
        self.chunk().map(|c| c.cameras.clone()).unwrap_or_default()
    }

    fn transform(&self) -> Option<SimilarityTransform> {
        self.chunk().ok().and_then(|c| c.transform)
    }

    fn crs(&self) -> &dyn CoordinateSystem {
        &self.crs
    }

    fn region(&self) -> Option<Region> {
        self.chunk().ok().and_then(|c| c.region)
    }

    /// A region with non-finite components would not survive the JSON
    /// document, so it is refused and the previous region stays active.
    fn set_region(&mut self, region: Region) {
        if !region.is_finite() {
            log::warn!("region not set: non-finite geometry (degenerate camera footprint)");
            self.journal("kept previous region; new region is not finite");
            return;
        }
        match self.chunk_mut() {
            Ok(chunk) => chunk.region = Some(region),
            Err(err) => log::warn!("region not set: {err}"),
        }
    }
}

impl ReconstructionEngine for SimulatedEngine {
    fn gpu_devices(&self) -> Vec<String> {
        self.devices.clone()
    }

    fn configure(&mut self, settings: &EngineSettings) -> Result<(), EngineError> {
        self.settings = Some(settings.clone());
        self.journal(&format!(
            "configured gpu_mask={:#x} cpu_enable={}",
            settings.gpu_mask, settings.cpu_enable
        ));
        Ok(())
    }

    fn create_project(&mut self, path: &Path) -> Result<(), EngineError> {
        ProjectDocument::default().write_json(path)?;
        self.journal(&format!("created {}", path.display()));
        Ok(())
    }

    fn open_project(&mut self, path: &Path) -> Result<(), EngineError> {
        let document = ProjectDocument::load_json(path)?;
        let epsg = document
            .chunks
            .first()
            .ok_or_else(|| EngineError::NoChunk {
                path: path.to_path_buf(),
            })?
            .crs_epsg;
        self.crs = Self::crs_for(epsg)?;
        self.project = Some(OpenProject {
            path: path.to_path_buf(),
            document,
        });
        self.journal(&format!("opened {}", path.display()));
        Ok(())
    }

    fn save_project(&mut self) -> Result<(), EngineError> {
        let project = self.project.as_ref().ok_or(EngineError::NoProjectOpen)?;
        project.document.write_json(&project.path)?;
        self.journal(&format!("saved {}", project.path.display()));
        Ok(())
    }

    fn setup_chunk(&mut self, setup: &ChunkSetup) -> Result<(), EngineError> {
        let crs = Self::crs_for(setup.crs_epsg)?;
        let chunk = self.chunk_mut()?;
        chunk.crs_epsg = setup.crs_epsg;
        chunk.camera_location_accuracy = setup.camera_location_accuracy;
        chunk.camera_rotation_accuracy = setup.camera_rotation_accuracy;
        self.crs = crs;
        self.journal(&format!("chunk crs set to EPSG:{}", setup.crs_epsg));
        Ok(())
    }

    fn add_photos(&mut self, paths: &[PathBuf]) -> Result<(), EngineError> {
        if paths.is_empty() {
            return Err(EngineError::NoPhotos);
        }
        let chunk = self.chunk_mut()?;
        let mut added = 0;
        for path in paths {
            if chunk.photos.contains(path) {
                continue;
            }
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            chunk.photos.push(path.clone());
            chunk.cameras.push(CameraRecord::unaligned(label));
            added += 1;
        }
        self.journal(&format!("added {added} photos"));
        Ok(())
    }

    fn import_reference(
        &mut self,
        path: &Path,
        delimiter: char,
        format: ReferenceFormat,
    ) -> Result<(), EngineError> {
        let entries = match format {
            ReferenceFormat::Csv => read_reference_entries(path, delimiter)?,
        };
        let chunk = self.chunk_mut()?;
        let referenced = chunk
            .cameras
            .iter()
            .filter(|c| entries.iter().any(|e| e.file_name == c.label))
            .count();
        let total = entries.len();
        chunk.reference = entries;
        self.journal(&format!(
            "imported {total} reference rows from {}, {referenced} cameras referenced",
            path.display()
        ));
        Ok(())
    }

    fn match_photos(&mut self, options: &MatchPhotosOptions) -> Result<(), EngineError> {
        let chunk = self.chunk_mut()?;
        if chunk.cameras.is_empty() {
            return Err(EngineError::NoPhotos);
        }
        chunk.matching = Some(*options);
        self.journal(&format!(
            "matched photos downscale={} keypoints={} tiepoints={}",
            options.downscale, options.keypoint_limit, options.tiepoint_limit
        ));
        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    fn align_cameras(&mut self) -> Result<(), EngineError> {
        let crs = self.crs;
        let chunk = self.chunk_mut()?;
        let matching = chunk.matching.ok_or(EngineError::NotMatched)?;

        let poses: Vec<(usize, f64, f64, f64, Rotation3<f64>)> = chunk
            .cameras
            .iter()
            .enumerate()
            .filter_map(|(i, camera)| {
                let entry = chunk.reference.iter().find(|e| e.file_name == camera.label)?;
                let rotation = Rotation3::from_euler_angles(
                    entry.roll.to_radians(),
                    entry.pitch.to_radians(),
                    entry.yaw.to_radians(),
                );
                Some((i, entry.lon, entry.lat, entry.elevation, rotation))
            })
            .collect();
        if poses.is_empty() {
            return Err(EngineError::NotAligned);
        }

        let n = poses.len() as f64;
        let lon0 = poses.iter().map(|p| p.1).sum::<f64>() / n;
        let lat0 = poses.iter().map(|p| p.2).sum::<f64>() / n;
        let origin = crs.unproject(&Point3::new(lon0, lat0, 0.0));
        let transform = SimilarityTransform::from_parts(1.0, crs.enu_basis(lon0, lat0), origin.coords);
        let inv = transform.inverse().ok_or(EngineError::NotAligned)?;

        let per_camera = match matching.tiepoint_limit {
            0 => POINTS_PER_CAMERA,
            limit => (limit as usize).min(POINTS_PER_CAMERA),
        };

        for camera in &mut chunk.cameras {
            camera.transform = None;
        }
        chunk.tie_points.clear();
        for (i, lon, lat, h, rotation) in poses.iter().copied() {
            let center = inv.mulp(&crs.unproject(&Point3::new(lon, lat, h)));
            let mut pose = rotation.to_homogeneous();
            pose.fixed_view_mut::<3, 1>(0, 3).copy_from(&center.coords);
            let first = chunk.tie_points.len();
            chunk
                .tie_points
                .extend(tie_points_below(&center, per_camera, first));
            let camera = &mut chunk.cameras[i];
            camera.center = center;
            camera.transform = Some(pose);
        }
        chunk.transform = Some(transform);

        let (aligned, total, points) = (poses.len(), chunk.cameras.len(), chunk.tie_points.len());
        self.journal(&format!(
            "aligned {aligned} of {total} cameras, {points} tie points"
        ));
        Ok(())
    }

    fn filter_points(
        &mut self,
        criterion: FilterCriterion,
        threshold: f64,
    ) -> Result<(), EngineError> {
        self.require_aligned()?;
        let chunk = self.chunk_mut()?;
        let before = chunk.tie_points.len();
        chunk.tie_points.retain(|p| match criterion {
            FilterCriterion::ReprojectionError => p.reprojection_error <= threshold,
            FilterCriterion::ProjectionAccuracy => p.projection_accuracy <= threshold,
        });
        let removed = before - chunk.tie_points.len();
        self.journal(&format!(
            "filter {criterion:?} <= {threshold}: removed {removed} of {before} points"
        ));
        Ok(())
    }

    fn optimize_cameras(&mut self) -> Result<(), EngineError> {
        self.require_aligned()?;
        let chunk = self.chunk_mut()?;
        chunk.optimization_passes += 1;
        for point in &mut chunk.tie_points {
            point.reprojection_error *= 0.9;
        }
        let passes = chunk.optimization_passes;
        self.journal(&format!("optimized cameras (pass {passes})"));
        Ok(())
    }

    fn build_model(&mut self, source: DataSource) -> Result<(), EngineError> {
        let chunk = self.chunk_mut()?;
        let points = match source {
            DataSource::PointCloud => chunk.tie_points.len(),
            DataSource::DenseCloud => chunk.dense_cloud.len(),
            DataSource::ElevationData => chunk.dem.as_ref().map_or(0, Raster::valid_cells),
            DataSource::OrthomosaicData => 0,
        };
        if points == 0 {
            return Err(EngineError::MissingProduct("model source data"));
        }
        chunk.model = Some(ModelInfo {
            source,
            faces: 2 * points,
            overlap: None,
        });
        self.journal(&format!("built model from {source:?} ({points} points)"));
        Ok(())
    }

    fn reduce_overlap(&mut self, overlap: u32) -> Result<(), EngineError> {
        let chunk = self.chunk_mut()?;
        let model = chunk
            .model
            .as_mut()
            .ok_or(EngineError::MissingProduct("model"))?;
        model.overlap = Some(overlap);
        self.journal(&format!("reduced overlap to {overlap}"));
        Ok(())
    }

    fn build_depth_maps(
        &mut self,
        downscale: u32,
        filter_mode: FilterMode,
    ) -> Result<(), EngineError> {
        self.require_aligned()?;
        let chunk = self.chunk_mut()?;
        let cameras = chunk.aligned_cameras();
        chunk.depth_maps = Some(DepthMapsInfo {
            downscale: downscale.max(1),
            filter_mode,
            cameras,
        });
        self.journal(&format!(
            "built depth maps for {cameras} cameras, downscale={downscale} filter={filter_mode:?}"
        ));
        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    fn build_dense_cloud(&mut self) -> Result<(), EngineError> {
        let chunk = self.chunk_mut()?;
        let depth = chunk
            .depth_maps
            .as_ref()
            .ok_or(EngineError::MissingProduct("depth maps"))?;
        let density = (8 / depth.downscale).max(1) as usize;

        let mut dense = Vec::with_capacity(chunk.tie_points.len() * density);
        for (i, point) in chunk.tie_points.iter().enumerate() {
            for k in 0..density {
                let angle = (i * density + k) as f64 * GOLDEN_ANGLE;
                let r = if k == 0 { 0.0 } else { 0.5 * (k as f64 / density as f64).sqrt() };
                let x = point.position.x + r * angle.cos();
                let y = point.position.y + r * angle.sin();
                let z = point.position.z + terrain(x, y) - terrain(point.position.x, point.position.y);
                dense.push(Point3::new(x, y, z));
            }
        }
        if let Some(region) = &chunk.region {
            dense.retain(|p| region.contains(p));
        }
        chunk.dense_cloud = dense;

        let points = chunk.dense_cloud.len();
        self.journal(&format!("built dense cloud with {points} points"));
        Ok(())
    }

    fn build_dem(&mut self) -> Result<(), EngineError> {
        let crs = self.crs;
        let chunk = self.chunk_mut()?;
        let transform = chunk.transform.ok_or(EngineError::NotAligned)?;
        let samples: Vec<(f64, f64, f64)> = chunk
            .dense_cloud
            .iter()
            .map(|p| (p.x, p.y, crs.project(&transform.mulp(p)).z))
            .collect();
        // About four points per cell along each side.
        let max_dim = ((samples.len() as f64).sqrt() / 2.0).ceil() as u32;
        let dem = Raster::grid_max(&samples, max_dim.clamp(4, DEM_MAX_DIM))
            .ok_or(EngineError::MissingProduct("dense cloud"))?;
        let (w, h) = (dem.width, dem.height);
        chunk.dem = Some(dem);
        self.journal(&format!("built DEM {w}x{h}"));
        Ok(())
    }

    fn build_orthomosaic(&mut self, surface: DataSource) -> Result<(), EngineError> {
        let chunk = self.chunk_mut()?;
        let dem = match surface {
            DataSource::ElevationData => chunk.dem.as_ref(),
            _ => None,
        }
        .ok_or(EngineError::MissingProduct("elevation model"))?;
        chunk.orthomosaic = Some(dem.hillshade(315.0, 45.0));
        self.journal(&format!("built orthomosaic on {surface:?}"));
        Ok(())
    }

    fn export_raster(&mut self, options: &ExportRasterOptions) -> Result<(), EngineError> {
        Self::crs_for(options.projection_epsg)?;
        let format = match options.format {
            RasterFormat::Tiff => image::ImageFormat::Tiff,
        };
        let chunk = self.chunk()?;
        match options.source {
            DataSource::ElevationData => chunk
                .dem
                .as_ref()
                .and_then(Raster::to_luma16)
                .ok_or(EngineError::MissingProduct("DEM"))?
                .save_with_format(&options.path, format)?,
            DataSource::OrthomosaicData => chunk
                .orthomosaic
                .as_ref()
                .and_then(Raster::to_luma8)
                .ok_or(EngineError::MissingProduct("orthomosaic"))?
                .save_with_format(&options.path, format)?,
            _ => return Err(EngineError::MissingProduct("raster source")),
        }
        let big_tiff = options.compression.is_some_and(|c| c.tiff_big);
        self.journal(&format!(
            "exported {:?} to {} (EPSG:{}, big_tiff={big_tiff})",
            options.source,
            options.path.display(),
            options.projection_epsg
        ));
        Ok(())
    }
}
