//! Stage sequencing.
//!
//! The orchestrator walks the requested stages in a fixed order and saves the
//! project after each one, so whatever completed survives a later failure.
//! It does not check that a resumed project actually went through earlier
//! stages; missing products surface as engine errors.

use reconflow_core::{RegionBoundingCalculator, RegionBoundingParams, RegionBounds};
use std::path::PathBuf;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    discover_images, DataSource, DenseQualityLevel, ExportRasterOptions, FilterCriterion,
    FilterMode, ImageCompression, MatchPhotosOptions, PipelineConfig, PipelineError,
    ProjectIdentity, RasterFormat, ReconstructionEngine, ReferenceFormat, ReferenceValidator,
    RunOptions, Stage, REFERENCE_DELIMITER,
};

/// Notice emitted when neither alignment nor dense reconstruction was asked for.
pub const NO_STAGE_NOTICE: &str = "No processing step selected. Choose step one or two";

/// What one orchestration run did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageOutcome {
    /// Stages reached, in order.
    pub completed: Vec<Stage>,
    /// Region computed by the resize stage.
    pub region: Option<RegionBounds>,
    pub exported: Vec<PathBuf>,
    pub notice: Option<String>,
}

/// Drives a [`ReconstructionEngine`] through the requested stages.
pub struct StageOrchestrator<'a, E: ReconstructionEngine + ?Sized> {
    engine: &'a mut E,
    config: &'a PipelineConfig,
    identity: &'a ProjectIdentity,
    options: &'a RunOptions,
}

impl<'a, E: ReconstructionEngine + ?Sized> StageOrchestrator<'a, E> {
    pub fn new(
        engine: &'a mut E,
        config: &'a PipelineConfig,
        identity: &'a ProjectIdentity,
        options: &'a RunOptions,
    ) -> Self {
        Self {
            engine,
            config,
            identity,
            options,
        }
    }

    /// Run every requested stage. The project must already be open.
    pub fn run(&mut self) -> Result<StageOutcome, PipelineError> {
        let flags = self.options.flags;
        let mut outcome = StageOutcome::default();

        self.save()?;
        outcome.completed.push(Stage::Initialized);

        if flags.no_processing() {
            log::warn!("{NO_STAGE_NOTICE}");
            outcome.notice = Some(NO_STAGE_NOTICE.to_string());
        }

        if flags.align_requested {
            self.align()?;
            outcome.completed.push(Stage::Aligned);
            self.filter_sparse_cloud()?;
            outcome.completed.push(Stage::SparseFiltered);
            if flags.resize_region {
                outcome.region = Some(self.resize_region()?);
                outcome.completed.push(Stage::RegionResized);
            }
        }

        if flags.dense_requested {
            if flags.resize_region && !flags.align_requested {
                outcome.region = Some(self.resize_region()?);
                outcome.completed.push(Stage::RegionResized);
            }
            self.build_dense()?;
            outcome.completed.push(Stage::DenseBuilt);
        }

        if flags.export_requested {
            outcome.exported = self.export()?;
            outcome.completed.push(Stage::Exported);
        }

        Ok(outcome)
    }

    fn save(&mut self) -> Result<(), PipelineError> {
        self.engine.save_project()?;
        Ok(())
    }

    fn image_type(&self) -> &str {
        self.options
            .image_type
            .as_deref()
            .unwrap_or(&self.config.default_image_type)
    }

    /// Add photos, import the reference and align.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn align(&mut self) -> Result<(), PipelineError> {
        let image_type = self.image_type().to_string();
        let folder = self.identity.base_path.join(&self.options.image_folder);
        let images = discover_images(&folder, &image_type);
        if images.is_empty() {
            return Err(PipelineError::NoImagesFound { folder, image_type });
        }
        log::info!("adding {} photos from {}", images.len(), folder.display());
        self.engine.add_photos(&images)?;

        let reference = self.identity.base_path.join(&self.config.reference_file);
        ReferenceValidator::new(image_type).validate(&reference)?;
        self.engine
            .import_reference(&reference, REFERENCE_DELIMITER, ReferenceFormat::Csv)?;

        let matching = &self.config.matching;
        self.engine.match_photos(&MatchPhotosOptions {
            downscale: matching.downscale,
            generic_preselection: matching.generic_preselection,
            reference_preselection: matching.reference_preselection,
            keypoint_limit: matching.keypoint_limit,
            tiepoint_limit: matching.tiepoint_limit,
        })?;
        self.engine.align_cameras()?;
        self.save()?;
        log::info!("stage {} done", Stage::Aligned);
        Ok(())
    }

    /// Two filter passes, each followed by camera optimization, then the
    /// reduced-overlap model.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn filter_sparse_cloud(&mut self) -> Result<(), PipelineError> {
        let params = &self.config.sparse_filter;
        let reduce_overlap = params.reduce_overlap;
        for (criterion, threshold) in [
            (FilterCriterion::ReprojectionError, params.reprojection_error),
            (FilterCriterion::ProjectionAccuracy, params.projection_accuracy),
        ] {
            log::info!("filtering sparse points: {criterion:?} <= {threshold}");
            self.engine.filter_points(criterion, threshold)?;
            self.engine.optimize_cameras()?;
        }
        self.save()?;

        self.engine.build_model(DataSource::PointCloud)?;
        self.engine.reduce_overlap(reduce_overlap)?;
        self.save()?;
        log::info!("stage {} done", Stage::SparseFiltered);
        Ok(())
    }

    /// Recompute the chunk region from the aligned cameras.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn resize_region(&mut self) -> Result<RegionBounds, PipelineError> {
        let params = RegionBoundingParams {
            test_area: self.config.region.test_area || self.options.test_area,
            ..self.config.region.clone()
        };
        let bounds = RegionBoundingCalculator::new(params).resize_region(&mut *self.engine)?;
        self.save()?;
        log::info!(
            "stage {} done: size=({:.2}, {:.2}, {:.2})",
            Stage::RegionResized,
            bounds.region.size.x,
            bounds.region.size.y,
            bounds.region.size.z
        );
        Ok(bounds)
    }

    /// Depth maps, dense cloud, DEM and orthomosaic.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn build_dense(&mut self) -> Result<(), PipelineError> {
        let quality = DenseQualityLevel::from_key_or_default(&self.options.dense_quality);
        let downscale = self.config.dense_quality.downscale(quality);
        log::info!("building dense cloud ({quality}, downscale {downscale})");
        self.engine
            .build_depth_maps(downscale, FilterMode::Aggressive)?;
        self.engine.build_dense_cloud()?;
        log::info!("building DEM");
        self.engine.build_dem()?;
        log::info!("building orthomosaic");
        self.engine.build_orthomosaic(DataSource::ElevationData)?;
        self.save()?;
        log::info!("stage {} done", Stage::DenseBuilt);
        Ok(())
    }

    /// Export the DEM and orthomosaic next to the project.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn export(&mut self) -> Result<Vec<PathBuf>, PipelineError> {
        let dem = ExportRasterOptions {
            path: self.identity.dem_export_path(self.config),
            source: DataSource::ElevationData,
            projection_epsg: self.config.crs_epsg,
            compression: None,
            format: RasterFormat::Tiff,
        };
        let orthomosaic = ExportRasterOptions {
            path: self.identity.orthomosaic_export_path(self.config),
            source: DataSource::OrthomosaicData,
            projection_epsg: self.config.crs_epsg,
            compression: Some(ImageCompression {
                tiff_big: self.config.export_big_tiff,
            }),
            format: RasterFormat::Tiff,
        };

        let mut exported = Vec::with_capacity(2);
        for options in [dem, orthomosaic] {
            self.engine.export_raster(&options)?;
            log::info!("exported {}", options.path.display());
            exported.push(options.path);
        }
        Ok(exported)
    }
}
