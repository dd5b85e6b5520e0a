mod common;

use common::{run_day, write_cameras, write_site, SURVEY};
use reconflow_core::HorizontalBounds;
use reconflow_pipeline::{
    run_pipeline, EngineError, PipelineConfig, PipelineError, ProjectDocument, RunOptions,
    SimulatedEngine, Stage, StageFlags,
};
use std::path::Path;

fn options(base: &Path, flags: StageFlags) -> RunOptions {
    RunOptions {
        flags,
        ..RunOptions::new(base, "survey")
    }
}

fn align_only() -> StageFlags {
    StageFlags {
        align_requested: true,
        ..StageFlags::default()
    }
}

#[test]
fn align_produces_filtered_sparse_cloud() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_site(dir.path(), ".JPG", ".JPG");
    let config = PipelineConfig::default();
    let mut engine = SimulatedEngine::new();

    let report = run_pipeline(&mut engine, &options(dir.path(), align_only()), &config, run_day())
        .expect("run");
    assert_eq!(report.identity.name, "survey_2022_03_16");
    assert_eq!(
        report.completed,
        vec![Stage::Initialized, Stage::Aligned, Stage::SparseFiltered]
    );

    let doc = ProjectDocument::load_json(&report.project_path).expect("load project");
    let chunk = &doc.chunks[0];
    assert_eq!(chunk.photos.len(), SURVEY.len());
    assert_eq!(chunk.aligned_cameras(), SURVEY.len());
    assert!(chunk.transform.is_some());
    assert_eq!(chunk.reference.len(), SURVEY.len());
    assert_eq!(chunk.optimization_passes, 2);

    assert!(!chunk.tie_points.is_empty());
    for point in &chunk.tie_points {
        assert!(point.reprojection_error <= 0.3);
        assert!(point.projection_accuracy <= 10.0);
    }

    let model = chunk.model.as_ref().expect("reduced-overlap model");
    assert_eq!(model.overlap, Some(6));

    let log = std::fs::read_to_string(dir.path().join("survey_2022_03_16_engine.log"))
        .expect("engine log");
    assert!(log.contains("aligned 3 of 3 cameras"));
}

#[test]
fn full_run_exports_rasters() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_site(dir.path(), ".JPG", ".JPG");
    let config = PipelineConfig::default();
    let opts = RunOptions {
        test_area: true,
        dense_quality: "medium".to_string(),
        ..options(
            dir.path(),
            StageFlags {
                align_requested: true,
                dense_requested: true,
                export_requested: true,
                resize_region: true,
            },
        )
    };
    let mut engine = SimulatedEngine::with_devices(vec!["sim-gpu".to_string()]);

    let report = run_pipeline(&mut engine, &opts, &config, run_day()).expect("run");
    assert_eq!(
        report.completed,
        vec![
            Stage::Initialized,
            Stage::Aligned,
            Stage::SparseFiltered,
            Stage::RegionResized,
            Stage::DenseBuilt,
            Stage::Exported,
        ]
    );
    assert_eq!(engine.settings().map(|s| s.gpu_mask), Some(1));

    let bounds = report.region.expect("region");
    assert_eq!(bounds.bounds, HorizontalBounds::TEST_AREA);
    assert_eq!(
        report.exported,
        vec![
            dir.path().join("survey_2022_03_16_dem.tif"),
            dir.path().join("survey_2022_03_16.tif"),
        ]
    );
    for path in &report.exported {
        assert!(path.is_file(), "{} missing", path.display());
    }

    let chunk = &engine.document().expect("open document").chunks[0];
    assert_eq!(chunk.region, Some(bounds.region));
    assert_eq!(chunk.depth_maps.as_ref().map(|d| d.downscale), Some(4));
    assert!(!chunk.dense_cloud.is_empty());
    assert!(chunk.dense_cloud.iter().all(|p| bounds.region.contains(p)));
    assert!(chunk.dem.is_some());
    assert!(chunk.orthomosaic.is_some());
}

#[test]
fn resumed_project_runs_dense_and_export() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_site(dir.path(), ".JPG", ".JPG");
    let config = PipelineConfig::default();

    let first = run_pipeline(
        &mut SimulatedEngine::new(),
        &options(dir.path(), align_only()),
        &config,
        run_day(),
    )
    .expect("align run");

    let resumed = RunOptions {
        continue_name: first.identity.name.clone(),
        ..options(
            dir.path(),
            StageFlags {
                dense_requested: true,
                export_requested: true,
                ..StageFlags::default()
            },
        )
    };
    let later = chrono::NaiveDate::from_ymd_opt(2022, 4, 1).expect("date");
    let second = run_pipeline(&mut SimulatedEngine::new(), &resumed, &config, later)
        .expect("dense run");

    assert!(second.identity.is_resumed());
    assert!(!second.created);
    assert_eq!(second.project_path, first.project_path);
    assert_eq!(
        second.completed,
        vec![Stage::Initialized, Stage::DenseBuilt, Stage::Exported]
    );
    assert!(dir.path().join("survey_2022_03_16.tif").is_file());
}

#[test]
fn reference_mismatch_saves_added_photos() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_site(dir.path(), ".JPG", ".tif");
    let config = PipelineConfig::default();
    let mut engine = SimulatedEngine::new();

    let err = run_pipeline(&mut engine, &options(dir.path(), align_only()), &config, run_day())
        .expect_err("mismatch");
    match &err {
        PipelineError::ReferenceTypeMismatch {
            expected,
            first_image,
        } => {
            assert_eq!(expected, ".JPG");
            assert_eq!(first_image, "DJI_0001.tif");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_fatal_with_save());

    let doc = ProjectDocument::load_json(dir.path().join("survey_2022_03_16.reconproj"))
        .expect("rescued project");
    assert_eq!(doc.chunks[0].photos.len(), SURVEY.len());
    assert!(doc.chunks[0].reference.is_empty());
}

#[test]
fn dense_on_unaligned_project_is_an_engine_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = PipelineConfig::default();
    let mut engine = SimulatedEngine::new();

    let err = run_pipeline(
        &mut engine,
        &options(
            dir.path(),
            StageFlags {
                dense_requested: true,
                ..StageFlags::default()
            },
        ),
        &config,
        run_day(),
    )
    .expect_err("not aligned");
    assert!(matches!(err, PipelineError::Engine(EngineError::NotAligned)));
    assert!(dir.path().join("survey_2022_03_16.reconproj").is_file());
}

#[test]
fn custom_image_type_and_folder() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_site(dir.path(), ".tif", ".tif");
    let config = PipelineConfig::default();
    let opts = RunOptions {
        image_type: Some(".tif".to_string()),
        image_folder: "images/flight_1".into(),
        ..options(dir.path(), align_only())
    };

    let report = run_pipeline(&mut SimulatedEngine::new(), &opts, &config, run_day())
        .expect("run");
    let doc = ProjectDocument::load_json(&report.project_path).expect("load project");
    assert_eq!(doc.chunks[0].aligned_cameras(), SURVEY.len());
}

#[test]
fn single_camera_resize_leaves_a_resumable_project() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_cameras(dir.path(), &SURVEY[..1], ".JPG", ".JPG");
    let config = PipelineConfig::default();

    let first = run_pipeline(
        &mut SimulatedEngine::new(),
        &options(
            dir.path(),
            StageFlags {
                align_requested: true,
                resize_region: true,
                ..StageFlags::default()
            },
        ),
        &config,
        run_day(),
    )
    .expect("align run");
    let bounds = first.region.expect("region computed");
    assert_eq!(bounds.aligned_cameras, 1);
    assert!(!bounds.region.is_finite());

    let doc = ProjectDocument::load_json(&first.project_path).expect("project reloads");
    assert!(doc.chunks[0].region.is_none());

    let resumed = RunOptions {
        continue_name: first.identity.name.clone(),
        ..options(
            dir.path(),
            StageFlags {
                dense_requested: true,
                ..StageFlags::default()
            },
        )
    };
    let second = run_pipeline(&mut SimulatedEngine::new(), &resumed, &config, run_day())
        .expect("resumed dense run");
    assert_eq!(second.completed, vec![Stage::Initialized, Stage::DenseBuilt]);
}
