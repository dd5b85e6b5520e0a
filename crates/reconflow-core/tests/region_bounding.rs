use approx::assert_relative_eq;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use reconflow_core::{
    BoundingError, CameraRecord, ChunkGeometry, CoordinateSystem, GeographicCrs, HorizontalBounds,
    Region, RegionBoundingCalculator, RegionBoundingParams, SimilarityTransform,
};

const LON0: f64 = -76.4025;
const LAT0: f64 = -0.6830;

fn chunk_transform(crs: &GeographicCrs, scale: f64) -> SimilarityTransform {
    let origin = crs.unproject(&Point3::new(LON0, LAT0, 2_900.0));
    SimilarityTransform::from_parts(scale, crs.enu_basis(LON0, LAT0), origin.coords)
}

fn cameras_at(
    crs: &GeographicCrs,
    transform: &SimilarityTransform,
    positions: &[(f64, f64, f64)],
) -> Vec<CameraRecord> {
    let inv = transform.inverse().unwrap();
    positions
        .iter()
        .enumerate()
        .map(|(i, &(lon, lat, h))| CameraRecord {
            label: format!("DJI_{i:04}.JPG"),
            center: inv.mulp(&crs.unproject(&Point3::new(lon, lat, h))),
            transform: Some(Matrix4::identity()),
        })
        .collect()
}

fn survey_positions() -> Vec<(f64, f64, f64)> {
    vec![
        (-76.4031, -0.6836, 3_010.0),
        (-76.4027, -0.6834, 3_012.0),
        (-76.4022, -0.6831, 3_008.0),
        (-76.4019, -0.6826, 3_011.0),
        (-76.4024, -0.6828, 3_009.0),
    ]
}

#[test]
fn corners_lie_within_camera_extent() {
    let crs = GeographicCrs::wgs84();
    let transform = chunk_transform(&crs, 1.0);
    let cameras = cameras_at(&crs, &transform, &survey_positions());

    let bounds = RegionBoundingCalculator::default()
        .compute(&cameras, &transform, &crs)
        .unwrap();

    assert_relative_eq!(bounds.bounds.min_x, -76.4031, epsilon = 1e-9);
    assert_relative_eq!(bounds.bounds.max_x, -76.4019, epsilon = 1e-9);
    assert_relative_eq!(bounds.bounds.min_y, -0.6836, epsilon = 1e-9);
    assert_relative_eq!(bounds.bounds.max_y, -0.6826, epsilon = 1e-9);
    assert_relative_eq!(bounds.elevation_mean, 3_010.0, epsilon = 1e-4);

    for corner in &bounds.corners_local {
        let geo = crs.project(&transform.mulp(corner));
        assert!(
            bounds.bounds.contains(geo.x, geo.y, 1e-9),
            "corner {geo:?} outside {:?}",
            bounds.bounds
        );
        assert_relative_eq!(geo.z, bounds.elevation_mean, epsilon = 1e-4);
    }
}

#[test]
fn horizontal_padding_is_ten_percent() {
    let crs = GeographicCrs::wgs84();
    let transform = chunk_transform(&crs, 0.25);
    let cameras = cameras_at(&crs, &transform, &survey_positions());

    let bounds = RegionBoundingCalculator::default()
        .compute(&cameras, &transform, &crs)
        .unwrap();

    let size = bounds.region.size;
    assert_relative_eq!(size.x, 1.1 * bounds.unpadded_size.x, max_relative = 1e-12);
    assert_relative_eq!(size.y, 1.1 * bounds.unpadded_size.y, max_relative = 1e-12);
    assert_relative_eq!(size.z, 1.1 * bounds.unpadded_size.z, max_relative = 1e-12);

    // Local units are metres / scale: ~133 m east-west, ~111 m north-south.
    let east_west_m = (76.4031_f64 - 76.4019).to_radians() * 6_378_137.0;
    assert_relative_eq!(bounds.unpadded_size.x, east_west_m / 0.25, max_relative = 1e-2);
    let north_south_m = (0.6836_f64 - 0.6826).to_radians() * 6_335_439.0;
    assert_relative_eq!(bounds.unpadded_size.y, north_south_m / 0.25, max_relative = 1e-2);
}

#[test]
fn rotation_is_proper_orthonormal() {
    let crs = GeographicCrs::wgs84();
    let transform = chunk_transform(&crs, 1.0);
    let cameras = cameras_at(&crs, &transform, &survey_positions());

    let r = RegionBoundingCalculator::default()
        .compute(&cameras, &transform, &crs)
        .unwrap()
        .region
        .rotation;
    assert_relative_eq!(r.transpose() * r, Matrix3::identity(), epsilon = 1e-9);
    assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-9);
}

#[test]
fn center_sits_on_footprint_midpoint() {
    let crs = GeographicCrs::wgs84();
    let transform = chunk_transform(&crs, 1.0);
    let cameras = cameras_at(&crs, &transform, &survey_positions());

    let bounds = RegionBoundingCalculator::default()
        .compute(&cameras, &transform, &crs)
        .unwrap();
    let center = crs.project(&transform.mulp(&bounds.region.center));
    assert_relative_eq!(center.x, bounds.bounds.mid_x(), epsilon = 1e-9);
    assert_relative_eq!(center.y, bounds.bounds.mid_y(), epsilon = 1e-9);
    assert!(bounds.region.contains(&bounds.region.center));
}

/// Corner 0 of the survey footprint in the local frame and its vertical
/// offset `T(c0) - T(c0 with z = 0)` in geocentric metres.
fn survey_corner_offsets(
    crs: &GeographicCrs,
    transform: &SimilarityTransform,
) -> (Point3<f64>, Vector3<f64>) {
    let inv = transform.inverse().unwrap();
    let c0 = inv.mulp(&crs.unproject(&Point3::new(-76.4031, -0.6836, 3_010.0)));
    let side3g = transform.mulp(&c0) - transform.mulp(&Point3::new(c0.x, c0.y, 0.0));
    (c0, side3g)
}

#[test]
fn vertical_extent_is_three_padded_vertical_units() {
    let crs = GeographicCrs::wgs84();
    let scale = 0.25;
    let transform = chunk_transform(&crs, scale);
    let cameras = cameras_at(&crs, &transform, &survey_positions());

    let bounds = RegionBoundingCalculator::default()
        .compute(&cameras, &transform, &crs)
        .unwrap();
    let (c0, side3g) = survey_corner_offsets(&crs, &transform);
    assert_relative_eq!(bounds.corners_local[0], c0, epsilon = 1e-4);

    assert_relative_eq!(
        bounds.region.size.z,
        1.1 * 3.0 * side3g.norm() / scale,
        max_relative = 1e-6
    );
    // Cameras fly ~110 m above the chunk origin: 110 m / 0.25 local units.
    assert_relative_eq!(bounds.region.size.z, 1.1 * 3.0 * 440.0, max_relative = 1e-2);
}

#[test]
fn center_height_drops_two_vertical_offsets() {
    let crs = GeographicCrs::wgs84();
    let transform = chunk_transform(&crs, 0.5);
    let cameras = cameras_at(&crs, &transform, &survey_positions());

    let bounds = RegionBoundingCalculator::default()
        .compute(&cameras, &transform, &crs)
        .unwrap();
    let (_, side3g) = survey_corner_offsets(&crs, &transform);
    assert!(side3g.z.abs() > 0.1);

    let center = crs.project(&transform.mulp(&bounds.region.center));
    assert_relative_eq!(center.z, 3_010.0 - 2.0 * side3g.z, epsilon = 1e-4);
}

#[test]
fn single_camera_collapses_footprint() {
    let crs = GeographicCrs::wgs84();
    let transform = chunk_transform(&crs, 1.0);
    let cameras = cameras_at(&crs, &transform, &survey_positions()[..1]);

    let bounds = RegionBoundingCalculator::default()
        .compute(&cameras, &transform, &crs)
        .unwrap();
    assert_eq!(bounds.aligned_cameras, 1);
    assert_eq!(bounds.region.size.x, 0.0);
    assert_eq!(bounds.region.size.y, 0.0);
    assert!(bounds.region.size.z > 0.0);
    assert!(bounds.region.center.iter().all(|v| v.is_finite()));
    assert!(!bounds.region.is_finite());

    let fixed = RegionBoundingCalculator::new(RegionBoundingParams {
        test_area: true,
        ..RegionBoundingParams::default()
    })
    .compute(&cameras, &transform, &crs)
    .unwrap();
    assert!(fixed.region.is_finite());
}

#[test]
fn test_area_overrides_camera_footprint() {
    let crs = GeographicCrs::wgs84();
    let transform = chunk_transform(&crs, 1.0);
    let calc = RegionBoundingCalculator::new(RegionBoundingParams {
        test_area: true,
        ..RegionBoundingParams::default()
    });

    let wide = cameras_at(&crs, &transform, &survey_positions());
    let narrow = cameras_at(
        &crs,
        &transform,
        &[(-76.5, -0.70, 2_500.0), (-76.49, -0.69, 2_520.0)],
    );

    let a = calc.compute(&wide, &transform, &crs).unwrap();
    let b = calc.compute(&narrow, &transform, &crs).unwrap();
    assert_eq!(a.bounds, HorizontalBounds::TEST_AREA);
    assert_eq!(b.bounds, HorizontalBounds::TEST_AREA);

    // Cameras still drive the height.
    assert_relative_eq!(a.elevation_mean, 3_010.0, epsilon = 1e-4);
    assert_relative_eq!(b.elevation_mean, 2_510.0, epsilon = 1e-4);
}

#[test]
fn median_center_is_robust_to_outlier() {
    let crs = GeographicCrs::wgs84();
    let transform = chunk_transform(&crs, 1.0);
    let mut positions = survey_positions();
    positions.push((-76.30, -0.60, 3_010.0));
    let cameras = cameras_at(&crs, &transform, &positions);

    let bounds = RegionBoundingCalculator::default()
        .compute(&cameras, &transform, &crs)
        .unwrap();
    assert!((bounds.median_center.x - (-76.4025)).abs() < 5e-4);
    assert!((bounds.median_center.y - (-0.6832)).abs() < 5e-4);
}

#[test]
fn unaligned_cameras_are_ignored() {
    let crs = GeographicCrs::wgs84();
    let transform = chunk_transform(&crs, 1.0);
    let mut cameras = cameras_at(&crs, &transform, &survey_positions());
    let mut stray = cameras_at(&crs, &transform, &[(-70.0, 5.0, 100.0)]).remove(0);
    stray.transform = None;
    cameras.push(stray);

    let bounds = RegionBoundingCalculator::default()
        .compute(&cameras, &transform, &crs)
        .unwrap();
    assert_eq!(bounds.aligned_cameras, 5);
    assert_relative_eq!(bounds.bounds.max_x, -76.4019, epsilon = 1e-9);
}

#[test]
fn no_aligned_cameras_is_an_error() {
    let crs = GeographicCrs::wgs84();
    let transform = chunk_transform(&crs, 1.0);
    let cameras = vec![CameraRecord::unaligned("IMG_0001.JPG")];
    let err = RegionBoundingCalculator::default()
        .compute(&cameras, &transform, &crs)
        .unwrap_err();
    assert_eq!(err, BoundingError::NoAlignedCameras);
}

struct FakeChunk {
    crs: GeographicCrs,
    transform: Option<SimilarityTransform>,
    cameras: Vec<CameraRecord>,
    region: Option<Region>,
}

impl ChunkGeometry for FakeChunk {
    fn cameras(&self) -> Vec<CameraRecord> {
        self.cameras.clone()
    }

    fn transform(&self) -> Option<SimilarityTransform> {
        self.transform
    }

    fn crs(&self) -> &dyn CoordinateSystem {
        &self.crs
    }

    fn region(&self) -> Option<Region> {
        self.region
    }

    fn set_region(&mut self, region: Region) {
        self.region = Some(region);
    }
}

#[test]
fn resize_region_replaces_chunk_region() {
    let crs = GeographicCrs::wgs84();
    let transform = chunk_transform(&crs, 1.0);
    let mut chunk = FakeChunk {
        crs,
        transform: Some(transform),
        cameras: cameras_at(&crs, &transform, &survey_positions()),
        region: Some(Region::axis_aligned(Point3::origin(), Vector3::repeat(1.0))),
    };

    let bounds = RegionBoundingCalculator::default()
        .resize_region(&mut chunk)
        .unwrap();
    assert_eq!(chunk.region(), Some(bounds.region));
}

#[test]
fn ungeoreferenced_chunk_is_rejected() {
    let mut chunk = FakeChunk {
        crs: GeographicCrs::wgs84(),
        transform: None,
        cameras: Vec::new(),
        region: None,
    };
    let err = RegionBoundingCalculator::default()
        .resize_region(&mut chunk)
        .unwrap_err();
    assert_eq!(err, BoundingError::Ungeoreferenced);
    assert!(chunk.region().is_none());
}
