//! Oriented, padded region around the camera rig.
//!
//! The region seeds the reconstruction volume for dense matching. It is built
//! in CRS space (longitude/latitude/height) from the horizontal extent of the
//! aligned cameras and mapped back into the chunk's local frame:
//!
//! 1. Project every aligned camera centre into the CRS; keep the horizontal
//!    min/max and the mean height.
//! 2. Optionally replace the horizontal bounds by a fixed test footprint.
//! 3. Build the four footprint corners at the mean height and bring them into
//!    the local frame.
//! 4. Measure the footprint edges in geocentric metres and divide by the
//!    chunk scale to get local sizes; pad horizontally and vertically by the
//!    buffer, with the vertical extent over-provisioned by `vertical_factor`.
//! 5. Centre the box on the footprint midpoint, dropped by `center_drop`
//!    vertical units below the mean camera height.
//! 6. Orient the box along the footprint edges.

use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{CameraRecord, ChunkGeometry, CoordinateSystem, Region, SimilarityTransform};

/// Errors produced while computing a region.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoundingError {
    #[error("no aligned cameras in chunk")]
    NoAlignedCameras,
    #[error("chunk is not georeferenced (no local-to-global transform)")]
    Ungeoreferenced,
    #[error("chunk transform has degenerate scale {scale}")]
    DegenerateScale { scale: f64 },
    #[error("chunk transform is not invertible")]
    SingularTransform,
}

/// Horizontal footprint in CRS units (degrees for geographic systems).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HorizontalBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl HorizontalBounds {
    /// Small fixed footprint used to keep test runs spatially bounded.
    pub const TEST_AREA: Self = Self {
        min_x: -76.402_939,
        max_x: -76.402_053,
        min_y: -0.683_361,
        max_y: -0.682_436,
    };

    fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    #[inline]
    pub fn mid_x(&self) -> f64 {
        (self.min_x + self.max_x) / 2.0
    }

    #[inline]
    pub fn mid_y(&self) -> f64 {
        (self.min_y + self.max_y) / 2.0
    }

    pub fn is_degenerate(&self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }

    pub fn contains(&self, x: f64, y: f64, tol: f64) -> bool {
        x >= self.min_x - tol && x <= self.max_x + tol && y >= self.min_y - tol && y <= self.max_y + tol
    }

    /// Footprint corners at height `z`, in the order
    /// `(min_x, min_y)`, `(min_x, max_y)`, `(max_x, max_y)`, `(max_x, min_y)`.
    pub fn corners(&self, z: f64) -> [Point3<f64>; 4] {
        [
            Point3::new(self.min_x, self.min_y, z),
            Point3::new(self.min_x, self.max_y, z),
            Point3::new(self.max_x, self.max_y, z),
            Point3::new(self.max_x, self.min_y, z),
        ]
    }
}

/// Tuning for [`RegionBoundingCalculator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionBoundingParams {
    /// Padding added to every extent, in percent.
    pub buffer_percent: f64,
    /// Vertical extent in multiples of the local vertical unit.
    pub vertical_factor: f64,
    /// Centre offset below the mean camera height, in vertical units.
    pub center_drop: f64,
    /// Replace the camera footprint by `test_footprint`.
    pub test_area: bool,
    pub test_footprint: HorizontalBounds,
}

impl Default for RegionBoundingParams {
    fn default() -> Self {
        Self {
            buffer_percent: 10.0,
            vertical_factor: 3.0,
            center_drop: 2.0,
            test_area: false,
            test_footprint: HorizontalBounds::TEST_AREA,
        }
    }
}

impl RegionBoundingParams {
    #[inline]
    pub fn padding_factor(&self) -> f64 {
        (100.0 + self.buffer_percent) / 100.0
    }
}

/// Result of a region computation, with the intermediate geometry kept for
/// reporting and checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub region: Region,
    /// Horizontal footprint actually used (after any test override).
    pub bounds: HorizontalBounds,
    /// Mean CRS height of the aligned cameras.
    pub elevation_mean: f64,
    /// Median camera position in CRS space (`z` is the mean height).
    pub median_center: Point3<f64>,
    pub corners_crs: [Point3<f64>; 4],
    pub corners_local: [Point3<f64>; 4],
    /// Region size before padding.
    pub unpadded_size: Vector3<f64>,
    pub aligned_cameras: usize,
}

/// Median of `values`; averages the two middle samples for even lengths.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Computes the oriented reconstruction region of a chunk.
#[derive(Clone, Debug, Default)]
pub struct RegionBoundingCalculator {
    params: RegionBoundingParams,
}

impl RegionBoundingCalculator {
    pub fn new(params: RegionBoundingParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &RegionBoundingParams {
        &self.params
    }

    /// Compute the region for `cameras` under the chunk transform `transform`.
    ///
    /// Unaligned cameras are ignored. With fewer than two aligned cameras
    /// (and no test override) the footprint collapses and the orientation
    /// degenerates; that case is reported as-is and the region rotation is
    /// left non-finite (see [`Region::is_finite`]).
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, cameras, transform, crs), fields(cameras = cameras.len()))
    )]
    pub fn compute(
        &self,
        cameras: &[CameraRecord],
        transform: &SimilarityTransform,
        crs: &dyn CoordinateSystem,
    ) -> Result<RegionBounds, BoundingError> {
        let s = transform.scale();
        if !s.is_finite() || s <= f64::EPSILON {
            return Err(BoundingError::DegenerateScale { scale: s });
        }
        let inv = transform
            .inverse()
            .ok_or(BoundingError::SingularTransform)?;

        let mut bounds = HorizontalBounds::empty();
        let mut xs = Vec::with_capacity(cameras.len());
        let mut ys = Vec::with_capacity(cameras.len());
        let mut z_sum = 0.0;
        for camera in cameras.iter().filter(|c| c.is_aligned()) {
            let coord = crs.project(&transform.mulp(&camera.center));
            bounds.include(coord.x, coord.y);
            z_sum += coord.z;
            xs.push(coord.x);
            ys.push(coord.y);
        }
        let aligned = xs.len();
        if aligned == 0 {
            return Err(BoundingError::NoAlignedCameras);
        }
        let z = z_sum / aligned as f64;

        if self.params.test_area {
            bounds = self.params.test_footprint;
        } else if bounds.is_degenerate() {
            log::warn!(
                "camera footprint is degenerate ({aligned} aligned cameras); region orientation is undefined"
            );
        }

        let median_center = Point3::new(
            median(&mut xs).unwrap_or(bounds.mid_x()),
            median(&mut ys).unwrap_or(bounds.mid_y()),
            z,
        );

        let corners_crs = bounds.corners(z);
        let corners_local = corners_crs.map(|c| inv.mulp(&crs.unproject(&c)));
        let [c0, c1, _, c3] = corners_local;

        let side1 = c0 - c1;
        let side2 = c0 - c3;
        let g0 = transform.mulp(&c0);
        let side1g = g0 - transform.mulp(&c1);
        let side2g = g0 - transform.mulp(&c3);
        let side3g = g0 - transform.mulp(&Point3::new(c0.x, c0.y, 0.0));

        let unpadded_size = Vector3::new(
            side2g.norm() / s,
            side1g.norm() / s,
            self.params.vertical_factor * side3g.norm() / s,
        );
        let size = unpadded_size * self.params.padding_factor();

        let center_crs = Point3::new(
            bounds.mid_x(),
            bounds.mid_y(),
            z - self.params.center_drop * side3g.z,
        );
        let center = inv.mulp(&crs.unproject(&center_crs));

        let rotation = footprint_rotation(&side1, &side2);

        log::debug!(
            "region: {aligned} cameras, median=({:.7}, {:.7}), size=({:.2}, {:.2}, {:.2})",
            median_center.x,
            median_center.y,
            size.x,
            size.y,
            size.z
        );

        Ok(RegionBounds {
            region: Region {
                center,
                size,
                rotation,
            },
            bounds,
            elevation_mean: z,
            median_center,
            corners_crs,
            corners_local,
            unpadded_size,
            aligned_cameras: aligned,
        })
    }

    /// Compute the region from the chunk's current cameras and make it the
    /// chunk's active region.
    pub fn resize_region<G: ChunkGeometry + ?Sized>(
        &self,
        chunk: &mut G,
    ) -> Result<RegionBounds, BoundingError> {
        let transform = chunk.transform().ok_or(BoundingError::Ungeoreferenced)?;
        let cameras = chunk.cameras();
        let bounds = self.compute(&cameras, &transform, chunk.crs())?;
        chunk.set_region(bounds.region);
        Ok(bounds)
    }
}

/// Region rotation from two footprint edges sharing corner 0.
///
/// Rows of the basis are `[horizontal, vertical, -normal]`; the engine stores
/// the transpose.
fn footprint_rotation(side1: &Vector3<f64>, side2: &Vector3<f64>) -> Matrix3<f64> {
    let normal = side1.cross(side2).normalize();
    let horizontal = (-side1.cross(&normal)).normalize();
    let vertical = side1.normalize();
    let basis = Matrix3::from_rows(&[
        horizontal.transpose(),
        vertical.transpose(),
        (-normal).transpose(),
    ]);
    basis.transpose()
}
