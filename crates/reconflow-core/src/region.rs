use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{CameraRecord, CoordinateSystem, SimilarityTransform};

/// Oriented bounding volume in a chunk's local frame.
///
/// `rotation` follows the engine's layout: its *columns* are the region axes,
/// so a local point maps into region coordinates via `rotation^T * (p - center)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub center: Point3<f64>,
    pub size: Vector3<f64>,
    pub rotation: Matrix3<f64>,
}

impl Region {
    /// Axis-aligned region.
    pub fn axis_aligned(center: Point3<f64>, size: Vector3<f64>) -> Self {
        Self {
            center,
            size,
            rotation: Matrix3::identity(),
        }
    }

    /// Point in region coordinates (origin at the centre, axes along the box).
    #[inline]
    pub fn to_region_frame(&self, p: &Point3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * (p - self.center)
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        let q = self.to_region_frame(p);
        (0..3).all(|i| q[i].abs() <= 0.5 * self.size[i])
    }

    /// `false` when any component is NaN or infinite, as happens for a
    /// footprint that collapsed to a point.
    pub fn is_finite(&self) -> bool {
        self.center.iter().all(|v| v.is_finite())
            && self.size.iter().all(|v| v.is_finite())
            && self.rotation.iter().all(|v| v.is_finite())
    }
}

/// Read/write access to the geometry of the active chunk.
///
/// This is the narrow slice of a reconstruction engine that region bounding
/// needs; engines implement it next to their full processing contract.
pub trait ChunkGeometry {
    /// All cameras of the chunk, aligned or not.
    fn cameras(&self) -> Vec<CameraRecord>;

    /// Local-to-geocentric transform, `None` until the chunk is georeferenced.
    fn transform(&self) -> Option<SimilarityTransform>;

    /// CRS the chunk's reference data is expressed in.
    fn crs(&self) -> &dyn CoordinateSystem;

    fn region(&self) -> Option<Region>;

    /// Replace the active region.
    fn set_region(&mut self, region: Region);
}
