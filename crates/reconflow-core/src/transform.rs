use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Local-to-global similarity transform of a chunk.
///
/// Maps points from the chunk's local frame to geocentric (ECEF) coordinates:
/// `p_global = s * R * p_local + t`. The matrix is kept in homogeneous form so
/// it can round-trip through project documents unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityTransform {
    pub matrix: Matrix4<f64>,
}

impl SimilarityTransform {
    pub fn new(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    pub fn identity() -> Self {
        Self::new(Matrix4::identity())
    }

    /// Compose from a uniform scale, a rotation and a translation.
    pub fn from_parts(scale: f64, rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&(rotation * scale));
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        Self::new(m)
    }

    /// Uniform scale factor (norm of the first basis column).
    #[inline]
    pub fn scale(&self) -> f64 {
        self.matrix.fixed_view::<3, 1>(0, 0).norm()
    }

    /// Transform a point (applies translation).
    #[inline]
    pub fn mulp(&self, p: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(p)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(Self::new)
    }
}

impl Default for SimilarityTransform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    #[test]
    fn scale_and_round_trip() {
        let rot = Rotation3::from_euler_angles(0.1, -0.4, 1.2).into_inner();
        let t = SimilarityTransform::from_parts(2.5, rot, Vector3::new(10.0, -3.0, 7.0));
        assert_relative_eq!(t.scale(), 2.5, epsilon = 1e-12);

        let p = Point3::new(1.0, 2.0, 3.0);
        let inv = t.inverse().unwrap();
        assert_relative_eq!(inv.mulp(&t.mulp(&p)), p, epsilon = 1e-9);
        assert_relative_eq!(inv.scale(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn zero_scale_has_no_inverse() {
        let t = SimilarityTransform::from_parts(0.0, Matrix3::identity(), Vector3::zeros());
        assert!(t.inverse().is_none());
        assert_eq!(t.scale(), 0.0);
    }
}
