use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};

/// One camera of a chunk.
///
/// `center` is expressed in the chunk's local frame. Only cameras with a
/// resolved `transform` (i.e. successfully aligned) take part in geometry
/// computations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub label: String,
    pub center: Point3<f64>,
    #[serde(default)]
    pub transform: Option<Matrix4<f64>>,
}

impl CameraRecord {
    pub fn unaligned(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            center: Point3::origin(),
            transform: None,
        }
    }

    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.transform.is_some()
    }
}
