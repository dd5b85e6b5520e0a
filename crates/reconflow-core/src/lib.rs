//! Core geometry for photogrammetry reconstruction workflows.
//!
//! This crate is purely geometric and engine-agnostic:
//! - [`SimilarityTransform`]: a chunk's local-to-geocentric similarity.
//! - [`GeographicCrs`]: geodetic longitude/latitude/height on an ellipsoid,
//!   implementing [`CoordinateSystem`].
//! - [`Region`] and the [`ChunkGeometry`] capability trait engines implement.
//! - [`RegionBoundingCalculator`]: the padded, oriented region enclosing the
//!   aligned camera rig.
//!
//! ## Quickstart
//!
//! ```
//! use nalgebra::{Matrix4, Point3};
//! use reconflow_core::{
//!     CameraRecord, CoordinateSystem, GeographicCrs, RegionBoundingCalculator,
//!     SimilarityTransform,
//! };
//!
//! let crs = GeographicCrs::wgs84();
//! let origin = crs.unproject(&Point3::new(-76.4025, -0.683, 3000.0));
//! let transform = SimilarityTransform::from_parts(
//!     1.0,
//!     crs.enu_basis(-76.4025, -0.683),
//!     origin.coords,
//! );
//! let inv = transform.inverse().unwrap();
//!
//! let cameras: Vec<CameraRecord> = [(-76.4030, -0.6835), (-76.4020, -0.6825)]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, &(lon, lat))| CameraRecord {
//!         label: format!("IMG_{i}.JPG"),
//!         center: inv.mulp(&crs.unproject(&Point3::new(lon, lat, 3050.0))),
//!         transform: Some(Matrix4::identity()),
//!     })
//!     .collect();
//!
//! let bounds = RegionBoundingCalculator::default()
//!     .compute(&cameras, &transform, &crs)
//!     .unwrap();
//! assert!(bounds.region.size.x > 0.0);
//! ```

mod bounding;
mod camera;
mod crs;
mod logger;
mod region;
mod transform;

pub use bounding::{
    median, BoundingError, HorizontalBounds, RegionBoundingCalculator, RegionBoundingParams,
    RegionBounds,
};
pub use camera::CameraRecord;
pub use crs::{CoordinateSystem, Ellipsoid, GeographicCrs};
pub use region::{ChunkGeometry, Region};
pub use transform::SimilarityTransform;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
