//! Geographic coordinate reference systems.
//!
//! A chunk stores camera and region geometry in a local frame that maps to
//! geocentric (ECEF) coordinates through its [`SimilarityTransform`]. The CRS
//! converts between geocentric coordinates and the projected representation
//! used by reference files, here `(longitude°, latitude°, ellipsoidal height)`.
//!
//! [`SimilarityTransform`]: crate::SimilarityTransform

use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Projection between geocentric coordinates and a CRS.
pub trait CoordinateSystem {
    /// EPSG identifier of the CRS.
    fn epsg(&self) -> u32;

    /// Geocentric (ECEF, metres) to CRS coordinates.
    fn project(&self, geocentric: &Point3<f64>) -> Point3<f64>;

    /// CRS coordinates to geocentric (ECEF, metres).
    fn unproject(&self, coord: &Point3<f64>) -> Point3<f64>;
}

/// Reference ellipsoid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Semi-major axis in metres.
    pub semi_major: f64,
    /// Flattening.
    pub flattening: f64,
}

impl Ellipsoid {
    pub const WGS84: Self = Self {
        semi_major: 6_378_137.0,
        flattening: 1.0 / 298.257_223_563,
    };

    /// First eccentricity squared.
    #[inline]
    pub fn e2(&self) -> f64 {
        self.flattening * (2.0 - self.flattening)
    }

    /// Prime vertical radius of curvature at geodetic latitude `lat` (radians).
    #[inline]
    fn prime_vertical_radius(&self, lat: f64) -> f64 {
        let s = lat.sin();
        self.semi_major / (1.0 - self.e2() * s * s).sqrt()
    }
}

/// Geodetic longitude/latitude/height CRS on an ellipsoid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeographicCrs {
    pub epsg: u32,
    pub ellipsoid: Ellipsoid,
}

const MAX_LATITUDE_ITERS: usize = 10;
const LATITUDE_TOL: f64 = 1e-14;

impl GeographicCrs {
    /// EPSG:4326.
    pub fn wgs84() -> Self {
        Self {
            epsg: 4326,
            ellipsoid: Ellipsoid::WGS84,
        }
    }

    /// Look up a supported geographic CRS by EPSG code.
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        match epsg {
            4326 => Some(Self::wgs84()),
            _ => None,
        }
    }

    /// Rotation whose columns are the local east, north and up directions at
    /// the given geodetic position, expressed in geocentric axes.
    pub fn enu_basis(&self, lon_deg: f64, lat_deg: f64) -> Matrix3<f64> {
        let (sl, cl) = lon_deg.to_radians().sin_cos();
        let (sp, cp) = lat_deg.to_radians().sin_cos();
        let east = Vector3::new(-sl, cl, 0.0);
        let north = Vector3::new(-sp * cl, -sp * sl, cp);
        let up = Vector3::new(cp * cl, cp * sl, sp);
        Matrix3::from_columns(&[east, north, up])
    }
}

impl Default for GeographicCrs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl CoordinateSystem for GeographicCrs {
    fn epsg(&self) -> u32 {
        self.epsg
    }

    fn project(&self, geocentric: &Point3<f64>) -> Point3<f64> {
        let e2 = self.ellipsoid.e2();
        let (x, y, z) = (geocentric.x, geocentric.y, geocentric.z);
        let lon = y.atan2(x);
        let p = x.hypot(y);

        // Fixed-point iteration on latitude; converges to sub-millimetre in a
        // handful of steps for terrestrial heights.
        let mut lat = z.atan2(p * (1.0 - e2));
        let mut h = 0.0;
        for _ in 0..MAX_LATITUDE_ITERS {
            let n = self.ellipsoid.prime_vertical_radius(lat);
            let (sl, cl) = lat.sin_cos();
            h = if cl.abs() > 1e-10 {
                p / cl - n
            } else {
                z / sl - n * (1.0 - e2)
            };
            let next = z.atan2(p * (1.0 - e2 * n / (n + h)));
            let done = (next - lat).abs() < LATITUDE_TOL;
            lat = next;
            if done {
                break;
            }
        }

        Point3::new(lon.to_degrees(), lat.to_degrees(), h)
    }

    fn unproject(&self, coord: &Point3<f64>) -> Point3<f64> {
        let e2 = self.ellipsoid.e2();
        let lon = coord.x.to_radians();
        let lat = coord.y.to_radians();
        let h = coord.z;
        let n = self.ellipsoid.prime_vertical_radius(lat);
        let (sl, cl) = lon.sin_cos();
        let (sp, cp) = lat.sin_cos();
        Point3::new(
            (n + h) * cp * cl,
            (n + h) * cp * sl,
            (n * (1.0 - e2) + h) * sp,
        )
    }
}
