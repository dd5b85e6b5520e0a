//! Gridded products of the simulated engine.

use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

/// Cell value marking "no data".
pub const NO_DATA: f32 = -32_767.0;

/// North-up raster; row 0 is the northern (max `y`) edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    /// `(min_x, max_y)` of the top-left cell corner.
    pub origin: [f64; 2],
    pub cell_size: f64,
    pub values: Vec<f32>,
}

impl Raster {
    /// Grid `(x, y, value)` samples keeping the maximum per cell.
    ///
    /// The longer side of the sample extent gets at most `max_dim` cells.
    pub fn grid_max(samples: &[(f64, f64, f64)], max_dim: u32) -> Option<Self> {
        let first = samples.first()?;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.0, first.0, first.1, first.1);
        for &(x, y, _) in samples {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let extent = (max_x - min_x).max(max_y - min_y);
        let cell_size = if extent > 0.0 {
            extent / (max_dim.max(2) - 1) as f64
        } else {
            1.0
        };
        let width = ((max_x - min_x) / cell_size).floor() as u32 + 1;
        let height = ((max_y - min_y) / cell_size).floor() as u32 + 1;

        let mut values = vec![NO_DATA; (width * height) as usize];
        for &(x, y, v) in samples {
            let col = (((x - min_x) / cell_size) as u32).min(width - 1);
            let row = (((max_y - y) / cell_size) as u32).min(height - 1);
            let cell = &mut values[(row * width + col) as usize];
            let v = v as f32;
            if *cell == NO_DATA || v > *cell {
                *cell = v;
            }
        }

        Some(Self {
            width,
            height,
            origin: [min_x, max_y],
            cell_size,
            values,
        })
    }

    #[inline]
    pub fn get(&self, col: u32, row: u32) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let v = self.values[(row * self.width + col) as usize];
        (v != NO_DATA).then_some(v)
    }

    pub fn valid_cells(&self) -> usize {
        self.values.iter().filter(|&&v| v != NO_DATA).count()
    }

    /// Min and max of the valid cells.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .copied()
            .filter(|&v| v != NO_DATA)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Shaded relief in `[0, 255]`, with the sun at `azimuth_deg` (clockwise
    /// from north) and `altitude_deg` above the horizon. Border cells and
    /// cells next to gaps are left as no-data.
    pub fn hillshade(&self, azimuth_deg: f64, altitude_deg: f64) -> Self {
        let zenith = (90.0 - altitude_deg).to_radians();
        let azimuth = (360.0 - azimuth_deg + 90.0).to_radians();
        let mut values = vec![NO_DATA; self.values.len()];

        for row in 1..self.height.saturating_sub(1) {
            for col in 1..self.width.saturating_sub(1) {
                let z = |dc: i32, dr: i32| {
                    self.get((col as i32 + dc) as u32, (row as i32 + dr) as u32)
                        .map(f64::from)
                };
                let window = [
                    z(-1, -1),
                    z(0, -1),
                    z(1, -1),
                    z(-1, 0),
                    z(1, 0),
                    z(-1, 1),
                    z(0, 1),
                    z(1, 1),
                ];
                let Some([a, b, c, d, f, g, h, i]) = collect_window(window) else {
                    continue;
                };
                // Horn's method.
                let dzdx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * self.cell_size);
                let dzdy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * self.cell_size);
                let slope = dzdx.hypot(dzdy).atan();
                let aspect = dzdy.atan2(-dzdx);
                let shade = zenith.cos() * slope.cos()
                    + zenith.sin() * slope.sin() * (azimuth - aspect).cos();
                values[(row * self.width + col) as usize] = (255.0 * shade).clamp(0.0, 255.0) as f32;
            }
        }

        Self {
            values,
            ..self.clone()
        }
    }

    /// Valid range stretched to 16 bits; no-data maps to 0.
    pub fn to_luma16(&self) -> Option<ImageBuffer<Luma<u16>, Vec<u16>>> {
        let (lo, hi) = self.value_range().unwrap_or((0.0, 0.0));
        let span = if hi > lo { hi - lo } else { 1.0 };
        let data = self
            .values
            .iter()
            .map(|&v| {
                if v == NO_DATA {
                    0
                } else {
                    (1.0 + (v - lo) / span * 65_534.0).round() as u16
                }
            })
            .collect();
        ImageBuffer::from_raw(self.width, self.height, data)
    }

    /// Values clamped to 8 bits; no-data maps to 0.
    pub fn to_luma8(&self) -> Option<GrayImage> {
        let data = self
            .values
            .iter()
            .map(|&v| if v == NO_DATA { 0 } else { v.clamp(0.0, 255.0) as u8 })
            .collect();
        GrayImage::from_raw(self.width, self.height, data)
    }
}

fn collect_window(window: [Option<f64>; 8]) -> Option<[f64; 8]> {
    let mut out = [0.0; 8];
    for (dst, src) in out.iter_mut().zip(window) {
        *dst = src?;
    }
    Some(out)
}
