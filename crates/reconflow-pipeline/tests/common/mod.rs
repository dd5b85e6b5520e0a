#![allow(dead_code)]

use chrono::NaiveDate;
use std::fs;
use std::path::Path;

/// Camera positions inside the fixed test footprint.
pub const SURVEY: [(&str, f64, f64, f64); 3] = [
    ("DJI_0001", -76.402_70, -0.683_10, 3010.0),
    ("DJI_0002", -76.402_40, -0.682_80, 3012.0),
    ("DJI_0003", -76.402_20, -0.683_00, 3008.0),
];

pub fn run_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 3, 16).expect("valid date")
}

/// Lay out `images/` and the reference file under `base`.
///
/// Images get `image_suffix`; the reference rows name them with
/// `reference_suffix`.
pub fn write_site(base: &Path, image_suffix: &str, reference_suffix: &str) {
    write_cameras(base, &SURVEY, image_suffix, reference_suffix);
}

pub fn write_cameras(
    base: &Path,
    cameras: &[(&str, f64, f64, f64)],
    image_suffix: &str,
    reference_suffix: &str,
) {
    let images = base.join("images").join("flight_1");
    fs::create_dir_all(&images).expect("create image folder");
    let mut csv = String::from("file_name,lon,lat,elevation,yaw,pitch,roll\n");
    for (name, lon, lat, h) in cameras {
        fs::write(images.join(format!("{name}{image_suffix}")), b"jpeg").expect("write image");
        csv.push_str(&format!("{name}{reference_suffix},{lon},{lat},{h},90,0,0\n"));
    }
    fs::write(base.join("images_metadata_gps.csv"), csv).expect("write reference");
}
