//! Ground-truth camera reference file.
//!
//! Comma-delimited, one header row, then one row per image:
//! `file_name, lon, lat, elevation, yaw, pitch, roll`. Columns are matched by
//! position; header names are ignored. Fields are taken verbatim, without
//! whitespace trimming.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::PipelineError;

/// Delimiter of the reference file.
pub const REFERENCE_DELIMITER: char = ',';

/// Reference position and orientation of one image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub file_name: String,
    pub lon: f64,
    pub lat: f64,
    pub elevation: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

fn reader_for(path: &Path, delimiter: char) -> Result<csv::Reader<std::fs::File>, csv::Error> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
}

/// Read every entry of a reference file, in file order.
pub fn read_reference_entries(
    path: &Path,
    delimiter: char,
) -> Result<Vec<ReferenceEntry>, csv::Error> {
    let mut reader = reader_for(path, delimiter)?;
    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record?;
        entries.push(record.deserialize(None)?);
    }
    Ok(entries)
}

/// Pre-import check of the reference file.
///
/// Only the first data row is inspected: its file name must end with the
/// image suffix the run was configured with. Later rows are not checked.
#[derive(Clone, Debug)]
pub struct ReferenceValidator {
    expected_suffix: String,
}

impl ReferenceValidator {
    pub fn new(expected_suffix: impl Into<String>) -> Self {
        Self {
            expected_suffix: expected_suffix.into(),
        }
    }

    /// Validate `path`, returning the first image name on success.
    pub fn validate(&self, path: &Path) -> Result<String, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::MissingReferenceFile {
                path: path.to_path_buf(),
            });
        }

        let read_err = |source| PipelineError::ReferenceRead {
            path: PathBuf::from(path),
            source,
        };
        let mut reader = reader_for(path, REFERENCE_DELIMITER).map_err(read_err)?;

        let mut record = csv::StringRecord::new();
        if !reader.read_record(&mut record).map_err(read_err)? {
            return Err(PipelineError::EmptyReferenceFile {
                path: path.to_path_buf(),
            });
        }

        let first_image = record.get(0).unwrap_or_default();
        if !first_image.ends_with(&self.expected_suffix) {
            return Err(PipelineError::ReferenceTypeMismatch {
                expected: self.expected_suffix.clone(),
                first_image: first_image.to_string(),
            });
        }
        Ok(first_image.to_string())
    }
}
