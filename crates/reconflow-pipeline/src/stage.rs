use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress of a chunk through the workflow within one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initialized,
    Aligned,
    SparseFiltered,
    RegionResized,
    DenseBuilt,
    Exported,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Initialized => "initialized",
            Stage::Aligned => "aligned",
            Stage::SparseFiltered => "sparse-filtered",
            Stage::RegionResized => "region-resized",
            Stage::DenseBuilt => "dense-built",
            Stage::Exported => "exported",
        };
        f.write_str(name)
    }
}

/// Which stages the caller asked for. Fixed for the whole run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFlags {
    pub align_requested: bool,
    pub dense_requested: bool,
    pub export_requested: bool,
    /// Recompute the reconstruction region from the aligned cameras.
    pub resize_region: bool,
}

impl StageFlags {
    /// True when neither alignment nor dense reconstruction was requested.
    pub fn no_processing(&self) -> bool {
        !self.align_requested && !self.dense_requested
    }
}

/// Dense reconstruction quality, best first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenseQualityLevel {
    Ultra,
    #[default]
    High,
    Medium,
    Low,
    Lowest,
}

impl DenseQualityLevel {
    pub const ALL: [DenseQualityLevel; 5] = [
        DenseQualityLevel::Ultra,
        DenseQualityLevel::High,
        DenseQualityLevel::Medium,
        DenseQualityLevel::Low,
        DenseQualityLevel::Lowest,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DenseQualityLevel::Ultra => "ultra",
            DenseQualityLevel::High => "high",
            DenseQualityLevel::Medium => "medium",
            DenseQualityLevel::Low => "low",
            DenseQualityLevel::Lowest => "lowest",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.key() == key)
    }

    /// Parse a quality key, falling back to `High` for unknown keys.
    pub fn from_key_or_default(key: &str) -> Self {
        Self::from_key(key).unwrap_or_else(|| {
            log::warn!(
                "unknown dense cloud quality '{key}', using '{}'",
                Self::default().key()
            );
            Self::default()
        })
    }
}

impl fmt::Display for DenseQualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
