//! Project identity and artifact lifecycle.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{PipelineConfig, PipelineError, ReconstructionEngine};

/// How the project name was obtained.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityOrigin {
    /// `requested_name + "_" + run_date`.
    Fresh { run_date: NaiveDate },
    /// Explicit name of an earlier project, used verbatim.
    Resumed,
}

/// Name and location of the project artifact and everything derived from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIdentity {
    pub base_path: PathBuf,
    pub name: String,
    pub origin: IdentityOrigin,
}

impl ProjectIdentity {
    /// Resolve the identity of a run.
    ///
    /// A non-empty `continue_name` wins and is used as-is; otherwise the name
    /// is `requested_name` suffixed with `today` as `_YYYY_MM_DD`.
    pub fn resolve(
        base_path: impl Into<PathBuf>,
        requested_name: &str,
        continue_name: &str,
        today: NaiveDate,
    ) -> Self {
        let base_path = base_path.into();
        if !continue_name.is_empty() {
            return Self {
                base_path,
                name: continue_name.to_string(),
                origin: IdentityOrigin::Resumed,
            };
        }
        Self {
            base_path,
            name: format!("{requested_name}_{}", today.format("%Y_%m_%d")),
            origin: IdentityOrigin::Fresh { run_date: today },
        }
    }

    #[inline]
    pub fn is_resumed(&self) -> bool {
        self.origin == IdentityOrigin::Resumed
    }

    /// `{base_path}/{name}{suffix}`.
    pub fn sibling(&self, suffix: &str) -> PathBuf {
        self.base_path.join(format!("{}{}", self.name, suffix))
    }

    pub fn project_path(&self, config: &PipelineConfig) -> PathBuf {
        self.sibling(&format!(".{}", config.project_extension))
    }

    pub fn engine_log_path(&self, config: &PipelineConfig) -> PathBuf {
        self.sibling(&config.engine_log_suffix)
    }

    pub fn dem_export_path(&self, config: &PipelineConfig) -> PathBuf {
        self.sibling(&format!("_dem.{}", config.raster_extension))
    }

    pub fn orthomosaic_export_path(&self, config: &PipelineConfig) -> PathBuf {
        self.sibling(&format!(".{}", config.raster_extension))
    }
}

/// An opened project artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectHandle {
    pub identity: ProjectIdentity,
    pub path: PathBuf,
    /// The artifact was created by this run.
    pub created: bool,
}

/// Owns creation, opening and saving of the project artifact.
pub struct ProjectStateManager<'a> {
    config: &'a PipelineConfig,
}

impl<'a> ProjectStateManager<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn resolve_identity(
        &self,
        base_path: &Path,
        requested_name: &str,
        continue_name: &str,
        today: NaiveDate,
    ) -> ProjectIdentity {
        ProjectIdentity::resolve(base_path, requested_name, continue_name, today)
    }

    /// Create an empty project with one chunk unless the artifact already
    /// exists. Returns whether a new artifact was written.
    pub fn ensure_project_exists<E: ReconstructionEngine + ?Sized>(
        &self,
        engine: &mut E,
        identity: &ProjectIdentity,
    ) -> Result<bool, PipelineError> {
        let path = identity.project_path(self.config);
        if path.exists() {
            log::debug!("project {} already exists", path.display());
            return Ok(false);
        }
        engine
            .create_project(&path)
            .map_err(|source| PipelineError::ProjectCreate {
                path: path.clone(),
                source,
            })?;
        log::info!("created project {}", path.display());
        Ok(true)
    }

    /// Make sure the artifact exists, then open it read-write.
    pub fn open<E: ReconstructionEngine + ?Sized>(
        &self,
        engine: &mut E,
        identity: &ProjectIdentity,
    ) -> Result<ProjectHandle, PipelineError> {
        let created = self.ensure_project_exists(engine, identity)?;
        let path = identity.project_path(self.config);
        engine.open_project(&path)?;
        log::info!("opened project {}", path.display());
        Ok(ProjectHandle {
            identity: identity.clone(),
            path,
            created,
        })
    }

    pub fn save<E: ReconstructionEngine + ?Sized>(&self, engine: &mut E) -> Result<(), PipelineError> {
        engine.save_project()?;
        Ok(())
    }
}
