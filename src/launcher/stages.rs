// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Stage workflows.
//!
//! # Bake
//!
//! Baking takes one package collection version and snapshots its packages,
//! tools, and environment variables into a new stage version. The operator
//! may replace the tool and environment variable selection while baking.
//!
//! # Revert
//!
//! Reverting makes an existing stage version active again. No document is
//! created, and nothing but activation state changes.
//!
//! # Push
//!
//! Pushing copies the configuration of one stage version into a new version
//! of another (or the same) stage name. The source version is left untouched.

use crate::{
    launcher::{require, ChangeEvent, Launcher, LauncherError, Result},
    model::{EnvironmentVariables, Stage, StageHistory, StageId, Tool},
    store::{StageFilter, StoreError},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Input of [`Launcher::bake`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BakeRequest {
    /// Source package collection version.
    pub version: String,

    /// URI scope of source package collection.
    pub uri: String,

    /// Stage name to bake into.
    pub name: String,

    /// Tool selection replacing the source's tools.
    #[serde(default)]
    pub tools: Option<Vec<Tool>>,

    /// Environment variables replacing the source's environment variables.
    #[serde(default)]
    pub environment_variables: Option<EnvironmentVariables>,

    /// Resolved environment artifact produced for this bake.
    #[serde(default)]
    pub rxt_path: String,

    pub created_by: String,
}

impl Launcher {
    /// Bake new stage version from package collection.
    ///
    /// The new version becomes the active one for its name.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::MissingField`] if stage name, version, or
    ///   URI is empty. Nothing is written in that case.
    /// - Return [`LauncherError::CollectionNotFound`] if source package
    ///   collection does not exist.
    /// - Return [`LauncherError::Integrity`] if activation left the name
    ///   without exactly one active version.
    /// - Return [`LauncherError::Store`] if document store fails.
    #[instrument(skip(self, request), fields(name = %request.name, version = %request.version), level = "debug")]
    pub async fn bake(&self, request: BakeRequest) -> Result<Stage> {
        require("stage name", &request.name)?;
        require("version", &request.version)?;
        require("uri", &request.uri)?;

        let source = self.collection(&request.version, &request.uri).await?;
        let stage = Stage {
            id: None,
            name: request.name,
            uri: source.uri,
            from_version: source.version,
            packages: source.packages,
            rxt_path: request.rxt_path,
            tools: request.tools.unwrap_or(source.tools),
            environment_variables: request
                .environment_variables
                .unwrap_or(source.environment_variables),
            active: true,
            created_at: Utc::now(),
            created_by: request.created_by,
        };

        let id = self.store().insert_active_stage(stage.clone()).await?;
        info!("baked stage {:?} from {:?} as {id}", stage.name, stage.from_version);
        self.check_integrity(&stage.name).await?;
        self.notify(ChangeEvent::StageBaked {
            id: id.clone(),
            name: stage.name.clone(),
            uri: stage.uri.clone(),
        });

        Ok(Stage {
            id: Some(id),
            ..stage
        })
    }

    /// Make stored stage version the active one for its name.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::StageNotFound`] if stage does not exist.
    /// - Return [`LauncherError::Integrity`] if activation left the name
    ///   without exactly one active version.
    /// - Return [`LauncherError::Store`] if document store fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn revert(&self, id: &StageId) -> Result<Stage> {
        let target = self.stage(id).await?;
        self.store().set_active_stage(&target.name, id).await?;
        info!("reverted stage {:?} to {id}", target.name);
        self.check_integrity(&target.name).await?;
        self.notify(ChangeEvent::StageReverted {
            id: id.clone(),
            name: target.name.clone(),
            uri: target.uri.clone(),
        });

        Ok(Stage {
            active: true,
            ..target
        })
    }

    /// Copy stage configuration into new version of target stage name.
    ///
    /// The target name may be new, may already have history, or may even be
    /// the source's own name.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::MissingField`] if target name is empty.
    ///   Nothing is written in that case.
    /// - Return [`LauncherError::Integrity`] if activation left the target
    ///   name without exactly one active version.
    /// - Return [`LauncherError::Store`] if document store fails.
    #[instrument(skip(self, source, created_by), fields(source = %source.name), level = "debug")]
    pub async fn push(&self, source: &Stage, target: &str, created_by: &str) -> Result<Stage> {
        require("target stage name", target)?;

        let stage = source.copy_as(target, created_by);
        let id = self.store().insert_active_stage(stage.clone()).await?;
        info!("pushed stage {:?} to {target:?} as {id}", source.name);
        self.check_integrity(target).await?;
        self.notify(ChangeEvent::StagePushed {
            id: id.clone(),
            source: source.id.clone(),
            name: stage.name.clone(),
            uri: stage.uri.clone(),
        });

        Ok(Stage {
            id: Some(id),
            active: true,
            ..stage
        })
    }

    /// Push stored stage version into target stage name.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::MissingField`] if target name is empty.
    /// - Return [`LauncherError::StageNotFound`] if source does not exist.
    /// - Return [`LauncherError::Store`] if document store fails.
    pub async fn push_by_id(&self, id: &StageId, target: &str, created_by: &str) -> Result<Stage> {
        require("target stage name", target)?;
        let source = self.stage(id).await?;
        self.push(&source, target, created_by).await
    }

    /// Find stored stage version.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::StageNotFound`] if stage does not exist.
    /// - Return [`LauncherError::Store`] if document store fails.
    pub async fn stage(&self, id: &StageId) -> Result<Stage> {
        let stages = match self.store().find_stages(&StageFilter::all().id(id.clone())).await {
            Ok(stages) => stages,
            // INVARIANT: An id the backend cannot parse names no stored stage.
            Err(StoreError::InvalidId(_)) => Vec::new(),
            Err(error) => return Err(error.into()),
        };

        stages
            .into_iter()
            .next()
            .ok_or_else(|| LauncherError::StageNotFound(id.clone()))
    }

    /// Full history of stage name in URI scope, newest first.
    ///
    /// Versions created at the same instant keep reverse insertion order.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::Store`] if document store fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn history(&self, name: &str, uri: &str) -> Result<StageHistory> {
        let mut versions = self
            .store()
            .find_stages(&StageFilter::all().name(name).uri(uri))
            .await?;
        versions.reverse();
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!("found {} versions", versions.len());

        Ok(StageHistory {
            name: name.to_owned(),
            uri: uri.to_owned(),
            versions,
        })
    }

    /// List stages in exact URI scope.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::Store`] if document store fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn stages_by_uri(&self, uri: &str, active_only: bool) -> Result<Vec<Stage>> {
        let mut filter = StageFilter::all().uri(uri);
        if active_only {
            filter = filter.active(true);
        }

        Ok(self.store().find_stages(&filter).await?)
    }

    /// List every distinct stage name across all scopes.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::Store`] if document store fails.
    pub async fn stage_names(&self) -> Result<Vec<String>> {
        Ok(self.store().distinct_stage_names().await?)
    }
}
