// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Command layer.
//!
//! Named operations that take structured arguments, and return structured
//! results or human-readable error strings. This is the surface that a
//! presentation layer (desktop shell, IPC bridge, or the bundled CLI) calls.
//! Nothing here knows about the transport used to reach it.
//!
//! Listings distinguish "nothing stored" from failure: an empty result is
//! always `Ok`, and only real failures come back as `Err`.

use crate::{
    launcher::{BakeRequest, ChangeEvent, Launcher},
    model::{PackageCollection, ScopeListing, Stage, StageId, Tool},
};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Shared state handed to every command.
#[derive(Clone)]
pub struct AppState {
    pub launcher: Launcher,
}

impl AppState {
    pub fn new(launcher: Launcher) -> Self {
        Self { launcher }
    }
}

/// Result of package collection listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PackageCollectionResult {
    pub success: bool,

    /// Explanation shown in place of an empty listing.
    pub message: Option<String>,

    pub collections: Option<Vec<PackageCollection>>,
}

impl PackageCollectionResult {
    fn from_listing(collections: Vec<PackageCollection>, empty_message: String) -> Self {
        if collections.is_empty() {
            Self {
                success: true,
                message: Some(empty_message),
                collections: None,
            }
        } else {
            Self {
                success: true,
                message: None,
                collections: Some(collections),
            }
        }
    }
}

/// Presentation state of one interactive session.
///
/// Owned by the presentation layer. Decides which listings must be queried
/// again after a change.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Currently browsed URI scope.
    pub uri: Option<String>,

    /// Stage name whose history is currently shown.
    pub stage_name: Option<String>,

    pub username: Option<String>,
}

impl SessionContext {
    /// Check if change affects anything the session currently shows.
    pub fn needs_refresh(&self, event: &ChangeEvent) -> bool {
        let same_uri = self.uri.as_deref() == Some(event.uri());
        let same_stage = match (&self.stage_name, event.stage_name()) {
            (Some(shown), Some(changed)) => shown == changed,
            _ => false,
        };
        same_uri || same_stage
    }
}

/// Save new package collection version.
#[instrument(skip(state, collection), fields(version = %collection.version), level = "debug")]
pub async fn save_package_collection(
    state: &AppState,
    collection: PackageCollection,
) -> Result<bool, String> {
    let version = collection.version.clone();
    state
        .launcher
        .save_collection(collection)
        .await
        .map_err(|err| err.to_string())?;
    info!("package collection {version:?} saved");

    Ok(true)
}

/// Derive new package collection version from existing one.
pub async fn derive_package_collection(
    state: &AppState,
    version: String,
    uri: String,
    new_version: String,
    created_by: String,
) -> Result<PackageCollection, String> {
    state
        .launcher
        .derive_collection(&version, &uri, &new_version, &created_by)
        .await
        .map_err(|err| err.to_string())
}

/// List package collections in URI scope.
pub async fn get_package_collections_by_uri(
    state: &AppState,
    uri: String,
) -> Result<PackageCollectionResult, String> {
    let collections = state
        .launcher
        .collections_by_uri(&uri)
        .await
        .map_err(|err| err.to_string())?;

    Ok(PackageCollectionResult::from_listing(
        collections,
        format!("no collection found in {uri}"),
    ))
}

/// List every package collection.
pub async fn get_all_package_collections(
    state: &AppState,
) -> Result<PackageCollectionResult, String> {
    let collections = state
        .launcher
        .all_collections()
        .await
        .map_err(|err| err.to_string())?;

    Ok(PackageCollectionResult::from_listing(
        collections,
        "no package collections found in database".into(),
    ))
}

/// List tools of package collection version.
pub async fn get_package_collection_tools(
    state: &AppState,
    version: String,
    uri: String,
) -> Result<Vec<Tool>, String> {
    state
        .launcher
        .collection_tools(&version, &uri)
        .await
        .map_err(|err| err.to_string())
}

/// Bake stage from package collection.
pub async fn bake_stage(state: &AppState, request: BakeRequest) -> Result<Stage, String> {
    state
        .launcher
        .bake(request)
        .await
        .map_err(|err| err.to_string())
}

/// List stages in URI scope.
pub async fn get_stages_by_uri(
    state: &AppState,
    uri: String,
    active_only: Option<bool>,
) -> Result<Vec<Stage>, String> {
    state
        .launcher
        .stages_by_uri(&uri, active_only.unwrap_or(false))
        .await
        .map_err(|err| err.to_string())
}

/// Make stored stage version active again.
pub async fn revert_stage(state: &AppState, stage_id: String) -> Result<bool, String> {
    state
        .launcher
        .revert(&StageId::new(stage_id))
        .await
        .map_err(|err| err.to_string())?;

    Ok(true)
}

/// Copy stage configuration into target stage name.
pub async fn push_stage(
    state: &AppState,
    source: Stage,
    target_name: String,
    created_by: String,
) -> Result<Stage, String> {
    state
        .launcher
        .push(&source, &target_name, &created_by)
        .await
        .map_err(|err| err.to_string())
}

/// Full history of stage name in URI scope, newest first.
pub async fn get_stage_history(
    state: &AppState,
    stage_name: String,
    uri: String,
) -> Result<Vec<Stage>, String> {
    state
        .launcher
        .history(&stage_name, &uri)
        .await
        .map(|history| history.versions)
        .map_err(|err| err.to_string())
}

/// List every distinct stage name.
pub async fn get_all_stage_names(state: &AppState) -> Result<Vec<String>, String> {
    state
        .launcher
        .stage_names()
        .await
        .map_err(|err| err.to_string())
}

/// List everything stored under URI scope.
pub async fn browse_scope(state: &AppState, uri: String) -> Result<ScopeListing, String> {
    state
        .launcher
        .scope(&uri)
        .await
        .map_err(|err| err.to_string())
}

/// Name of the user running the current process.
///
/// Checks `USERNAME` first, then `USER`.
pub fn get_current_username() -> Result<String, String> {
    std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .map_err(|err| format!("failed to get username: {err}"))
}
