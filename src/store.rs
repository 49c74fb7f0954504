// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Document store abstraction.
//!
//! Rezlauncher persists package collections and stages in a __document
//! store__. The store only needs to offer a narrow set of operations:
//! insertion, exact-match lookup, and one atomic activation primitive.
//!
//! # Activation
//!
//! For any stage name, at most one stored stage may be active. Flipping the
//! active flag is therefore never done as a read-modify-write across separate
//! round trips. Instead, [`DocumentStore::insert_active_stage`] and
//! [`DocumentStore::set_active_stage`] must each apply the whole change as one
//! atomic unit, so no observer ever sees zero or two active stages for a name
//! that has history.
//!
//! # Backends
//!
//! - [`MemoryStore`]: process-local store used for tests and throwaway
//!   sessions.
//! - [`MongoStore`]: MongoDB-backed store using multi-document transactions.

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::model::{PackageCollection, Stage, StageId};

use async_trait::async_trait;

/// Persistence backend for package collections and stages.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Insert new package collection.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::DuplicateVersion`] if the version already
    ///   exists in the collection's URI scope.
    async fn insert_collection(&self, collection: PackageCollection) -> Result<()>;

    /// Find package collections matching filter.
    async fn find_collections(&self, filter: &CollectionFilter) -> Result<Vec<PackageCollection>>;

    /// Find stages matching filter in insertion order.
    async fn find_stages(&self, filter: &StageFilter) -> Result<Vec<Stage>>;

    /// Insert stage as the active version of its name.
    ///
    /// Every other stage sharing the name is deactivated in the same atomic
    /// unit. Any identifier or activation state carried by the given stage is
    /// ignored.
    async fn insert_active_stage(&self, stage: Stage) -> Result<StageId>;

    /// Make target stage the active version of its name.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::StageNotFound`] if no stage has the given id.
    /// - Return [`StoreError::NameMismatch`] if the stage does not belong to
    ///   the given name.
    async fn set_active_stage(&self, name: &str, id: &StageId) -> Result<()>;

    /// List every distinct stage name.
    async fn distinct_stage_names(&self) -> Result<Vec<String>>;
}

/// Exact-match filter for package collections.
///
/// Unset fields match anything.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct CollectionFilter {
    pub version: Option<String>,
    pub uri: Option<String>,
}

impl CollectionFilter {
    /// Match every package collection.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match package collections in URI scope.
    pub fn by_uri(uri: impl Into<String>) -> Self {
        Self {
            version: None,
            uri: Some(uri.into()),
        }
    }

    /// Match one package collection version in URI scope.
    pub fn by_version(version: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            uri: Some(uri.into()),
        }
    }

    /// Check if package collection passes filter.
    pub fn matches(&self, collection: &PackageCollection) -> bool {
        self.version
            .as_ref()
            .is_none_or(|version| *version == collection.version)
            && self.uri.as_ref().is_none_or(|uri| *uri == collection.uri)
    }
}

/// Exact-match filter for stages.
///
/// Unset fields match anything.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct StageFilter {
    pub id: Option<StageId>,
    pub name: Option<String>,
    pub uri: Option<String>,
    pub active: Option<bool>,
}

impl StageFilter {
    /// Match every stage.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: StageId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Check if stage passes filter.
    pub fn matches(&self, stage: &Stage) -> bool {
        self.id
            .as_ref()
            .is_none_or(|id| stage.id.as_ref() == Some(id))
            && self.name.as_ref().is_none_or(|name| *name == stage.name)
            && self.uri.as_ref().is_none_or(|uri| *uri == stage.uri)
            && self.active.is_none_or(|active| active == stage.active)
    }
}

/// All possible error types for document store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Referenced stage does not exist.
    #[error("stage {0} not found")]
    StageNotFound(StageId),

    /// Referenced stage belongs to another stage name.
    #[error("stage {id} does not belong to stage name {name:?}")]
    NameMismatch { id: StageId, name: String },

    /// Stage identifier cannot be understood by the backend.
    #[error("invalid stage id {0:?}")]
    InvalidId(String),

    /// Concurrent activation of the same stage name won the race.
    #[error("stage name {name:?} was activated concurrently, nothing was changed")]
    ActivationConflict { name: String },

    /// Package collection version already exists in URI scope.
    #[error("package collection {version:?} already exists in {uri:?}")]
    DuplicateVersion { version: String, uri: String },

    /// MongoDB driver operation fails.
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
