// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package collection and stage workflows.
//!
//! The [`Launcher`] sits between callers and the document store. It validates
//! input, applies the bake, revert, and push workflows, and answers listing
//! queries by URI scope.
//!
//! # Stage Activation
//!
//! Every stage name has an append-only history. Baking or pushing appends a
//! new version and makes it the active one. Reverting makes an older version
//! active again without creating a new document. All activation changes go
//! through a single atomic document store operation. After each one, the
//! launcher checks that the affected name has exactly one active version. A
//! failing check is a data-integrity problem that requires an operator, so it
//! is reported and never repaired automatically.
//!
//! # Change Notification
//!
//! Listings are never refreshed implicitly. Every successful mutation is
//! broadcast as a [`ChangeEvent`] through [`Launcher::subscribe`], and callers
//! decide which listings to query again.
//!
//! # See Also
//!
//! 1. [`collections`]
//! 2. [`stages`]

pub mod collections;
pub mod stages;

pub use stages::BakeRequest;

use crate::{
    model::{ScopeListing, StageId},
    store::{CollectionFilter, DocumentStore, StageFilter, StoreError},
};

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, instrument};

const EVENT_CAPACITY: usize = 64;

/// Entry point to package collection and stage workflows.
///
/// Cheap to clone. Clones share the same document store and change event
/// channel.
#[derive(Clone)]
pub struct Launcher {
    store: Arc<dyn DocumentStore>,
    events: broadcast::Sender<ChangeEvent>,
}

impl Launcher {
    /// Construct new launcher on top of document store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { store, events }
    }

    /// Subscribe to change events.
    ///
    /// Only events sent after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// List everything stored under exact URI scope.
    ///
    /// Parent and child scopes are never included.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::Store`] if document store fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn scope(&self, uri: &str) -> Result<ScopeListing> {
        let collections = self
            .store
            .find_collections(&CollectionFilter::by_uri(uri))
            .await?;
        let stages = self.store.find_stages(&StageFilter::all().uri(uri)).await?;
        debug!(
            "scope {uri:?} holds {} collections and {} stages",
            collections.len(),
            stages.len()
        );

        Ok(ScopeListing {
            uri: uri.to_owned(),
            collections,
            stages,
        })
    }

    /// Verify that stage name has exactly one active version.
    ///
    /// Names without any history pass trivially.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::Integrity`] if zero or several versions are
    ///   active.
    /// - Return [`LauncherError::Store`] if document store fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn check_integrity(&self, name: &str) -> Result<()> {
        let stages = self.store.find_stages(&StageFilter::all().name(name)).await?;
        let active = stages.iter().filter(|stage| stage.active).count();
        if stages.is_empty() || active == 1 {
            return Ok(());
        }

        error!("stage name {name:?} has {active} active versions out of {}", stages.len());
        Err(LauncherError::Integrity {
            name: name.to_owned(),
            active,
        })
    }

    pub(crate) fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub(crate) fn notify(&self, event: ChangeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Mutation applied through the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// New package collection version was stored.
    CollectionSaved { version: String, uri: String },

    /// Stage was baked from a package collection.
    StageBaked { id: StageId, name: String, uri: String },

    /// Older stage version was made active again.
    StageReverted { id: StageId, name: String, uri: String },

    /// Stage configuration was copied under a stage name.
    StagePushed {
        id: StageId,
        source: Option<StageId>,
        name: String,
        uri: String,
    },
}

impl ChangeEvent {
    /// URI scope affected by the change.
    pub fn uri(&self) -> &str {
        match self {
            Self::CollectionSaved { uri, .. }
            | Self::StageBaked { uri, .. }
            | Self::StageReverted { uri, .. }
            | Self::StagePushed { uri, .. } => uri.as_str(),
        }
    }

    /// Stage name affected by the change, if any.
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            Self::CollectionSaved { .. } => None,
            Self::StageBaked { name, .. }
            | Self::StageReverted { name, .. }
            | Self::StagePushed { name, .. } => Some(name.as_str()),
        }
    }
}

/// Broad category of launcher failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected before touching the document store.
    Validation,

    /// Referenced document does not exist.
    NotFound,

    /// Document store failed or rejected the write.
    Persistence,

    /// Stored data breaks the one-active-version rule.
    Integrity,
}

/// All possible error types for launcher workflows.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    /// Required input field is empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Package collection version does not exist in URI scope.
    #[error("package collection {version:?} not found in {uri:?}")]
    CollectionNotFound { version: String, uri: String },

    /// Stage does not exist.
    #[error("stage {0} not found")]
    StageNotFound(StageId),

    /// Stage name has zero or several active versions.
    #[error("stage name {name:?} has {active} active versions, operator intervention required")]
    Integrity { name: String, active: usize },

    /// Document store fails.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LauncherError {
    /// Categorize error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_) => ErrorKind::Validation,
            Self::CollectionNotFound { .. } | Self::StageNotFound(_) => ErrorKind::NotFound,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Store(
                StoreError::StageNotFound(_)
                | StoreError::NameMismatch { .. }
                | StoreError::InvalidId(_),
            ) => ErrorKind::NotFound,
            Self::Store(
                StoreError::ActivationConflict { .. }
                | StoreError::DuplicateVersion { .. }
                | StoreError::Mongo(_),
            ) => ErrorKind::Persistence,
        }
    }
}

/// Reject empty or whitespace-only input.
pub(crate) fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LauncherError::MissingField(field));
    }

    Ok(())
}

/// Friendly result alias :3
pub type Result<T, E = LauncherError> = std::result::Result<T, E>;
