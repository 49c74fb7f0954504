// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! In-memory document store.
//!
//! Keeps every document in process memory behind a single lock. Nothing is
//! durable. Each store operation holds the lock for its whole duration, which
//! is what makes activation atomic here.

use crate::{
    model::{PackageCollection, Stage, StageId},
    store::{CollectionFilter, DocumentStore, Result, StageFilter, StoreError},
};

use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Process-local document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: Vec<PackageCollection>,
    stages: Vec<Stage>,
}

impl MemoryStore {
    /// Construct new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite active flag without touching siblings.
    #[cfg(test)]
    pub(crate) async fn force_active(&self, id: &StageId, active: bool) {
        let mut inner = self.inner.write().await;
        for stage in inner.stages.iter_mut().filter(|s| s.id.as_ref() == Some(id)) {
            stage.active = active;
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    #[instrument(skip(self, collection), level = "debug")]
    async fn insert_collection(&self, collection: PackageCollection) -> Result<()> {
        let mut inner = self.inner.write().await;
        let filter = CollectionFilter::by_version(&collection.version, &collection.uri);
        if inner.collections.iter().any(|stored| filter.matches(stored)) {
            return Err(StoreError::DuplicateVersion {
                version: collection.version,
                uri: collection.uri,
            });
        }

        debug!("insert package collection {:?} in {:?}", collection.version, collection.uri);
        inner.collections.push(collection);

        Ok(())
    }

    async fn find_collections(&self, filter: &CollectionFilter) -> Result<Vec<PackageCollection>> {
        let inner = self.inner.read().await;
        Ok(inner
            .collections
            .iter()
            .filter(|collection| filter.matches(collection))
            .cloned()
            .collect())
    }

    async fn find_stages(&self, filter: &StageFilter) -> Result<Vec<Stage>> {
        let inner = self.inner.read().await;
        Ok(inner
            .stages
            .iter()
            .filter(|stage| filter.matches(stage))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, stage), fields(name = %stage.name), level = "debug")]
    async fn insert_active_stage(&self, mut stage: Stage) -> Result<StageId> {
        let mut inner = self.inner.write().await;
        let id = StageId::generate();

        // INVARIANT: Deactivate siblings and insert under the same write lock.
        for sibling in inner.stages.iter_mut().filter(|s| s.name == stage.name) {
            sibling.active = false;
        }
        stage.id = Some(id.clone());
        stage.active = true;
        debug!("insert active stage {id}");
        inner.stages.push(stage);

        Ok(id)
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_active_stage(&self, name: &str, id: &StageId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let target = inner
            .stages
            .iter()
            .find(|stage| stage.id.as_ref() == Some(id))
            .ok_or_else(|| StoreError::StageNotFound(id.clone()))?;
        if target.name != name {
            return Err(StoreError::NameMismatch {
                id: id.clone(),
                name: name.to_owned(),
            });
        }

        for stage in inner.stages.iter_mut().filter(|s| s.name == name) {
            stage.active = stage.id.as_ref() == Some(id);
        }

        Ok(())
    }

    async fn distinct_stage_names(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .stages
            .iter()
            .map(|stage| stage.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }
}
