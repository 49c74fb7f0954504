// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package collection registry workflows.
//!
//! Package collections are append-only. A version, once saved in a URI scope,
//! is never modified. Deriving is the only way to "edit" one: it copies an
//! existing version into a new version label.

use crate::{
    launcher::{require, ChangeEvent, Launcher, LauncherError, Result},
    model::{PackageCollection, Tool},
    store::CollectionFilter,
};

use tracing::{debug, info, instrument};

impl Launcher {
    /// Save new package collection version.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::MissingField`] if version or URI is empty.
    /// - Return [`LauncherError::Store`] if the version already exists in the
    ///   URI scope, or the document store fails.
    #[instrument(skip(self, collection), fields(version = %collection.version, uri = %collection.uri), level = "debug")]
    pub async fn save_collection(&self, collection: PackageCollection) -> Result<()> {
        require("version", &collection.version)?;
        require("uri", &collection.uri)?;

        let event = ChangeEvent::CollectionSaved {
            version: collection.version.clone(),
            uri: collection.uri.clone(),
        };
        self.store().insert_collection(collection).await?;
        info!("package collection saved");
        self.notify(event);

        Ok(())
    }

    /// Find one package collection version.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::CollectionNotFound`] if version does not
    ///   exist in URI scope.
    /// - Return [`LauncherError::Store`] if document store fails.
    pub async fn collection(&self, version: &str, uri: &str) -> Result<PackageCollection> {
        self.store()
            .find_collections(&CollectionFilter::by_version(version, uri))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LauncherError::CollectionNotFound {
                version: version.to_owned(),
                uri: uri.to_owned(),
            })
    }

    /// Derive new package collection version from an existing one.
    ///
    /// The source version stays untouched. The derived version is saved and
    /// returned.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::MissingField`] if new version is empty.
    /// - Return [`LauncherError::CollectionNotFound`] if source is missing.
    /// - Return [`LauncherError::Store`] if the new version already exists,
    ///   or the document store fails.
    #[instrument(skip(self, created_by), level = "debug")]
    pub async fn derive_collection(
        &self,
        version: &str,
        uri: &str,
        new_version: &str,
        created_by: &str,
    ) -> Result<PackageCollection> {
        require("new version", new_version)?;
        let source = self.collection(version, uri).await?;
        let derived = source.to_new_version(new_version, created_by);
        self.save_collection(derived.clone()).await?;

        Ok(derived)
    }

    /// List package collections in exact URI scope.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::Store`] if document store fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn collections_by_uri(&self, uri: &str) -> Result<Vec<PackageCollection>> {
        let collections = self
            .store()
            .find_collections(&CollectionFilter::by_uri(uri))
            .await?;
        debug!("found {} package collections", collections.len());

        Ok(collections)
    }

    /// List every package collection in every scope.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::Store`] if document store fails.
    pub async fn all_collections(&self) -> Result<Vec<PackageCollection>> {
        Ok(self.store().find_collections(&CollectionFilter::all()).await?)
    }

    /// List tools of package collection version.
    ///
    /// A missing package collection yields no tools rather than an error.
    ///
    /// # Errors
    ///
    /// - Return [`LauncherError::Store`] if document store fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn collection_tools(&self, version: &str, uri: &str) -> Result<Vec<Tool>> {
        match self.collection(version, uri).await {
            Ok(collection) => Ok(collection.tools),
            Err(LauncherError::CollectionNotFound { .. }) => {
                debug!("no package collection {version:?} in {uri:?}");
                Ok(Vec::new())
            }
            Err(error) => Err(error),
        }
    }
}
