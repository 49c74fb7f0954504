// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! MongoDB document store.
//!
//! Package collections live in the `package_collections` collection, and
//! stages live in the `stages` collection of the configured database.
//!
//! # Transactions
//!
//! Stage activation touches several documents at once. Each activation runs
//! inside a multi-document transaction so that readers never observe a stage
//! name with zero or two active versions. MongoDB only supports transactions
//! on replica sets, so the target deployment must be a replica set (a
//! single-node replica set is enough).
//!
//! A partial unique index on `name` over active stages backs this up on the
//! server. When two activations of the same name race, even for a name with
//! no history yet, the losing transaction fails with
//! [`StoreError::ActivationConflict`]. It is never retried here.

use crate::{
    model::{EnvironmentVariables, PackageCollection, Stage, StageId, Tool},
    store::{CollectionFilter, DocumentStore, Result, StageFilter, StoreError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

const COLLECTIONS: &str = "package_collections";
const STAGES: &str = "stages";
const DUPLICATE_KEY: i32 = 11000;
const WRITE_CONFLICT: i32 = 112;

/// MongoDB-backed document store.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to MongoDB deployment.
    ///
    /// Also makes sure that package collection versions are unique within
    /// their URI scope through a unique index.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Mongo`] if the connection string is invalid, or
    ///   the deployment cannot be reached.
    #[instrument(skip(uri), level = "debug")]
    pub async fn connect(uri: impl AsRef<str>, database: &str) -> Result<Self> {
        let mut options = ClientOptions::parse(uri.as_ref()).await?;
        options.app_name = Some("rezlauncher".into());
        let client = Client::with_options(options)?;
        let db = client.database(database);
        let store = Self { client, db };
        store.ensure_indexes().await?;
        info!("connected to database {database:?}");

        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<()> {
        let versions = IndexModel::builder()
            .keys(doc! { "version": 1, "uri": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        match self.collections().create_index(versions, None).await {
            Ok(_) => {}
            // INVARIANT: Pre-existing duplicates must not lock users out.
            Err(error) if is_duplicate_key(&error) => {
                error!(
                    "package collections already hold duplicate versions, \
                     uniqueness of versions within a URI is NOT enforced: {error}"
                );
            }
            Err(error) => return Err(error.into()),
        }

        // INVARIANT: At most one active stage per name, enforced by the server.
        let active = IndexModel::builder()
            .keys(doc! { "name": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "active": true })
                    .build(),
            )
            .build();
        match self.stages().create_index(active, None).await {
            Ok(_) => Ok(()),
            Err(error) if is_duplicate_key(&error) => {
                error!(
                    "stages already hold several active versions for one name, \
                     single activation is NOT enforced by the database: {error}"
                );
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    fn collections(&self) -> Collection<PackageCollection> {
        self.db.collection(COLLECTIONS)
    }

    fn stages(&self) -> Collection<StageDocument> {
        self.db.collection(STAGES)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    #[instrument(skip(self, collection), level = "debug")]
    async fn insert_collection(&self, collection: PackageCollection) -> Result<()> {
        match self.collections().insert_one(&collection, None).await {
            Ok(_) => Ok(()),
            Err(error) if is_duplicate_key(&error) => Err(StoreError::DuplicateVersion {
                version: collection.version,
                uri: collection.uri,
            }),
            Err(error) => Err(error.into()),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn find_collections(&self, filter: &CollectionFilter) -> Result<Vec<PackageCollection>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let cursor = self
            .collections()
            .find(collection_filter_document(filter), options)
            .await?;
        let collections: Vec<PackageCollection> = cursor.try_collect().await?;
        debug!("retrieved {} package collections", collections.len());

        Ok(collections)
    }

    #[instrument(skip(self), level = "debug")]
    async fn find_stages(&self, filter: &StageFilter) -> Result<Vec<Stage>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let cursor = self
            .stages()
            .find(stage_filter_document(filter)?, options)
            .await?;
        let documents: Vec<StageDocument> = cursor.try_collect().await?;
        debug!("retrieved {} stages", documents.len());

        Ok(documents.into_iter().map(Stage::from).collect())
    }

    #[instrument(skip(self, stage), fields(name = %stage.name), level = "debug")]
    async fn insert_active_stage(&self, stage: Stage) -> Result<StageId> {
        let oid = ObjectId::new();
        let document = StageDocument::active(stage, oid);
        let stages = self.stages();

        let name = document.name.clone();
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        let result = async {
            stages
                .update_many_with_session(
                    doc! { "name": name.as_str() },
                    doc! { "$set": { "active": false } },
                    None,
                    &mut session,
                )
                .await?;
            stages
                .insert_one_with_session(&document, None, &mut session)
                .await?;
            session.commit_transaction().await
        }
        .await;
        result.map_err(|error| activation_error(error, &name))?;
        debug!("insert active stage {oid}");

        Ok(StageId::from(oid))
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_active_stage(&self, name: &str, id: &StageId) -> Result<()> {
        let oid = parse_object_id(id)?;
        let stages = self.stages();

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        let target = stages
            .find_one_with_session(doc! { "_id": oid }, None, &mut session)
            .await?;
        let Some(target) = target else {
            session.abort_transaction().await?;
            return Err(StoreError::StageNotFound(id.clone()));
        };
        if target.name != name {
            session.abort_transaction().await?;
            return Err(StoreError::NameMismatch {
                id: id.clone(),
                name: name.to_owned(),
            });
        }

        let result = async {
            stages
                .update_many_with_session(
                    doc! { "name": name, "_id": { "$ne": oid } },
                    doc! { "$set": { "active": false } },
                    None,
                    &mut session,
                )
                .await?;
            stages
                .update_one_with_session(
                    doc! { "_id": oid },
                    doc! { "$set": { "active": true } },
                    None,
                    &mut session,
                )
                .await?;
            session.commit_transaction().await
        }
        .await;
        result.map_err(|error| activation_error(error, name))?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn distinct_stage_names(&self) -> Result<Vec<String>> {
        let values = self.stages().distinct("name", None, None).await?;
        let mut names = values
            .into_iter()
            .filter_map(|value| match value {
                Bson::String(name) => Some(name),
                other => {
                    warn!("non-string stage name {other:?}");
                    None
                }
            })
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }
}

/// Stored layout of a stage.
///
/// Mirrors [`Stage`], but keeps the identifier as a native object id under
/// `_id`.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct StageDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    name: String,
    uri: String,
    from_version: String,
    #[serde(default)]
    packages: Vec<String>,
    rxt_path: String,
    #[serde(default)]
    tools: Vec<Tool>,
    #[serde(default)]
    environment_variables: EnvironmentVariables,
    active: bool,
    created_at: DateTime<Utc>,
    created_by: String,
}

impl StageDocument {
    fn active(stage: Stage, id: ObjectId) -> Self {
        Self {
            id,
            name: stage.name,
            uri: stage.uri,
            from_version: stage.from_version,
            packages: stage.packages,
            rxt_path: stage.rxt_path,
            tools: stage.tools,
            environment_variables: stage.environment_variables,
            active: true,
            created_at: stage.created_at,
            created_by: stage.created_by,
        }
    }
}

impl From<StageDocument> for Stage {
    fn from(document: StageDocument) -> Self {
        Self {
            id: Some(StageId::from(document.id)),
            name: document.name,
            uri: document.uri,
            from_version: document.from_version,
            packages: document.packages,
            rxt_path: document.rxt_path,
            tools: document.tools,
            environment_variables: document.environment_variables,
            active: document.active,
            created_at: document.created_at,
            created_by: document.created_by,
        }
    }
}

fn parse_object_id(id: &StageId) -> Result<ObjectId> {
    ObjectId::parse_str(id.as_str()).map_err(|_| StoreError::InvalidId(id.to_string()))
}

fn collection_filter_document(filter: &CollectionFilter) -> Document {
    let mut document = Document::new();
    if let Some(version) = &filter.version {
        document.insert("version", version.as_str());
    }
    if let Some(uri) = &filter.uri {
        document.insert("uri", uri.as_str());
    }

    document
}

fn stage_filter_document(filter: &StageFilter) -> Result<Document> {
    let mut document = Document::new();
    if let Some(id) = &filter.id {
        document.insert("_id", parse_object_id(id)?);
    }
    if let Some(name) = &filter.name {
        document.insert("name", name.as_str());
    }
    if let Some(uri) = &filter.uri {
        document.insert("uri", uri.as_str());
    }
    if let Some(active) = filter.active {
        document.insert("active", active);
    }

    Ok(document)
}

/// Report losing side of a concurrent activation as a conflict.
fn activation_error(error: MongoError, name: &str) -> StoreError {
    if is_duplicate_key(&error) || is_write_conflict(&error) {
        warn!("concurrent activation of stage name {name:?} lost: {error}");
        return StoreError::ActivationConflict {
            name: name.to_owned(),
        };
    }

    error.into()
}

fn is_write_conflict(error: &MongoError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Command(failure) if failure.code == WRITE_CONFLICT
    )
}

fn is_duplicate_key(error: &MongoError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY
    ) || matches!(
        error.kind.as_ref(),
        ErrorKind::Command(failure) if failure.code == DUPLICATE_KEY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn stage_filter_translates_to_exact_match_document() -> anyhow::Result<()> {
        let oid = ObjectId::new();
        let filter = StageFilter::all()
            .id(StageId::from(oid))
            .name("dev")
            .uri("/proj/char")
            .active(true);

        let result = stage_filter_document(&filter)?;
        let expect = doc! { "_id": oid, "name": "dev", "uri": "/proj/char", "active": true };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn empty_filters_match_everything() -> anyhow::Result<()> {
        assert_eq!(collection_filter_document(&CollectionFilter::all()), Document::new());
        assert_eq!(stage_filter_document(&StageFilter::all())?, Document::new());
        Ok(())
    }

    #[test]
    fn invalid_stage_id_is_rejected() {
        let filter = StageFilter::all().id(StageId::new("not-an-object-id"));
        let result = stage_filter_document(&filter);
        assert!(matches!(result, Err(StoreError::InvalidId(id)) if id == "not-an-object-id"));
    }

    #[test]
    fn stage_document_round_trips_identifier() {
        let oid = ObjectId::new();
        let stage = Stage {
            id: None,
            name: "dev".into(),
            uri: "/proj/char".into(),
            from_version: "1.0.0".into(),
            packages: vec!["maya-2024".into()],
            rxt_path: "/rxt/dev.rxt".into(),
            tools: vec!["maya".into()],
            environment_variables: Default::default(),
            active: false,
            created_at: Utc::now(),
            created_by: "alice".into(),
        };

        let result = Stage::from(StageDocument::active(stage.clone(), oid));
        assert_eq!(result.id, Some(StageId::from(oid)));
        assert!(result.active);
        assert!(result.same_configuration(&stage));
    }
}
