// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Scenarios against a live MongoDB replica set.
//!
//! Set `REZLAUNCHER_TEST_MONGODB_URI` to a replica set connection string to
//! run these, e.g., `mongodb://localhost:27017/?replicaSet=rs0`. Without it
//! every test returns early. Each test works in its own throwaway database.

use crate::bake_request;

use rezlauncher::{
    launcher::{ErrorKind, Launcher, LauncherError},
    model::{CollectionDraft, StageId},
    store::{DocumentStore, MongoStore, StageFilter, StoreError},
};

use anyhow::{anyhow, Result};
use futures::future::join_all;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    Client,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const MONGODB_URI_VAR: &str = "REZLAUNCHER_TEST_MONGODB_URI";

struct MongoFixture {
    launcher: Launcher,
    store: Arc<MongoStore>,
    client: Client,
    database: String,
}

impl MongoFixture {
    /// Connect to fresh database, or `None` when no test deployment is set.
    async fn connect() -> Result<Option<Self>> {
        let Ok(uri) = std::env::var(MONGODB_URI_VAR) else {
            eprintln!("{MONGODB_URI_VAR} not set, skipping MongoDB scenario");
            return Ok(None);
        };

        let database = format!("rezlauncher_test_{}", ObjectId::new().to_hex());
        let client = Client::with_uri_str(&uri).await?;
        let store = Arc::new(MongoStore::connect(&uri, &database).await?);
        let launcher = Launcher::new(store.clone());

        Ok(Some(Self {
            launcher,
            store,
            client,
            database,
        }))
    }

    async fn with_collection(self, version: &str, uri: &str) -> Result<Self> {
        let draft = CollectionDraft {
            version: version.into(),
            uri: uri.into(),
            packages: vec![format!("show_pipeline-{version}")],
            herit: None,
            tools: vec!["nuke".into()],
            environment_variables: [("NUKE_PATH", "/studio/nuke")].into_iter().collect(),
        };
        self.launcher.save_collection(draft.into_collection("alice")).await?;

        Ok(self)
    }

    async fn active_count(&self, name: &str) -> Result<usize> {
        let stages = self
            .store
            .find_stages(&StageFilter::all().name(name).active(true))
            .await?;
        Ok(stages.len())
    }

    async fn teardown(self) -> Result<()> {
        self.client.database(&self.database).drop(None).await?;
        Ok(())
    }
}

#[tokio::test]
async fn bake_revert_push_round() -> Result<()> {
    let Some(fixture) = MongoFixture::connect().await? else {
        return Ok(());
    };
    let fixture = fixture
        .with_collection("1.0.0", "/show/comp")
        .await?
        .with_collection("1.0.1", "/show/comp")
        .await?;
    let launcher = &fixture.launcher;

    let first = launcher.bake(bake_request("dev", "1.0.0", "/show/comp")).await?;
    let second = launcher.bake(bake_request("dev", "1.0.1", "/show/comp")).await?;
    let history = launcher.history("dev", "/show/comp").await?;
    assert_eq!(history.versions.len(), 2);
    assert_eq!(history.active().and_then(|s| s.id.clone()), second.id);

    let first_id = first.id.clone().ok_or_else(|| anyhow!("baked stage has no id"))?;
    launcher.revert(&first_id).await?;
    let history = launcher.history("dev", "/show/comp").await?;
    assert_eq!(history.active().and_then(|s| s.id.clone()), first.id);
    assert_eq!(fixture.active_count("dev").await?, 1);

    let staging = launcher.push(&first, "staging", "bob").await?;
    assert!(staging.same_configuration(&first));
    assert_eq!(launcher.stage(&first_id).await?.name, "dev");
    assert_eq!(fixture.active_count("staging").await?, 1);
    assert_eq!(fixture.store.distinct_stage_names().await?, vec!["dev", "staging"]);

    fixture.teardown().await
}

#[tokio::test]
async fn duplicate_collection_version_is_rejected() -> Result<()> {
    let Some(fixture) = MongoFixture::connect().await? else {
        return Ok(());
    };
    let fixture = fixture.with_collection("1.0.0", "/show/comp").await?;

    let draft = CollectionDraft {
        version: "1.0.0".into(),
        uri: "/show/comp".into(),
        ..Default::default()
    };
    let result = fixture.launcher.save_collection(draft.into_collection("bob")).await;
    assert!(matches!(
        result,
        Err(LauncherError::Store(StoreError::DuplicateVersion { .. }))
    ));

    fixture.teardown().await
}

#[tokio::test]
async fn revert_rejections_leave_activation_alone() -> Result<()> {
    let Some(fixture) = MongoFixture::connect().await? else {
        return Ok(());
    };
    let fixture = fixture.with_collection("1.0.0", "/show/comp").await?;
    let dev = fixture
        .launcher
        .bake(bake_request("dev", "1.0.0", "/show/comp"))
        .await?;
    let dev_id = dev.id.clone().ok_or_else(|| anyhow!("baked stage has no id"))?;

    for id in [StageId::generate(), StageId::new("not-an-object-id")] {
        let error = fixture
            .launcher
            .revert(&id)
            .await
            .err()
            .ok_or_else(|| anyhow!("revert accepted unknown id {id}"))?;
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    let result = fixture.store.set_active_stage("prod", &dev_id).await;
    assert!(matches!(result, Err(StoreError::NameMismatch { .. })));
    let result = fixture.store.set_active_stage("dev", &StageId::generate()).await;
    assert!(matches!(result, Err(StoreError::StageNotFound(_))));
    assert_eq!(fixture.active_count("dev").await?, 1);

    fixture.teardown().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_bakes_on_fresh_name_leave_one_active() -> Result<()> {
    let Some(fixture) = MongoFixture::connect().await? else {
        return Ok(());
    };
    let fixture = fixture.with_collection("1.0.0", "/show/comp").await?;

    let tasks = (0..16).map(|_| {
        let launcher = fixture.launcher.clone();
        tokio::spawn(async move { launcher.bake(bake_request("qa", "1.0.0", "/show/comp")).await })
    });
    let mut baked = 0;
    for result in join_all(tasks).await {
        match result? {
            Ok(_) => baked += 1,
            Err(error) => assert_eq!(error.kind(), ErrorKind::Persistence, "{error}"),
        }
    }

    assert!(baked >= 1);
    assert_eq!(fixture.active_count("qa").await?, 1);
    fixture.launcher.check_integrity("qa").await?;

    fixture.teardown().await
}

#[tokio::test]
async fn connect_tolerates_existing_duplicate_versions() -> Result<()> {
    let Ok(uri) = std::env::var(MONGODB_URI_VAR) else {
        return Ok(());
    };
    let database = format!("rezlauncher_test_{}", ObjectId::new().to_hex());
    let client = Client::with_uri_str(&uri).await?;
    client
        .database(&database)
        .collection::<Document>("package_collections")
        .insert_many(
            [
                doc! { "version": "1.0.0", "uri": "/show/comp" },
                doc! { "version": "1.0.0", "uri": "/show/comp" },
            ],
            None,
        )
        .await?;

    let connected = MongoStore::connect(&uri, &database).await;
    client.database(&database).drop(None).await?;
    connected?;

    Ok(())
}
