// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

mod mongo;
mod scope;

use rezlauncher::{
    launcher::{BakeRequest, Launcher},
    model::{CollectionDraft, Stage},
    store::{DocumentStore, MemoryStore, StageFilter},
};

use anyhow::Result;
use std::sync::Arc;

/// Launcher over fresh in-memory store.
pub(crate) struct LauncherFixture {
    pub(crate) launcher: Launcher,
    pub(crate) store: Arc<MemoryStore>,
}

impl LauncherFixture {
    pub(crate) fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let launcher = Launcher::new(store.clone());
        Self { launcher, store }
    }

    pub(crate) async fn with_collection(self, version: &str, uri: &str) -> Result<Self> {
        let draft = CollectionDraft {
            version: version.into(),
            uri: uri.into(),
            packages: vec![format!("show_pipeline-{version}"), "nuke-15".into()],
            herit: None,
            tools: vec!["nuke".into(), "nukex".into()],
            environment_variables: [("NUKE_PATH", "/studio/nuke")].into_iter().collect(),
        };
        self.launcher.save_collection(draft.into_collection("alice")).await?;

        Ok(self)
    }

    pub(crate) async fn stages(&self) -> Result<Vec<Stage>> {
        Ok(self.store.find_stages(&StageFilter::all()).await?)
    }

    pub(crate) async fn active_count(&self, name: &str) -> Result<usize> {
        let stages = self
            .store
            .find_stages(&StageFilter::all().name(name).active(true))
            .await?;
        Ok(stages.len())
    }
}

pub(crate) fn bake_request(name: &str, version: &str, uri: &str) -> BakeRequest {
    BakeRequest {
        version: version.into(),
        uri: uri.into(),
        name: name.into(),
        tools: None,
        environment_variables: None,
        rxt_path: format!("/rxt/{name}-{version}.rxt"),
        created_by: "alice".into(),
    }
}
