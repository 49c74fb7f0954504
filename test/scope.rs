// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{bake_request, LauncherFixture};

use rezlauncher::command::{self, AppState};

use anyhow::Result;
use pretty_assertions::assert_eq;
use simple_test_case::test_case;

#[test_case("/show", 0; "parent scope")]
#[test_case("/show/comp", 1; "exact scope")]
#[test_case("/show/comp/nuke", 0; "child scope")]
#[tokio::test]
async fn scope_query_is_exact(uri: &str, expect: usize) -> Result<()> {
    let fixture = LauncherFixture::new().with_collection("1.0.0", "/show/comp").await?;
    fixture
        .launcher
        .bake(bake_request("dev", "1.0.0", "/show/comp"))
        .await?;

    let listing = fixture.launcher.scope(uri).await?;
    pretty_assertions::assert_eq!(listing.collections.len(), expect);
    pretty_assertions::assert_eq!(listing.stages.len(), expect);
    pretty_assertions::assert_eq!(listing.is_empty(), expect == 0);

    Ok(())
}

#[tokio::test]
async fn browse_empty_scope_through_commands() -> Result<()> {
    let fixture = LauncherFixture::new().with_collection("1.0.0", "/show/comp").await?;
    let state = AppState::new(fixture.launcher.clone());

    let listing = command::browse_scope(&state, "/show/lighting".into())
        .await
        .map_err(anyhow::Error::msg)?;
    assert!(listing.is_empty());

    let result = command::get_package_collections_by_uri(&state, "/show/lighting".into())
        .await
        .map_err(anyhow::Error::msg)?;
    assert_eq!(result.collections, None);
    assert_eq!(result.message.as_deref(), Some("no collection found in /show/lighting"));

    Ok(())
}

#[tokio::test]
async fn derived_collection_is_listed_beside_source() -> Result<()> {
    let fixture = LauncherFixture::new().with_collection("1.0.0", "/show/comp").await?;
    let state = AppState::new(fixture.launcher.clone());

    let derived = command::derive_package_collection(
        &state,
        "1.0.0".into(),
        "/show/comp".into(),
        "1.1.0".into(),
        "bob".into(),
    )
    .await
    .map_err(anyhow::Error::msg)?;
    assert_eq!(derived.version, "1.1.0");

    let listing = fixture.launcher.scope("/show/comp").await?;
    let versions = listing
        .collections
        .iter()
        .map(|collection| collection.version.as_str())
        .collect::<Vec<_>>();
    assert_eq!(versions, vec!["1.0.0", "1.1.0"]);

    let result = command::derive_package_collection(
        &state,
        "1.0.0".into(),
        "/show/comp".into(),
        "1.1.0".into(),
        "bob".into(),
    )
    .await;
    assert!(result.is_err());

    Ok(())
}
