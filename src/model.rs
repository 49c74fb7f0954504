// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package collection and stage data model.
//!
//! Two kinds of documents are stored by rezlauncher: __package collections__
//! and __stages__.
//!
//! # Package Collections
//!
//! A package collection is a versioned bundle of package requirements, tools,
//! and environment variables that lives under a __URI scope__, e.g.,
//! `/project/modelingType/application`. Versions are free-form labels that
//! must be unique within their scope. Published collections are never edited
//! in place. Editing a collection means deriving a new version from an
//! existing one.
//!
//! # Stages
//!
//! A stage is a named snapshot baked from one package collection version.
//! Every bake or push under a stage name appends a new document to that
//! name's history. Exactly one document in the history is marked active once
//! the name has any history at all. Stages copy their configuration by value,
//! so later collections never affect an already baked stage.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Versioned bundle of package requirements under a URI scope.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PackageCollection {
    /// Version label, unique within [`PackageCollection::uri`].
    pub version: String,

    /// URI scope the collection belongs to.
    pub uri: String,

    /// Ordered package requirements.
    #[serde(default)]
    pub packages: Vec<String>,

    /// Collection this one inherits from, by convention only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub herit: Option<String>,

    /// Tools exposed by the collection.
    #[serde(default)]
    pub tools: Vec<Tool>,

    /// Environment variables applied on top of resolved packages.
    #[serde(default)]
    pub environment_variables: EnvironmentVariables,

    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl PackageCollection {
    /// Name of the base collection, if any.
    ///
    /// Older documents store an empty string instead of omitting the field.
    pub fn inherits_from(&self) -> Option<&str> {
        self.herit.as_deref().filter(|herit| !herit.is_empty())
    }

    /// Derive a new version of this collection.
    ///
    /// Copies packages, tools, environment variables, and inheritance base.
    /// Provenance is stamped fresh. The original collection is left alone.
    pub fn to_new_version(&self, version: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            uri: self.uri.clone(),
            packages: self.packages.clone(),
            herit: self.herit.clone(),
            tools: self.tools.clone(),
            environment_variables: self.environment_variables.clone(),
            created_at: Utc::now(),
            created_by: created_by.into(),
        }
    }
}

/// Package collection without provenance.
///
/// Layout used when reading a new collection from a file. Provenance is only
/// ever stamped at creation time through [`CollectionDraft::into_collection`].
#[derive(Debug, Default, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct CollectionDraft {
    pub version: String,
    pub uri: String,

    #[serde(default)]
    pub packages: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub herit: Option<String>,

    #[serde(default)]
    pub tools: Vec<Tool>,

    #[serde(default)]
    pub environment_variables: EnvironmentVariables,
}

impl CollectionDraft {
    /// Stamp provenance onto draft to produce a publishable collection.
    pub fn into_collection(self, created_by: impl Into<String>) -> PackageCollection {
        PackageCollection {
            version: self.version,
            uri: self.uri,
            packages: self.packages,
            herit: self.herit,
            tools: self.tools,
            environment_variables: self.environment_variables,
            created_at: Utc::now(),
            created_by: created_by.into(),
        }
    }
}

/// Tool exposed by a package collection.
///
/// Plain tool names and full descriptors are both accepted so that documents
/// written with bare strings keep decoding.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Tool {
    Name(String),
    Descriptor(ToolDescriptor),
}

impl Tool {
    /// Name of the tool regardless of representation.
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name.as_str(),
            Self::Descriptor(descriptor) => descriptor.name.as_str(),
        }
    }
}

impl From<&str> for Tool {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for Tool {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl Display for Tool {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Name(name) => fmt.write_str(name),
            Self::Descriptor(descriptor) => match &descriptor.version {
                Some(version) => write!(fmt, "{}-{}", descriptor.name, version),
                None => fmt.write_str(&descriptor.name),
            },
        }
    }
}

/// Detailed tool description.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ToolDescriptor {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Command line used to launch the tool, if it differs from its name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Single environment variable assignment.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

/// Ordered set of environment variable assignments.
///
/// # Invariant
///
/// - Keys are unique.
/// - Assigning an existing key replaces its value without moving it, i.e.,
///   last write wins.
#[derive(Debug, Default, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(from = "Vec<EnvVar>", into = "Vec<EnvVar>")]
pub struct EnvironmentVariables(Vec<EnvVar>);

impl EnvironmentVariables {
    /// Construct empty environment variable set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign value to key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|var| var.key == key) {
            Some(var) => var.value = value,
            None => self.0.push(EnvVar { key, value }),
        }
    }

    /// Lookup value of key.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.0
            .iter()
            .find(|var| var.key == key.as_ref())
            .map(|var| var.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvVar> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for EnvironmentVariables
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Self::new();
        for (key, value) in iter {
            vars.set(key, value);
        }
        vars
    }
}

impl From<Vec<EnvVar>> for EnvironmentVariables {
    fn from(list: Vec<EnvVar>) -> Self {
        list.into_iter().map(|var| (var.key, var.value)).collect()
    }
}

impl From<EnvironmentVariables> for Vec<EnvVar> {
    fn from(vars: EnvironmentVariables) -> Self {
        vars.0
    }
}

/// Identifier of a stored stage document.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    /// Construct stage identifier from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate fresh identifier.
    ///
    /// Uses the hex form of a BSON object id so identifiers look the same no
    /// matter which document store produced them.
    pub fn generate() -> Self {
        Self(ObjectId::new().to_hex())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for StageId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.0)
    }
}

impl From<ObjectId> for StageId {
    fn from(oid: ObjectId) -> Self {
        Self(oid.to_hex())
    }
}

/// Named deployable snapshot baked from a package collection.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Stage {
    /// Identifier assigned by the document store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StageId>,

    pub name: String,
    pub uri: String,

    /// Package collection version this stage was baked from.
    pub from_version: String,

    #[serde(default)]
    pub packages: Vec<String>,

    /// Reference to the resolved environment artifact.
    pub rxt_path: String,

    #[serde(default)]
    pub tools: Vec<Tool>,

    #[serde(default)]
    pub environment_variables: EnvironmentVariables,

    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl Stage {
    /// Copy stage configuration under a new stage name.
    ///
    /// Packages, tools, environment variables, resolved artifact, scope, and
    /// source version carry over. Provenance is stamped fresh. The copy has
    /// no identifier and stays inactive until a store activates it.
    pub fn copy_as(&self, name: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            uri: self.uri.clone(),
            from_version: self.from_version.clone(),
            packages: self.packages.clone(),
            rxt_path: self.rxt_path.clone(),
            tools: self.tools.clone(),
            environment_variables: self.environment_variables.clone(),
            active: false,
            created_at: Utc::now(),
            created_by: created_by.into(),
        }
    }

    /// Check that two stages carry the same configuration.
    ///
    /// Ignores identity, name, activation, and provenance.
    pub fn same_configuration(&self, other: &Stage) -> bool {
        self.uri == other.uri
            && self.from_version == other.from_version
            && self.packages == other.packages
            && self.rxt_path == other.rxt_path
            && self.tools == other.tools
            && self.environment_variables == other.environment_variables
    }
}

/// Full history of one stage name within a URI scope.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct StageHistory {
    pub name: String,
    pub uri: String,

    /// Every stored version, newest first.
    pub versions: Vec<Stage>,
}

impl StageHistory {
    /// Currently active version.
    pub fn active(&self) -> Option<&Stage> {
        self.versions.iter().find(|stage| stage.active)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Everything stored under one URI scope.
#[derive(Debug, Default, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ScopeListing {
    pub uri: String,
    pub collections: Vec<PackageCollection>,
    pub stages: Vec<Stage>,
}

impl ScopeListing {
    /// Nothing is stored under the scope.
    ///
    /// An empty scope is a normal result, not a failure.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.stages.is_empty()
    }
}
