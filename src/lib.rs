// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Stage and package collection store for rez-based launchers.
//!
//! A __package collection__ is a versioned bundle of package requirements
//! under a URI scope. A __stage__ is a named snapshot baked from one package
//! collection version, and every stage name keeps an append-only history with
//! exactly one active version.
//!
//! # Layers
//!
//! 1. [`model`] defines stored documents.
//! 2. [`store`] persists documents through the [`DocumentStore`] trait.
//! 3. [`launcher`] implements the bake, revert, and push workflows.
//! 4. [`command`] exposes workflows to presentation layers.
//!
//! [`DocumentStore`]: crate::store::DocumentStore

pub mod command;
pub mod config;
pub mod launcher;
pub mod model;
pub mod path;
pub mod store;

pub use launcher::{BakeRequest, ChangeEvent, ErrorKind, Launcher, LauncherError};
pub use model::{PackageCollection, Stage, StageId};
