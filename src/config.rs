// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that rezlauncher uses to
//! simplify the process of serialization and deserialization. The file is
//! optional. Every missing setting falls back to its default.
//!
//! # General Layout
//!
//! ```toml
//! [database]
//! backend = "mongodb"
//! uri = "mongodb://localhost:27017"
//! name = "rez_launcher"
//!
//! [logging]
//! directory = "$TMPDIR/rezlauncher_logs"
//! level = "info"
//! ```

use crate::path::default_log_dir;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Rezlauncher settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Document store to use.
    pub database: DatabaseSettings,

    /// Log output settings.
    pub logging: LogSettings,
}

impl Settings {
    /// Load settings from configuration file.
    ///
    /// A missing configuration file is not an error. Defaults are used
    /// instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if existing file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is invalid.
    /// - Return [`ConfigError::ShellExpansion`] if log directory cannot be
    ///   expanded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no configuration file at {:?}, using defaults", path.display());
            return Ok(Self::default());
        }

        read_to_string(path)
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            })?
            .parse()
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on log directory field.
        settings.logging.directory = PathBuf::from(
            shellexpand::full(settings.logging.directory.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned(),
        );

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Document store settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Kind of document store.
    pub backend: Backend,

    /// MongoDB connection string.
    pub uri: String,

    /// Name of MongoDB database.
    pub name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            uri: "mongodb://localhost:27017".into(),
            name: "rez_launcher".into(),
        }
    }
}

/// Available document store backends.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Persist to MongoDB.
    #[default]
    Mongodb,

    /// Keep everything in memory for the current process only.
    Memory,
}

/// Log output settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// Directory to place log files in.
    pub directory: PathBuf,

    /// Default log filter when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            level: "info".into(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("STUDIO_LOGS", "/studio/logs")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            [database]
            backend = "memory"
            uri = "mongodb://db.studio:27017/?replicaSet=rs0"
            name = "launcher"

            [logging]
            directory = "$STUDIO_LOGS/rezlauncher"
            level = "debug"
        "#
        .parse()?;

        let expect = Settings {
            database: DatabaseSettings {
                backend: Backend::Memory,
                uri: "mongodb://db.studio:27017/?replicaSet=rs0".into(),
                name: "launcher".into(),
            },
            logging: LogSettings {
                directory: PathBuf::from("/studio/logs/rezlauncher"),
                level: "debug".into(),
            },
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn partial_settings_fall_back_to_defaults() -> anyhow::Result<()> {
        let result: Settings = r#"
            [database]
            name = "sandbox"
        "#
        .parse()?;

        assert_eq!(result.database.backend, Backend::Mongodb);
        assert_eq!(result.database.uri, "mongodb://localhost:27017");
        assert_eq!(result.database.name, "sandbox");
        assert_eq!(result.logging, LogSettings::default());

        Ok(())
    }

    #[test]
    fn serialize_settings() {
        let result = Settings {
            database: DatabaseSettings::default(),
            logging: LogSettings {
                directory: PathBuf::from("/var/log/rezlauncher"),
                level: "info".into(),
            },
        }
        .to_string();

        let expect = indoc! {r#"
            [database]
            backend = "mongodb"
            uri = "mongodb://localhost:27017"
            name = "rez_launcher"

            [logging]
            directory = "/var/log/rezlauncher"
            level = "info"
        "#};
        assert_eq!(result, expect);
    }

    #[test]
    fn missing_file_loads_defaults() -> anyhow::Result<()> {
        let result = Settings::load("/nonexistent/rezlauncher/config.toml")?;
        assert_eq!(result, Settings::default());
        Ok(())
    }
}
