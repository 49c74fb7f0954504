// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that rezlauncher
//! reads or writes, i.e., its configuration file and its log files.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Determine default absolute path to configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/rezlauncher/config.toml` as
/// the default. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoConfigDir`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("rezlauncher").join("config.toml"))
        .ok_or(NoConfigDir)
}

/// Determine default directory for log files.
///
/// Log files go to `rezlauncher_logs` under the system temporary directory.
pub fn default_log_dir() -> PathBuf {
    std::env::temp_dir().join("rezlauncher_logs")
}

/// Name of log file for session started at given time.
pub fn log_file_name(started: DateTime<Utc>) -> String {
    format!("rezlauncher_{}.log", started.format("%Y%m%d_%H%M%S"))
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoConfigDir;

/// Friendly result alias :3
pub type Result<T, E = NoConfigDir> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn log_file_name_uses_session_start() {
        let started = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(log_file_name(started), "rezlauncher_20250309_140507.log");
    }

    #[test]
    fn default_log_dir_lives_in_temp_dir() {
        let result = default_log_dir();
        assert!(result.starts_with(std::env::temp_dir()));
        assert!(result.ends_with("rezlauncher_logs"));
    }
}
