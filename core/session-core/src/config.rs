//! Configuration loading for the session engine.
//!
//! Settings live in `~/.trailhead/session.toml`. A missing file yields
//! defaults; an unreadable or malformed file is an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SessionError};
use crate::session::transcript::StdoutGroup;

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".trailhead/session.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Extension stripped from a source path to form its module identifier.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
    /// Replaces path separators when deriving a module identifier.
    #[serde(default = "default_module_separator")]
    pub module_separator: char,
    #[serde(default)]
    pub display: DisplayThresholds,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source_extension: default_source_extension(),
            module_separator: default_module_separator(),
            display: DisplayThresholds::default(),
        }
    }
}

fn default_source_extension() -> String {
    "py".to_string()
}

fn default_module_separator() -> char {
    '.'
}

/// Hints for renderers that subdivide large stdout groups.
///
/// The engine never applies these itself; grouping is independent of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayThresholds {
    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,
    #[serde(default = "default_group_after_rate_per_second")]
    pub group_after_rate_per_second: f64,
}

impl Default for DisplayThresholds {
    fn default() -> Self {
        Self {
            min_group_size: default_min_group_size(),
            group_after_rate_per_second: default_group_after_rate_per_second(),
        }
    }
}

fn default_min_group_size() -> usize {
    100
}

fn default_group_after_rate_per_second() -> f64 {
    60.0
}

impl DisplayThresholds {
    /// Whether a renderer should show `group` as a collapsed summary.
    ///
    /// A group whose lines all arrived at the same instant counts as
    /// arbitrarily fast.
    pub fn should_collapse(&self, group: &StdoutGroup) -> bool {
        if group.len() < self.min_group_size {
            return false;
        }
        match group.lines_per_second() {
            Some(rate) => rate >= self.group_after_rate_per_second,
            None => true,
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(SessionError::HomeDirNotFound)?;
    Ok(home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

/// Loads the session configuration from `path`, or from the default location
/// when `path` is `None`.
pub fn load_session_config(path: Option<&Path>) -> Result<SessionConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No session config; using defaults");
        return Ok(SessionConfig::default());
    }

    let content =
        fs_err::read_to_string(&config_path).map_err(|source| SessionError::ConfigRead {
            path: config_path.clone(),
            source,
        })?;
    toml::from_str::<SessionConfig>(&content).map_err(|err| SessionError::ConfigMalformed {
        path: config_path.clone(),
        details: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn group_with(lines: usize, window_ms: i64) -> StdoutGroup {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut group = StdoutGroup::open("line 0".to_string(), start);
        let end = start + Duration::milliseconds(window_ms);
        for i in 1..lines {
            group.push(format!("line {}", i), end);
        }
        group
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = load_session_config(Some(&dir.path().join("absent.toml"))).expect("load");
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.source_extension, "py");
        assert_eq!(config.module_separator, '.');
        assert_eq!(config.display.min_group_size, 100);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("session.toml");
        std::fs::write(
            &path,
            "source_extension = \"src\"\n\n[display]\nmin_group_size = 5\n",
        )
        .expect("write config");

        let config = load_session_config(Some(&path)).expect("load");
        assert_eq!(config.source_extension, "src");
        assert_eq!(config.module_separator, '.');
        assert_eq!(config.display.min_group_size, 5);
        assert_eq!(config.display.group_after_rate_per_second, 60.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("session.toml");
        std::fs::write(&path, "module_separator = 12\n").expect("write config");

        let err = load_session_config(Some(&path)).unwrap_err();
        assert!(matches!(err, SessionError::ConfigMalformed { .. }));
    }

    #[test]
    fn small_groups_never_collapse() {
        let thresholds = DisplayThresholds::default();
        assert!(!thresholds.should_collapse(&group_with(99, 10)));
    }

    #[test]
    fn fast_large_groups_collapse() {
        let thresholds = DisplayThresholds::default();
        // 200 lines in one second.
        assert!(thresholds.should_collapse(&group_with(200, 1_000)));
        // 200 lines in the same instant.
        assert!(thresholds.should_collapse(&group_with(200, 0)));
    }

    #[test]
    fn slow_large_groups_stay_expanded() {
        let thresholds = DisplayThresholds::default();
        // 120 lines over ten seconds is 12 lines per second.
        assert!(!thresholds.should_collapse(&group_with(120, 10_000)));
    }
}
