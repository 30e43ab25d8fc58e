//! Module identifiers derived from source paths.

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;

/// What a session runs: a module identifier plus the source file it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTarget {
    pub module: String,
    pub path: String,
}

impl ProcessTarget {
    pub fn new(module: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            path: path.into(),
        }
    }

    pub fn from_path(path: impl Into<String>, config: &SessionConfig) -> Self {
        let path = path.into();
        Self {
            module: module_from_path(&path, config),
            path,
        }
    }
}

/// `./pkg/sub/mod.py` -> `pkg.sub.mod` with the default config.
///
/// Strips a leading relative marker, then the configured source extension
/// (suffix only), then replaces `/` and `\` with the module separator.
pub fn module_from_path(path: &str, config: &SessionConfig) -> String {
    let relative = path
        .strip_prefix("./")
        .or_else(|| path.strip_prefix(".\\"))
        .unwrap_or(path);

    let stem = if config.source_extension.is_empty() {
        relative
    } else {
        let suffix = format!(".{}", config.source_extension);
        relative.strip_suffix(suffix.as_str()).unwrap_or(relative)
    };

    stem.chars()
        .map(|c| match c {
            '/' | '\\' => config.module_separator,
            other => other,
        })
        .collect()
}
