//! Layered JSON settings files
//!
//! Three optional scopes merge key-by-key, each overriding the previous:
//! global (user config dir), project root, analysis root. A missing or
//! unreadable file is an empty scope; malformed JSON is surfaced to the
//! notifier and fails the request for that scope.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BackendError, Result};
use crate::notify::Notifier;

/// File name used by every scope
pub const SETTINGS_FILE: &str = "ghc-mod.json";

/// One scope of tool settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub disable: Option<bool>,
    pub suppress_errors: Option<bool>,
    pub ghc_options: Option<Vec<String>>,
    pub ghc_mod_options: Option<Vec<String>>,
}

impl Settings {
    /// Overlay `over` onto `self`, key by key
    pub fn overlay(mut self, over: Settings) -> Settings {
        if over.disable.is_some() {
            self.disable = over.disable;
        }
        if over.suppress_errors.is_some() {
            self.suppress_errors = over.suppress_errors;
        }
        if over.ghc_options.is_some() {
            self.ghc_options = over.ghc_options;
        }
        if over.ghc_mod_options.is_some() {
            self.ghc_mod_options = over.ghc_mod_options;
        }
        self
    }

    pub fn disabled(&self) -> bool {
        self.disable.unwrap_or(false)
    }

    pub fn suppresses_errors(&self) -> bool {
        self.suppress_errors.unwrap_or(false)
    }

    pub fn effective_ghc_options(&self) -> &[String] {
        self.ghc_options.as_deref().unwrap_or(&[])
    }

    pub fn effective_ghc_mod_options(&self) -> &[String] {
        self.ghc_mod_options.as_deref().unwrap_or(&[])
    }
}

/// Default global settings path under the user configuration directory
pub fn global_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("haskmate").join(SETTINGS_FILE))
}

/// Load and merge global → project → root-local settings
pub async fn load_merged(
    global: Option<&Path>,
    project_dir: &Path,
    root_dir: &Path,
    notifier: &Arc<dyn Notifier>,
) -> Result<Settings> {
    let mut merged = Settings::default();
    let mut paths: Vec<PathBuf> = Vec::with_capacity(3);
    if let Some(path) = global {
        paths.push(path.to_path_buf());
    }
    paths.push(project_dir.join(SETTINGS_FILE));
    let root_path = root_dir.join(SETTINGS_FILE);
    if Some(&root_path) != paths.last() {
        paths.push(root_path);
    }

    for path in paths {
        merged = merged.overlay(load_scope(&path, notifier).await?);
    }
    Ok(merged)
}

async fn load_scope(path: &Path, notifier: &Arc<dyn Notifier>) -> Result<Settings> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(_) => {
            debug!(path = %path.display(), "No settings file for scope");
            return Ok(Settings::default());
        }
    };
    serde_json::from_str(&raw).map_err(|e| {
        notifier.error(&format!(
            "Failed to parse {}: {e}",
            path.display()
        ));
        BackendError::SettingsParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;

    fn notifier() -> Arc<dyn Notifier> {
        Arc::new(LogNotifier)
    }

    #[test]
    fn test_overlay_overrides_key_by_key() {
        let base = Settings {
            disable: Some(false),
            suppress_errors: Some(true),
            ghc_options: Some(vec!["-Wall".into()]),
            ghc_mod_options: None,
        };
        let over = Settings {
            disable: Some(true),
            suppress_errors: None,
            ghc_options: None,
            ghc_mod_options: Some(vec!["--verbose".into()]),
        };
        let merged = base.overlay(over);
        assert_eq!(merged.disable, Some(true));
        assert_eq!(merged.suppress_errors, Some(true));
        assert_eq!(merged.effective_ghc_options(), ["-Wall"]);
        assert_eq!(merged.effective_ghc_mod_options(), ["--verbose"]);
    }

    #[tokio::test]
    async fn test_missing_files_resolve_empty() {
        let dir = tempfile::tempdir().unwrap();
        let merged = load_merged(None, dir.path(), dir.path(), &notifier())
            .await
            .unwrap();
        assert_eq!(merged, Settings::default());
    }

    #[tokio::test]
    async fn test_root_overrides_project() {
        let project = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        std::fs::write(
            project.path().join(SETTINGS_FILE),
            r#"{"disable": true, "ghcOptions": ["-Wall"]}"#,
        )
        .unwrap();
        std::fs::write(root.path().join(SETTINGS_FILE), r#"{"disable": false}"#).unwrap();

        let merged = load_merged(None, project.path(), root.path(), &notifier())
            .await
            .unwrap();
        assert!(!merged.disabled());
        assert_eq!(merged.effective_ghc_options(), ["-Wall"]);
    }

    #[tokio::test]
    async fn test_same_project_and_root_read_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{"disable": true}"#).unwrap();
        let merged = load_merged(None, dir.path(), dir.path(), &notifier())
            .await
            .unwrap();
        assert!(merged.disabled());
    }

    #[tokio::test]
    async fn test_malformed_json_fails_scope() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{not json").unwrap();
        let err = load_merged(None, dir.path(), dir.path(), &notifier())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::SettingsParse { .. }));
    }
}
