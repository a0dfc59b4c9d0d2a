//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (`<library-root>/config.json`)
//! 3. Environment variables (DIREKTIV_* prefix)
//!
//! Environment variables take precedence over config file values. The
//! engine never reads this; the CLI turns it into [`LibraryOptions`] and
//! [`ImportOptions`].

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::import::ImportOptions;
use crate::library::LibraryOptions;
use crate::models::DEFAULT_CATEGORY;
use crate::paths::CONFIG_FILE;

/// Environment variable prefix
const ENV_PREFIX: &str = "DIREKTIV";

/// Library directory name under the home directory
const DEFAULT_ROOT_DIR: &str = ".direktiv";

/// User preferences
///
/// Unknown keys in the file are ignored, so older files with display-only
/// settings still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Category for `add` without `--category` and for top-level imports
    #[serde(default = "default_category")]
    pub default_category: String,

    /// Colour theme name, used by front ends
    #[serde(default = "default_theme")]
    pub theme: String,

    /// Seconds a document must stay open before a viewer marks it read
    #[serde(default = "default_auto_mark_read")]
    pub auto_mark_read_after_seconds: u64,

    /// Import dot-files by default
    #[serde(default)]
    pub show_hidden_files: bool,

    /// Editor command for opening documents
    #[serde(default)]
    pub editor: Option<String>,

    /// Write logs here instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_category: default_category(),
            theme: default_theme(),
            auto_mark_read_after_seconds: default_auto_mark_read(),
            show_hidden_files: false,
            editor: None,
            log_file: None,
        }
    }
}

impl Config {
    /// Load the configuration of the library at `root`
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (DIREKTIV_DEFAULT_CATEGORY, DIREKTIV_THEME,
    ///    DIREKTIV_SHOW_HIDDEN, DIREKTIV_LOG_FILE)
    /// 2. `<root>/config.json`
    /// 3. Default values
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_from_path(&Self::config_file_path(root))
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a JSON string (useful for testing)
    pub fn load_from_str(json: &str) -> Result<Self> {
        let mut config: Config = serde_json::from_str(json).context("Failed to parse config JSON")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // DIREKTIV_DEFAULT_CATEGORY
        if let Ok(val) = std::env::var(format!("{}_DEFAULT_CATEGORY", ENV_PREFIX)) {
            if !val.trim().is_empty() {
                self.default_category = val;
            }
        }

        // DIREKTIV_THEME
        if let Ok(val) = std::env::var(format!("{}_THEME", ENV_PREFIX)) {
            if !val.is_empty() {
                self.theme = val;
            }
        }

        // DIREKTIV_SHOW_HIDDEN
        if let Ok(val) = std::env::var(format!("{}_SHOW_HIDDEN", ENV_PREFIX)) {
            self.show_hidden_files = val.eq_ignore_ascii_case("true") || val == "1";
        }

        // DIREKTIV_LOG_FILE
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Save configuration as pretty JSON
    ///
    /// Written to a temporary sibling and renamed, so a crash leaves either
    /// the old or the new file.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", temp_path))?;
        File::open(&temp_path)
            .and_then(|f| f.sync_all())
            .with_context(|| format!("Failed to sync config file: {:?}", temp_path))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to replace config file: {:?}", path))?;
        Ok(())
    }

    /// Path of the config file for the library at `root`
    pub fn config_file_path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// Options for opening the library
    pub fn library_options(&self) -> LibraryOptions {
        LibraryOptions {
            default_category: self.default_category.clone(),
        }
    }

    /// Import defaults derived from preferences
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            include_hidden: self.show_hidden_files,
            ..ImportOptions::default()
        }
    }
}

/// Resolve the library root
///
/// Order of precedence: explicit path (`--root`), `DIREKTIV_ROOT`,
/// `~/.direktiv`.
pub fn resolve_library_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(format!("{}_ROOT", ENV_PREFIX)) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    default_library_root().context("Could not determine home directory; pass --root")
}

/// `~/.direktiv`, if there is a home directory
pub fn default_library_root() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_ROOT_DIR))
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_auto_mark_read() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "DIREKTIV_DEFAULT_CATEGORY",
        "DIREKTIV_THEME",
        "DIREKTIV_SHOW_HIDDEN",
        "DIREKTIV_LOG_FILE",
        "DIREKTIV_ROOT",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_category, "General");
        assert_eq!(config.theme, "dark");
        assert_eq!(config.auto_mark_read_after_seconds, 30);
        assert!(!config.show_hidden_files);
        assert!(config.editor.is_none());
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_load_from_str_partial() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_str(r#"{ "theme": "light", "editor": "vim" }"#).unwrap();

        assert_eq!(config.theme, "light");
        assert_eq!(config.editor.as_deref(), Some("vim"));
        assert_eq!(config.default_category, "General");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let _guard = EnvGuard::new(ENV_VARS);

        let json = r#"{
            "default_category": "Inbox",
            "categories": { "Work": { "icon": "x", "color": null } },
            "ui": { "tree_width": 50 }
        }"#;
        let config = Config::load_from_str(json).unwrap();

        assert_eq!(config.default_category, "Inbox");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let _guard = EnvGuard::new(ENV_VARS);

        assert!(Config::load_from_str("{ not json").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = EnvGuard::new(ENV_VARS);
        let mut config = Config::default();

        env::set_var("DIREKTIV_DEFAULT_CATEGORY", "Inbox");
        env::set_var("DIREKTIV_THEME", "light");
        env::set_var("DIREKTIV_SHOW_HIDDEN", "1");
        env::set_var("DIREKTIV_LOG_FILE", "/tmp/direktiv.log");
        config.apply_env_overrides();

        assert_eq!(config.default_category, "Inbox");
        assert_eq!(config.theme, "light");
        assert!(config.show_hidden_files);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/direktiv.log")));

        // Empty string clears it
        env::set_var("DIREKTIV_LOG_FILE", "");
        env::set_var("DIREKTIV_SHOW_HIDDEN", "false");
        config.apply_env_overrides();
        assert!(config.log_file.is_none());
        assert!(!config.show_hidden_files);
    }

    #[test]
    fn test_env_overrides_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("config.json"),
            r#"{ "default_category": "FromFile" }"#,
        )
        .unwrap();

        env::set_var("DIREKTIV_DEFAULT_CATEGORY", "FromEnv");
        let config = Config::load(temp_dir.path()).unwrap();

        assert_eq!(config.default_category, "FromEnv");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();

        let config = Config::load(temp_dir.path()).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let config = Config {
            default_category: "Reading".to_string(),
            editor: Some("nano".to_string()),
            ..Default::default()
        };
        config.save_to_path(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"default_category\": \"Reading\""));
        assert!(!temp_dir.path().join("nested").join("config.json.tmp").exists());
        assert_eq!(Config::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_derived_options() {
        let config = Config {
            default_category: "Inbox".to_string(),
            show_hidden_files: true,
            ..Default::default()
        };

        assert_eq!(config.library_options().default_category, "Inbox");
        let import = config.import_options();
        assert!(import.include_hidden);
        assert!(import.recursive);
        assert!(import.skip_identical);
    }

    #[test]
    fn test_resolve_library_root() {
        let _guard = EnvGuard::new(ENV_VARS);

        assert_eq!(
            resolve_library_root(Some(Path::new("/explicit"))).unwrap(),
            PathBuf::from("/explicit")
        );

        env::set_var("DIREKTIV_ROOT", "/from/env");
        assert_eq!(
            resolve_library_root(None).unwrap(),
            PathBuf::from("/from/env")
        );
        assert_eq!(
            resolve_library_root(Some(Path::new("/explicit"))).unwrap(),
            PathBuf::from("/explicit")
        );
    }
}
