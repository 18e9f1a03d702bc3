//! Project settings for the database browser.
//!
//! Settings live in a YAML file (by default `.localdb.yml` in the project
//! root). Every field is optional; a missing file yields the defaults.
//!
//! # Example YAML
//!
//! ```yaml
//! database_path: data/app.db
//! backend: buffered
//! autodetect: true
//! query_row_limit: 1000
//! table_window: 100
//! watch_path: db/seed.ts
//! watch_interval_ms: 500
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Default settings file name, looked up in the project root.
pub const SETTINGS_FILE_NAME: &str = ".localdb.yml";

/// Default cap on rows returned by the query console.
pub const DEFAULT_QUERY_ROW_LIMIT: usize = 1000;

/// Default number of rows loaded into the table editor.
pub const DEFAULT_TABLE_WINDOW: usize = 100;

/// Default polling interval of the seed-file watcher.
pub const DEFAULT_WATCH_INTERVAL_MS: u64 = 500;

/// How the database file is held open.
///
/// # Examples
///
/// ```
/// use localdb_config::Backend;
///
/// assert_eq!(Backend::default(), Backend::Buffered);
/// assert!(Backend::Buffered.needs_persist());
/// assert!(!Backend::Native.needs_persist());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Open the file directly; committed writes are durable immediately.
    Native,
    /// Work on a private image of the file; writes reach the origin file
    /// only when persisted.
    #[default]
    Buffered,
}

impl Backend {
    /// Returns `true` if mutations must be written back explicitly.
    pub fn needs_persist(self) -> bool {
        matches!(self, Backend::Buffered)
    }
}

/// Browser settings.
///
/// # Examples
///
/// ```
/// use localdb_config::Settings;
///
/// let settings: Settings = serde_yaml::from_str("database_path: app.db\n").unwrap();
/// assert_eq!(settings.query_row_limit, 1000);
/// assert!(settings.autodetect);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database opened at startup when autodetection finds nothing.
    pub database_path: Option<PathBuf>,
    /// Storage backend.
    pub backend: Backend,
    /// Probe `.astro/content.db` under the project root first.
    pub autodetect: bool,
    /// Maximum rows returned by a console query.
    pub query_row_limit: usize,
    /// Rows loaded into the table editor.
    pub table_window: usize,
    /// External file whose changes refresh the tree.
    pub watch_path: Option<PathBuf>,
    /// Polling interval for `watch_path`, in milliseconds.
    pub watch_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            backend: Backend::default(),
            autodetect: true,
            query_row_limit: DEFAULT_QUERY_ROW_LIMIT,
            table_window: DEFAULT_TABLE_WINDOW,
            watch_path: None,
            watch_interval_ms: DEFAULT_WATCH_INTERVAL_MS,
        }
    }
}

impl Settings {
    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::ConfigError::IoError) if the file cannot
    /// be read, [`YamlError`](crate::ConfigError::YamlError) if parsing
    /// fails, or [`InvalidSetting`](crate::ConfigError::InvalidSetting) if a
    /// limit is zero.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let settings: Settings = serde_yaml::from_reader(reader)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from `path`, falling back to defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load) for a file that exists.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Loads `<project_root>/.localdb.yml`, or defaults.
    ///
    /// # Errors
    ///
    /// Same as [`load_or_default`](Self::load_or_default).
    pub fn for_project(project_root: impl AsRef<Path>) -> Result<Self> {
        Self::load_or_default(project_root.as_ref().join(SETTINGS_FILE_NAME))
    }

    /// Saves the settings as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::ConfigError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::ConfigError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks that the row limits are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] for a zero limit.
    pub fn validate(&self) -> Result<()> {
        if self.query_row_limit == 0 {
            return Err(ConfigError::InvalidSetting(
                "query_row_limit must be at least 1".to_string(),
            ));
        }
        if self.table_window == 0 {
            return Err(ConfigError::InvalidSetting(
                "table_window must be at least 1".to_string(),
            ));
        }
        if self.watch_interval_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "watch_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
database_path: data/app.db
backend: native
autodetect: false
query_row_limit: 50
table_window: 20
watch_path: db/seed.ts
watch_interval_ms: 250
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let settings: Settings = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(settings.database_path, Some(PathBuf::from("data/app.db")));
        assert_eq!(settings.backend, Backend::Native);
        assert!(!settings.autodetect);
        assert_eq!(settings.query_row_limit, 50);
        assert_eq!(settings.table_window, 20);
        assert_eq!(settings.watch_path, Some(PathBuf::from("db/seed.ts")));
        assert_eq!(settings.watch_interval_ms, 250);
    }

    #[test]
    fn test_deserialize_empty_document_uses_defaults() {
        let settings: Settings = serde_yaml::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.backend, Backend::Buffered);
        assert_eq!(settings.table_window, DEFAULT_TABLE_WINDOW);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(serde_yaml::from_str::<Settings>("backend: wasm\n").is_err());
    }

    #[test]
    fn test_zero_limit_is_invalid() {
        let settings = Settings {
            query_row_limit: 0,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_zero_watch_interval_is_invalid() {
        let settings = Settings {
            watch_interval_ms: 0,
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("watch_interval_ms"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(dir.path().join("missing.yml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);

        let original: Settings = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = Settings::for_project(dir.path()).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_rejects_invalid_limits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "table_window: 0\n").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(ConfigError::InvalidSetting(_))
        ));
    }
}
