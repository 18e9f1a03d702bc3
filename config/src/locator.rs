//! Database path resolution with a fallback chain.
//!
//! A [`DatabaseLocator`] holds an ordered list of candidate paths. The first
//! candidate that points at an existing file wins. The project chain built by
//! [`DatabaseLocator::for_project`] probes the Astro content database first
//! and the configured `database_path` second.
//!
//! ```no_run
//! use localdb_config::{DatabaseLocator, Settings};
//!
//! let settings = Settings::for_project(".").unwrap();
//! let located = DatabaseLocator::for_project(".", &settings).resolve().unwrap();
//! println!("opening {}", located.path.display());
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::settings::Settings;

/// Conventional location of the Astro content database, relative to the
/// project root.
pub const ASTRO_CONTENT_DB: &str = ".astro/content.db";

/// Describes where a candidate path came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// Passed explicitly (command line).
    Explicit,
    /// Conventional path probed under the project root.
    Autodetect,
    /// `database_path` from the settings file.
    Configured,
}

/// One candidate path in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Path to probe.
    pub path: PathBuf,
    /// Origin of the path.
    pub source: CandidateSource,
}

/// Builder for a [`DatabaseLocator`].
///
/// Candidates are tried in the order they are added.
///
/// # Example
///
/// ```
/// use localdb_config::DatabaseLocator;
///
/// let locator = DatabaseLocator::builder()
///     .explicit("/tmp/a.db")
///     .configured("/tmp/b.db")
///     .build();
/// assert_eq!(locator.candidates().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct LocatorBuilder {
    candidates: Vec<Candidate>,
}

impl LocatorBuilder {
    /// Creates a builder with no candidates.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, path: impl Into<PathBuf>, source: CandidateSource) -> Self {
        self.candidates.push(Candidate {
            path: path.into(),
            source,
        });
        self
    }

    /// Adds an explicitly requested path.
    pub fn explicit(self, path: impl Into<PathBuf>) -> Self {
        self.push(path, CandidateSource::Explicit)
    }

    /// Adds a conventional autodetect path.
    pub fn autodetect(self, path: impl Into<PathBuf>) -> Self {
        self.push(path, CandidateSource::Autodetect)
    }

    /// Adds the configured default path.
    pub fn configured(self, path: impl Into<PathBuf>) -> Self {
        self.push(path, CandidateSource::Configured)
    }

    /// Finishes the chain.
    pub fn build(self) -> DatabaseLocator {
        DatabaseLocator {
            candidates: self.candidates,
        }
    }
}

/// The resolved database path and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// Existing database file.
    pub path: PathBuf,
    /// Candidate origin.
    pub source: CandidateSource,
}

/// Ordered chain of candidate database paths.
#[derive(Debug, Clone, Default)]
pub struct DatabaseLocator {
    candidates: Vec<Candidate>,
}

impl DatabaseLocator {
    /// Returns a new [`LocatorBuilder`].
    pub fn builder() -> LocatorBuilder {
        LocatorBuilder::new()
    }

    /// Builds the standard chain for a project.
    ///
    /// With `autodetect` enabled, `<root>/.astro/content.db` is probed
    /// first. The configured `database_path` follows; a relative configured
    /// path is resolved against the project root.
    pub fn for_project(project_root: impl AsRef<Path>, settings: &Settings) -> Self {
        let root = project_root.as_ref();
        let mut builder = Self::builder();
        if settings.autodetect {
            builder = builder.autodetect(root.join(ASTRO_CONTENT_DB));
        }
        if let Some(path) = &settings.database_path {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                root.join(path)
            };
            builder = builder.configured(path);
        }
        builder.build()
    }

    /// Returns the candidates in probe order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Returns the first candidate that is an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoDatabaseFound`] listing every probed path if
    /// none exists.
    pub fn resolve(&self) -> Result<Located> {
        for candidate in &self.candidates {
            if candidate.path.is_file() {
                debug!(path = %candidate.path.display(), source = ?candidate.source, "database located");
                return Ok(Located {
                    path: candidate.path.clone(),
                    source: candidate.source.clone(),
                });
            }
            debug!(path = %candidate.path.display(), "candidate missing");
        }
        let tried = self
            .candidates
            .iter()
            .map(|c| c.path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(ConfigError::NoDatabaseFound { tried })
    }
}
