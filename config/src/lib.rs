//! Settings and database autodetection for the local database browser.
//!
//! This crate answers two questions before a database is opened: which
//! settings apply to the project, and which file should be opened.
//!
//! # Quick start
//!
//! ```no_run
//! use localdb_config::{DatabaseLocator, Settings};
//!
//! // Reads ./.localdb.yml, or falls back to defaults
//! let settings = Settings::for_project(".").unwrap();
//!
//! // Probes .astro/content.db, then the configured database_path
//! match DatabaseLocator::for_project(".", &settings).resolve() {
//!     Ok(located) => println!("found {}", located.path.display()),
//!     Err(err) => eprintln!("{err}"),
//! }
//! ```

mod error;
mod locator;
mod settings;

pub use error::{ConfigError, Result};
pub use locator::{
    ASTRO_CONTENT_DB, Candidate, CandidateSource, DatabaseLocator, Located, LocatorBuilder,
};
pub use settings::{
    Backend, DEFAULT_QUERY_ROW_LIMIT, DEFAULT_TABLE_WINDOW, DEFAULT_WATCH_INTERVAL_MS,
    SETTINGS_FILE_NAME, Settings,
};
