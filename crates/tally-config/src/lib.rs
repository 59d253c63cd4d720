#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! File- and environment-backed configuration for Tally.
//!
//! Layout: `model.rs` (typed sections), `defaults.rs` (default values),
//! `loader.rs` (JSON file plus `TALLY_*` overrides), `validate.rs`
//! (range and format checks).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_env_overrides, load, load_file};
pub use model::{ApiConfig, AppConfig, ListConfig, LoggingSection, SessionConfig};
pub use validate::validate;
