#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Logging setup shared by the Tally binaries.
//!
//! Layout: `init.rs` (subscriber installation and format selection),
//! `context.rs` (process-wide span carrying the command and build SHA).

pub mod context;
pub mod init;

pub use context::GlobalContextGuard;
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
