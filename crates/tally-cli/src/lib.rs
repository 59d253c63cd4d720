#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::redundant_pub_crate)]

//! Command-line client for a remote task list.
//!
//! Layout:
//! - `cli.rs`: argument parsing, configuration layering and command dispatch
//! - `commands/`: one-shot item commands and the interactive shell
//! - `client.rs`: shared context and error types
//! - `output.rs`: renderers and formatting helpers
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod commands;
pub(crate) mod output;

pub use cli::run;
