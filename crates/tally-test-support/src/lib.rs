#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (sample data, controller builders), mocks.rs (in-memory remote), assert.rs (event assertions).

pub mod assert;
pub mod fixtures;
pub mod mocks;
