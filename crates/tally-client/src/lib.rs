#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! HTTP implementation of the Tally remote collection.
//!
//! Layout: `http.rs` (the `reqwest` client and request plumbing),
//! `problem.rs` (mapping failed responses onto `RemoteError`), `error.rs`
//! (construction errors).

pub mod error;
pub mod http;
mod problem;

pub use error::{ClientError, ClientResult};
pub use http::{HEADER_REQUEST_ID, HttpCollection};
