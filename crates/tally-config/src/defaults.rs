//! Default values for every configuration field.
//!
//! # Design
//! - Keep list-behaviour defaults explicit so the CLI and tests agree on them.

/// Remote API root.
pub const API_BASE_URL: &str = "http://localhost:3000";
/// Collection resource under the API root.
pub const API_RESOURCE: &str = "todos";
/// Transport timeout for remote calls, in seconds.
pub const API_TIMEOUT_SECS: u64 = 10;
/// Undo window for deferred deletes, in milliseconds.
pub const UNDO_WINDOW_MS: u64 = 5_000;
/// Quiet period before search text applies, in milliseconds.
pub const SEARCH_DEBOUNCE_MS: u64 = 200;
/// Rows per page when nothing else is requested.
pub const PAGE_SIZE: usize = 10;
/// Allowed page sizes.
pub const PAGE_SIZES: [usize; 3] = [10, 20, 50];
/// Largest select-all accepted.
pub const SELECT_ALL_LIMIT: usize = 500;
/// Minimum trimmed title length.
pub const MIN_TITLE_LEN: usize = 3;
/// Session file used to restore the last view between runs.
pub const SESSION_PATH: &str = ".tally/session.json";
/// Log level filter when neither config nor `RUST_LOG` set one.
pub const LOG_LEVEL: &str = "info";
/// Longest undo window accepted, in milliseconds.
pub const MAX_UNDO_WINDOW_MS: u64 = 60_000;
/// Longest search debounce accepted, in milliseconds.
pub const MAX_SEARCH_DEBOUNCE_MS: u64 = 5_000;
