//! Command handlers grouped by concern.

pub(crate) mod items;
pub(crate) mod shell;
