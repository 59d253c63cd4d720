//! Shareable location string and session mirror for view parameters.
//!
//! # Design
//! - Defaults are omitted when encoding so an untouched view encodes to `""`.
//! - Decoding never fails: unknown keys are ignored and malformed values fall
//!   back to their defaults.
//! - Restore precedence is location string, then session store, then defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::SessionError;
use crate::projection::{PageSize, ViewParams};

/// Session store key holding the encoded view.
pub const SESSION_KEY: &str = "tally.view";

/// Encode `params` as a query string without the leading `?`.
#[must_use]
pub fn encode(params: &ViewParams) -> String {
    let defaults = ViewParams::default();
    let mut pairs: Vec<String> = Vec::new();

    let search = params.search.trim();
    if !search.is_empty() {
        pairs.push(format!("q={}", urlencoding::encode(search)));
    }
    if params.status != defaults.status {
        pairs.push(format!("status={}", params.status.as_str()));
    }
    if params.sort != defaults.sort {
        pairs.push(format!("sort={}", params.sort.as_str()));
    }
    if params.page > 1 {
        pairs.push(format!("page={}", params.page));
    }
    if params.page_size != defaults.page_size {
        pairs.push(format!("ps={}", params.page_size.get()));
    }
    pairs.join("&")
}

/// Decode a query string, tolerating a leading `?` and `+` for spaces.
#[must_use]
pub fn decode(raw: &str) -> ViewParams {
    let mut params = ViewParams::default();
    let query = raw.trim().trim_start_matches('?');

    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let Some(value) = decode_component(value) else {
            continue;
        };
        match key {
            "q" => params.search = value.trim().to_string(),
            "status" => params.status = value.parse().unwrap_or_default(),
            "sort" => params.sort = value.parse().unwrap_or_default(),
            "page" => {
                params.page = value
                    .parse::<usize>()
                    .ok()
                    .filter(|page| *page >= 1)
                    .unwrap_or(1);
            }
            "ps" => params.page_size = value.parse::<PageSize>().unwrap_or_default(),
            _ => {}
        }
    }
    params
}

fn decode_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|value| value.into_owned())
}

/// Session-scoped key/value storage for the encoded view.
pub trait SessionStore: Send + Sync {
    /// Read a stored value.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the backing storage cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Store a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the backing storage cannot be written.
    fn store(&self, key: &str, value: &str) -> Result<(), SessionError>;
}

/// Process-local session store.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemorySessionStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Session store persisted as a flat JSON object in a file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store backed by `path`; the file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, SessionError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(source) => return Err(self.io_error(source)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| SessionError::Malformed {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.read_all()?.remove(key))
    }

    fn store(&self, key: &str, value: &str) -> Result<(), SessionError> {
        // A corrupt file is replaced rather than blocking every later write.
        let mut values = self.read_all().unwrap_or_default();
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let body = serde_json::to_string_pretty(&values).map_err(|source| {
            SessionError::Malformed {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        std::fs::write(&self.path, body).map_err(|source| self.io_error(source))
    }
}

/// Restore view parameters: an explicit non-empty location wins, then the
/// session mirror, then defaults. Unreadable sessions count as empty.
#[must_use]
pub fn restore(location: Option<&str>, session: &dyn SessionStore) -> ViewParams {
    if let Some(raw) = location
        && !raw.trim().trim_start_matches('?').is_empty()
    {
        return decode(raw);
    }
    match session.load(SESSION_KEY) {
        Ok(Some(stored)) => decode(&stored),
        Ok(None) => ViewParams::default(),
        Err(err) => {
            tracing::warn!(error = %err, "session view unreadable; using defaults");
            ViewParams::default()
        }
    }
}

/// Encode `params` and mirror the string into the session store.
///
/// # Errors
///
/// Returns [`SessionError`] when the store cannot be written.
pub fn persist(params: &ViewParams, session: &dyn SessionStore) -> Result<String, SessionError> {
    let encoded = encode(params);
    session.store(SESSION_KEY, &encoded)?;
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{SortMode, StatusFilter};

    #[test]
    fn defaults_encode_to_empty_string() {
        assert_eq!(encode(&ViewParams::default()), "");
        assert_eq!(decode(""), ViewParams::default());
        assert_eq!(decode("?"), ViewParams::default());
    }

    #[test]
    fn non_defaults_round_trip() {
        let params = ViewParams {
            search: "buy milk & eggs".into(),
            status: StatusFilter::Completed,
            sort: SortMode::Za,
            page: 3,
            page_size: PageSize::Fifty,
        };
        let encoded = encode(&params);
        assert_eq!(
            encoded,
            "q=buy%20milk%20%26%20eggs&status=completed&sort=za&page=3&ps=50"
        );
        assert_eq!(decode(&format!("?{encoded}")), params);
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let params = decode("?q=buy+milk&status=done&sort=&page=-2&ps=15&extra=1");
        assert_eq!(params.search, "buy milk");
        assert_eq!(params.status, StatusFilter::All);
        assert_eq!(params.sort, SortMode::ActiveFirst);
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, PageSize::Ten);

        assert_eq!(decode("q=%E0%A4%A").search, "");
    }

    #[test]
    fn restore_prefers_location_then_session() {
        let session = MemorySessionStore::new();
        assert_eq!(restore(None, &session), ViewParams::default());

        let stored = ViewParams {
            status: StatusFilter::Active,
            ..ViewParams::default()
        };
        assert_eq!(persist(&stored, &session).ok().as_deref(), Some("status=active"));
        assert_eq!(restore(None, &session), stored);
        assert_eq!(restore(Some("?"), &session), stored);
        assert_eq!(restore(Some("sort=az"), &session).sort, SortMode::Az);
        assert_eq!(restore(Some("sort=az"), &session).status, StatusFilter::All);
    }

    #[test]
    fn file_store_persists_across_instances() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("session.json");
        let store = FileSessionStore::new(&path);
        assert_eq!(store.load(SESSION_KEY)?, None);

        store.store(SESSION_KEY, "page=2")?;
        store.store("other", "value")?;

        let reopened = FileSessionStore::new(&path);
        assert_eq!(reopened.load(SESSION_KEY)?.as_deref(), Some("page=2"));
        assert_eq!(restore(None, &reopened).page, 2);
        Ok(())
    }

    #[test]
    fn corrupt_session_file_is_reported_then_replaced() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json")?;
        let store = FileSessionStore::new(&path);

        assert!(matches!(
            store.load(SESSION_KEY),
            Err(SessionError::Malformed { .. })
        ));
        assert_eq!(restore(None, &store), ViewParams::default());

        store.store(SESSION_KEY, "ps=20")?;
        assert_eq!(restore(None, &store).page_size, PageSize::Twenty);
        Ok(())
    }
}
