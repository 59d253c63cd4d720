//! Item model shared by the cache, controller and remote client.

use std::fmt::{self, Display, Formatter};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Prefix marking identifiers minted locally before the server confirms them.
pub const PENDING_PREFIX: &str = "tmp-";

/// Item identifier: either assigned by the server or a local placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    /// Server-assigned identifier, kept in its textual form.
    Persisted(String),
    /// Local token for an item whose creation is still in flight.
    Pending(Uuid),
}

impl Identifier {
    /// Mint a fresh pending identifier.
    #[must_use]
    pub fn pending() -> Self {
        Self::Pending(Uuid::new_v4())
    }

    /// Whether the server has confirmed this identifier.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted(_))
    }

    /// Normalized string key used by selection and pending-delete bookkeeping.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Parse a key produced by [`Identifier::key`] (or typed by a user).
    ///
    /// Returns `None` for blank input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(token) = trimmed.strip_prefix(PENDING_PREFIX)
            && let Ok(uuid) = Uuid::parse_str(token)
        {
            return Some(Self::Pending(uuid));
        }
        Some(Self::Persisted(trimmed.to_string()))
    }
}

impl Display for Identifier {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persisted(id) => formatter.write_str(id),
            Self::Pending(token) => write!(formatter, "{PENDING_PREFIX}{token}"),
        }
    }
}

impl From<u64> for Identifier {
    fn from(value: u64) -> Self {
        Self::Persisted(value.to_string())
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|| Self::Persisted(String::new()))
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Persisted(id) => match id.parse::<u64>() {
                Ok(number) => serializer.serialize_u64(number),
                Err(_) => serializer.serialize_str(id),
            },
            Self::Pending(_) => serializer.collect_str(self),
        }
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdentifierVisitor;

        impl Visitor<'_> for IdentifierVisitor {
            type Value = Identifier;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("a numeric or string identifier")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Identifier, E> {
                Ok(Identifier::from(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Identifier, E> {
                Ok(Identifier::Persisted(value.to_string()))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Identifier, E> {
                Identifier::parse(value).ok_or_else(|| E::custom("identifier must not be empty"))
            }
        }

        deserializer.deserialize_any(IdentifierVisitor)
    }
}

/// A single todo item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Identifier, unique within the collection.
    pub id: Identifier,
    /// Display title.
    pub title: String,
    /// Completion flag.
    #[serde(default)]
    pub completed: bool,
}

impl Item {
    /// Build an item.
    #[must_use]
    pub fn new(id: impl Into<Identifier>, title: impl Into<String>, completed: bool) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            completed,
        }
    }

    /// Placeholder shown while a create is in flight.
    #[must_use]
    pub fn placeholder(title: impl Into<String>) -> Self {
        Self {
            id: Identifier::pending(),
            title: title.into(),
            completed: false,
        }
    }

    /// Normalized key of this item's identifier.
    #[must_use]
    pub fn key(&self) -> String {
        self.id.key()
    }

    /// Copy of this item with `patch` applied.
    #[must_use]
    pub fn with_patch(&self, patch: &ItemPatch) -> Self {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title.clone_from(title);
        }
        if let Some(completed) = patch.completed {
            next.completed = completed;
        }
        next
    }
}

/// Partial update sent with `PATCH`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    /// Replacement title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Replacement completion flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl ItemPatch {
    /// Patch that only sets the completion flag.
    #[must_use]
    pub const fn completed(completed: bool) -> Self {
        Self {
            title: None,
            completed: Some(completed),
        }
    }

    /// Patch that only sets the title.
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            completed: None,
        }
    }
}

/// Body sent with `POST` when creating an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    /// Title of the new item.
    pub title: String,
    /// Always `false` for new items.
    pub completed: bool,
}

impl NewItem {
    /// Request body for a fresh, incomplete item.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
        }
    }
}
