//! Precache items and manifests.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A structured precache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecacheEntry {
    /// Asset URL, absolute or relative to the worker location.
    pub url: String,

    /// Content revision. `None` means the URL itself is versioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// Subresource integrity metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

/// An asset to precache: a bare URL or a structured entry.
///
/// Identity is the URL; the revision disambiguates content versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheItem {
    Url(String),
    Entry(PrecacheEntry),
}

impl CacheItem {
    /// Build a structured item with a revision.
    pub fn revisioned(url: impl Into<String>, revision: impl Into<String>) -> Self {
        Self::Entry(PrecacheEntry {
            url: url.into(),
            revision: Some(revision.into()),
            integrity: None,
        })
    }

    pub fn url(&self) -> &str {
        match self {
            CacheItem::Url(url) => url,
            CacheItem::Entry(entry) => &entry.url,
        }
    }

    pub fn revision(&self) -> Option<&str> {
        match self {
            CacheItem::Url(_) => None,
            CacheItem::Entry(entry) => entry.revision.as_deref(),
        }
    }

    pub fn integrity(&self) -> Option<&str> {
        match self {
            CacheItem::Url(_) => None,
            CacheItem::Entry(entry) => entry.integrity.as_deref(),
        }
    }
}

impl From<&str> for CacheItem {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for CacheItem {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<PrecacheEntry> for CacheItem {
    fn from(entry: PrecacheEntry) -> Self {
        Self::Entry(entry)
    }
}

/// An ordered list of precache items, as emitted by build tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrecacheManifest {
    pub entries: Vec<CacheItem>,
}

impl PrecacheManifest {
    /// Parse a JSON array of strings and `{url, revision?, integrity?}` objects.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<CacheItem> {
        self.entries
    }
}

impl FromIterator<CacheItem> for PrecacheManifest {
    fn from_iter<I: IntoIterator<Item = CacheItem>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
