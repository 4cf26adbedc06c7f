//! Cache-key bookkeeping.
//!
//! Every registry owns a URL → cache-key mapping. The coordinator aliases the
//! leader's mapping and copies each follower's mapping into it, so the leader
//! sees every key any follower installs.
//!
//! # Threading
//!
//! [`SharedKeyMapping`] is an `Rc<RefCell<_>>` handle. It assumes the
//! single-threaded cooperative scheduling of a service-worker context: all
//! handlers run on one thread and never hold a borrow across an `.await`.
//! A port to a multi-threaded host must swap it for a synchronised map.

use hashbrown::{HashMap, HashSet};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{trace, warn};
use url::Url;

use crate::error::{Result, StripingError};
use crate::item::CacheItem;

/// Query parameter carrying the revision in a generated cache key.
pub const REVISION_SEARCH_PARAM: &str = "__WB_REVISION__";

/// Mapping from absolute URL to cache-storage key.
pub type KeyMapping = HashMap<String, String>;

/// A resolved URL together with the key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub url: String,
    pub cache_key: String,
}

/// Compute the cache key for an item relative to the worker's base URL.
///
/// Unrevisioned items are keyed by their absolute URL. Revisioned items get
/// the revision appended as [`REVISION_SEARCH_PARAM`], replacing any existing
/// value of that parameter.
pub fn create_cache_key(item: &CacheItem, base_url: &Url) -> Result<CacheKey> {
    let mut url = base_url
        .join(item.url())
        .map_err(|e| StripingError::invalid_url(item.url(), e))?;
    url.set_fragment(None);

    let Some(revision) = item.revision() else {
        let href = url.to_string();
        return Ok(CacheKey {
            url: href.clone(),
            cache_key: href,
        });
    };

    let mut key_url = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != REVISION_SEARCH_PARAM)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    key_url
        .query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair(REVISION_SEARCH_PARAM, revision);

    Ok(CacheKey {
        url: url.to_string(),
        cache_key: key_url.to_string(),
    })
}

/// Shared, interior-mutable handle to a [`KeyMapping`].
///
/// Clones alias the same map.
#[derive(Debug, Clone, Default)]
pub struct SharedKeyMapping(Rc<RefCell<KeyMapping>>);

impl SharedKeyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the cache key for an absolute URL.
    pub fn get(&self, url: &str) -> Option<String> {
        self.0.borrow().get(url).cloned()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.0.borrow().contains_key(url)
    }

    /// Insert a mapping, returning the previous key for that URL.
    pub fn insert(&self, url: impl Into<String>, cache_key: impl Into<String>) -> Option<String> {
        self.0.borrow_mut().insert(url.into(), cache_key.into())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Owned copy of the current contents.
    pub fn snapshot(&self) -> KeyMapping {
        self.0.borrow().clone()
    }

    /// Set of all cache keys currently mapped.
    pub fn cache_keys(&self) -> HashSet<String> {
        self.0.borrow().values().cloned().collect()
    }

    /// Whether both handles alias the same map.
    pub fn ptr_eq(&self, other: &SharedKeyMapping) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Copy every entry of `other` into this map.
    ///
    /// Returns the number of URLs that were not present before. A URL already
    /// mapped to a different key is overwritten (last writer wins).
    pub fn merge_from(&self, other: &SharedKeyMapping) -> usize {
        if self.ptr_eq(other) {
            return 0;
        }

        let incoming = other.snapshot();
        let mut map = self.0.borrow_mut();
        let mut added = 0;
        for (url, cache_key) in incoming {
            match map.insert(url.clone(), cache_key.clone()) {
                None => added += 1,
                Some(previous) if previous != cache_key => {
                    warn!(%url, %previous, %cache_key, "Shared cache key overwritten");
                }
                Some(_) => {}
            }
        }
        trace!(added, total = map.len(), "Merged key mapping");
        added
    }
}

impl From<KeyMapping> for SharedKeyMapping {
    fn from(map: KeyMapping) -> Self {
        Self(Rc::new(RefCell::new(map)))
    }
}
