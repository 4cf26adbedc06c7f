//! The precache registry seam.
//!
//! A registry owns a cache list, installs it into cache storage, and cleans
//! stale entries on activation. The coordinator only drives registries through
//! [`PrecacheRegistry`]; storage and fetch stay with the implementation.

use futures::future::LocalBoxFuture;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

use crate::error::{RegistryError, Result};
use crate::item::CacheItem;
use crate::keys::SharedKeyMapping;
use crate::lifecycle::ExtendableEvent;

/// Prefix of the default precache cache name.
pub const DEFAULT_CACHE_NAME_PREFIX: &str = "precache-v2";

/// A stored or fetched response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Response URL.
    pub url: String,

    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// Create a 200 response with the given body.
    pub fn ok(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::with_status(url, 200, body)
    }

    pub fn with_status(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Hooks applied around precache writes.
pub trait PrecachePlugin {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Inspect or replace a response before it is stored. Returning `None`
    /// skips caching it.
    fn cache_will_update(&self, _url: &str, response: CachedResponse) -> Option<CachedResponse> {
        Some(response)
    }
}

/// Construction options shared by the leader and every follower.
#[derive(Clone)]
pub struct RegistryOptions {
    /// Target cache name. `None` uses the default precache cache.
    pub cache_name: Option<String>,

    /// Plugins applied to every write.
    pub plugins: Vec<Rc<dyn PrecachePlugin>>,

    /// Serve from the network when a matched key is missing from the cache.
    /// On by default, so a listed entry that is not installed yet (or whose
    /// install failed) still loads.
    pub fallback_to_network: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            cache_name: None,
            plugins: Vec::new(),
            fallback_to_network: true,
        }
    }
}

impl RegistryOptions {
    pub fn with_cache_name(mut self, cache_name: impl Into<String>) -> Self {
        self.cache_name = Some(cache_name.into());
        self
    }

    pub fn with_plugin(mut self, plugin: Rc<dyn PrecachePlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_fallback_to_network(mut self, fallback: bool) -> Self {
        self.fallback_to_network = fallback;
        self
    }

    /// Resolve the cache name for a worker scope.
    pub fn resolved_cache_name(&self, scope: &str) -> String {
        match self.cache_name {
            Some(ref name) => name.clone(),
            None => format!("{DEFAULT_CACHE_NAME_PREFIX}-{scope}"),
        }
    }
}

impl fmt::Debug for RegistryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryOptions")
            .field("cache_name", &self.cache_name)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("fallback_to_network", &self.fallback_to_network)
            .finish()
    }
}

/// Outcome of a registry install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallResult {
    /// URLs fetched and written during this install.
    pub updated_urls: Vec<String>,
    /// URLs whose cache key was already present.
    pub not_updated_urls: Vec<String>,
}

/// Outcome of activation-time cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupResult {
    /// Cache keys removed because no registry claims them.
    pub deleted_cache_keys: Vec<String>,
}

/// Future returned by registry operations.
pub type RegistryFuture<T> = LocalBoxFuture<'static, std::result::Result<T, RegistryError>>;

/// A precache registry, as provided by the host caching framework.
///
/// Futures are `'static` and `!Send`: implementations clone what they need
/// out of the `Rc` receiver.
pub trait PrecacheRegistry {
    /// Add items to the pending cache list. Fails if a URL is already listed
    /// under a different cache key.
    fn add_to_cache_list(&mut self, items: &[CacheItem]) -> Result<()>;

    /// Fetch and store every listed item not yet cached.
    fn install(self: Rc<Self>, event: &ExtendableEvent) -> RegistryFuture<InstallResult>;

    /// Delete cached entries whose keys are absent from this registry's
    /// mapping.
    fn activate(self: Rc<Self>, event: &ExtendableEvent) -> RegistryFuture<CleanupResult>;

    /// Handle to this registry's live URL → cache-key mapping.
    fn urls_to_cache_keys(&self) -> SharedKeyMapping;

    /// Serve a matched request from cache.
    fn handle_request(
        self: Rc<Self>,
        cache_key: String,
        request_url: String,
    ) -> RegistryFuture<CachedResponse>;
}

/// Creates registries from resolved options.
pub type RegistryFactory<R> = Rc<dyn Fn(&RegistryOptions) -> R>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagger;

    impl PrecachePlugin for Tagger {
        fn name(&self) -> &str {
            "tagger"
        }
    }

    #[test]
    fn test_default_cache_name() {
        let options = RegistryOptions::default();
        assert_eq!(
            options.resolved_cache_name("https://example.com/"),
            "precache-v2-https://example.com/"
        );
        let named = options.with_cache_name("assets");
        assert_eq!(named.resolved_cache_name("ignored"), "assets");
    }

    #[test]
    fn test_plugin_passthrough_by_default() {
        let response = CachedResponse::ok("https://example.com/a", "body");
        assert_eq!(
            Tagger.cache_will_update("https://example.com/a", response.clone()),
            Some(response)
        );
    }

    #[test]
    fn test_options_debug_lists_plugins() {
        let options = RegistryOptions::default().with_plugin(Rc::new(Tagger));
        assert!(format!("{options:?}").contains("tagger"));
    }

    #[test]
    fn test_success_range() {
        assert!(CachedResponse::with_status("u", 204, "").is_success());
        assert!(!CachedResponse::with_status("u", 404, "").is_success());
        assert!(!CachedResponse::with_status("u", 0, "").is_success());
    }
}
