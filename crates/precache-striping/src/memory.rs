//! In-memory collaborators.
//!
//! A cache storage, a fetcher, a registry and a worker scope that satisfy the
//! coordinator's seams without a browser. Used by tests and by embedders
//! that keep precached assets in process memory.
//!
//! These stand in for the host's cache storage, fetch and lifecycle. They
//! implement only what the coordinator observes: no eviction, no quota, no
//! request headers.
//!
//! ## Architecture
//!
//! ```text
//! MemoryScope (worker global)
//!     ├── install / activate listeners
//!     ├── routes
//!     └── CacheStorage
//!             └── Cache (cache key → CachedResponse)
//!
//! MemoryRegistry ──fetch──▶ Fetcher
//!     └── writes into CacheStorage under its cache name
//! ```

use futures::future::{join_all, poll_fn};
use futures::FutureExt;
use hashbrown::{HashMap, HashSet};
use std::cell::RefCell;
use std::rc::Rc;
use std::task::Poll;
use tracing::{debug, trace};
use url::Url;

use crate::error::{RegistryError, Result, StripingError};
use crate::item::CacheItem;
use crate::keys::{create_cache_key, SharedKeyMapping};
use crate::lifecycle::{EventListener, ExtendableEvent, LifecycleEventKind, ServiceWorkerScope};
use crate::registry::{
    CachedResponse, CleanupResult, InstallResult, PrecacheRegistry, RegistryFuture,
    RegistryOptions,
};
use crate::route::{Route, RouteResponse};

// ==================== Cache ====================

/// A named cache of responses keyed by cache key.
#[derive(Debug, Default)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    entries: HashMap<String, CachedResponse>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    pub fn match_key(&self, cache_key: &str) -> Option<&CachedResponse> {
        self.entries.get(cache_key)
    }

    pub fn contains(&self, cache_key: &str) -> bool {
        self.entries.contains_key(cache_key)
    }

    pub fn put(&mut self, cache_key: &str, response: CachedResponse) {
        self.entries.insert(cache_key.to_string(), response);
    }

    pub fn delete(&mut self, cache_key: &str) -> bool {
        self.entries.remove(cache_key).is_some()
    }

    /// All stored cache keys.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==================== Cache Storage ====================

/// Named caches (the `caches` global).
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cache, creating it if missing.
    pub fn open(&mut self, name: &str) -> &mut Cache {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// All cache names.
    pub fn keys(&self) -> Vec<&str> {
        self.caches.keys().map(|s| s.as_str()).collect()
    }
}

/// Shared handle to a [`CacheStorage`].
pub type SharedCacheStorage = Rc<RefCell<CacheStorage>>;

// ==================== Fetch ====================

/// Network access used by [`MemoryRegistry`].
pub trait Fetcher {
    /// Fetch `url`. When `integrity` is set, the response must match it.
    fn fetch(&self, url: &str, integrity: Option<&str>) -> RegistryFuture<CachedResponse>;
}

/// Yield to the executor once, waking immediately.
async fn yield_now() {
    let mut yielded = false;
    poll_fn(move |cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await
}

/// Serves a fixed table of responses; unknown URLs fail as network errors.
///
/// Responses registered with [`with_integrity`](Self::with_integrity) fail
/// requests carrying different integrity metadata.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: RefCell<HashMap<String, CachedResponse>>,
    integrities: RefCell<HashMap<String, String>>,
    requests: RefCell<Vec<(String, Option<String>)>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response, returning `self` for chaining.
    pub fn with_response(self, response: CachedResponse) -> Self {
        self.insert(response);
        self
    }

    /// Register a 200 response with `body` for `url`.
    pub fn with_body(self, url: &str, body: &str) -> Self {
        self.with_response(CachedResponse::ok(url, body))
    }

    /// Declare the integrity metadata `url`'s response satisfies.
    pub fn with_integrity(self, url: &str, integrity: &str) -> Self {
        self.integrities
            .borrow_mut()
            .insert(url.to_string(), integrity.to_string());
        self
    }

    pub fn insert(&self, response: CachedResponse) {
        self.responses
            .borrow_mut()
            .insert(response.url.clone(), response);
    }

    pub fn remove(&self, url: &str) -> Option<CachedResponse> {
        self.responses.borrow_mut().remove(url)
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Integrity metadata sent with the latest request for `url`.
    pub fn requested_integrity(&self, url: &str) -> Option<String> {
        self.requests
            .borrow()
            .iter()
            .rev()
            .find(|(requested, _)| requested == url)
            .and_then(|(_, integrity)| integrity.clone())
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, url: &str, integrity: Option<&str>) -> RegistryFuture<CachedResponse> {
        self.requests
            .borrow_mut()
            .push((url.to_string(), integrity.map(str::to_string)));

        let mismatch = match (integrity, self.integrities.borrow().get(url)) {
            (Some(requested), Some(actual)) => requested != actual.as_str(),
            _ => false,
        };
        let result = if mismatch {
            Err(RegistryError::network(url, "integrity check failed"))
        } else {
            self.responses
                .borrow()
                .get(url)
                .cloned()
                .ok_or_else(|| RegistryError::network(url, "no route to host"))
        };
        async move {
            // Suspend once so concurrent installs interleave.
            yield_now().await;
            result
        }
        .boxed_local()
    }
}

// ==================== Registry ====================

/// A [`PrecacheRegistry`] writing into a [`CacheStorage`].
///
/// All registries built with the same options share one named cache, so a
/// leader's cleanup sees what its followers wrote.
pub struct MemoryRegistry {
    base_url: Url,
    cache_name: String,
    options: RegistryOptions,
    storage: SharedCacheStorage,
    fetcher: Rc<dyn Fetcher>,
    urls_to_cache_keys: SharedKeyMapping,
    cache_keys_to_integrities: HashMap<String, String>,
}

impl MemoryRegistry {
    pub fn new(
        base_url: Url,
        options: RegistryOptions,
        storage: SharedCacheStorage,
        fetcher: Rc<dyn Fetcher>,
    ) -> Self {
        let scope = base_url.origin().ascii_serialization();
        let cache_name = options.resolved_cache_name(&scope);
        Self {
            base_url,
            cache_name,
            options,
            storage,
            fetcher,
            urls_to_cache_keys: SharedKeyMapping::new(),
            cache_keys_to_integrities: HashMap::new(),
        }
    }

    /// Factory producing registries that share `storage` and `fetcher`.
    pub fn factory(
        base_url: Url,
        storage: SharedCacheStorage,
        fetcher: Rc<dyn Fetcher>,
    ) -> impl Fn(&RegistryOptions) -> MemoryRegistry {
        move |options: &RegistryOptions| {
            MemoryRegistry::new(
                base_url.clone(),
                options.clone(),
                storage.clone(),
                fetcher.clone(),
            )
        }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Cache key for an absolute or relative URL, if listed.
    pub fn cache_key_for_url(&self, url: &str) -> Option<String> {
        let absolute = self.base_url.join(url).ok()?;
        self.urls_to_cache_keys.get(absolute.as_str())
    }
}

impl PrecacheRegistry for MemoryRegistry {
    fn add_to_cache_list(&mut self, items: &[CacheItem]) -> Result<()> {
        for item in items {
            let key = create_cache_key(item, &self.base_url)?;
            if let Some(existing) = self.urls_to_cache_keys.get(&key.url) {
                if existing != key.cache_key {
                    return Err(StripingError::ConflictingEntries {
                        url: key.url,
                        existing,
                        incoming: key.cache_key,
                    });
                }
            }
            if let Some(integrity) = item.integrity() {
                let recorded = self.cache_keys_to_integrities.get(&key.cache_key).cloned();
                match recorded {
                    Some(existing) if existing != integrity => {
                        return Err(StripingError::ConflictingIntegrity {
                            cache_key: key.cache_key,
                            existing,
                            incoming: integrity.to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        self.cache_keys_to_integrities
                            .insert(key.cache_key.clone(), integrity.to_string());
                    }
                }
            }
            trace!(url = %key.url, cache_key = %key.cache_key, "Added to cache list");
            self.urls_to_cache_keys.insert(key.url, key.cache_key);
        }
        Ok(())
    }

    fn install(self: Rc<Self>, _event: &ExtendableEvent) -> RegistryFuture<InstallResult> {
        async move {
            let mut result = InstallResult::default();
            // Sequential on purpose: concurrency comes from running several
            // registries side by side.
            for (url, cache_key) in self.urls_to_cache_keys.snapshot() {
                let cached = self
                    .storage
                    .borrow()
                    .get(&self.cache_name)
                    .is_some_and(|cache| cache.contains(&cache_key));
                if cached {
                    result.not_updated_urls.push(url);
                    continue;
                }

                let integrity = self.cache_keys_to_integrities.get(&cache_key).cloned();
                let response = self.fetcher.fetch(&url, integrity.as_deref()).await?;
                if !response.is_success() {
                    return Err(RegistryError::BadResponse {
                        url,
                        status: response.status,
                    });
                }

                let response = self
                    .options
                    .plugins
                    .iter()
                    .try_fold(response, |response, plugin| {
                        plugin.cache_will_update(&url, response)
                    });
                let Some(response) = response else {
                    debug!(%url, "Plugin declined to cache response");
                    continue;
                };

                self.storage
                    .borrow_mut()
                    .open(&self.cache_name)
                    .put(&cache_key, response);
                result.updated_urls.push(url);
            }
            Ok(result)
        }
        .boxed_local()
    }

    fn activate(self: Rc<Self>, _event: &ExtendableEvent) -> RegistryFuture<CleanupResult> {
        async move {
            let expected: HashSet<String> = self.urls_to_cache_keys.cache_keys();
            let mut storage = self.storage.borrow_mut();
            let cache = storage.open(&self.cache_name);

            let stale: Vec<String> = cache
                .keys()
                .into_iter()
                .filter(|key| !expected.contains(*key))
                .map(str::to_string)
                .collect();
            for key in &stale {
                cache.delete(key);
            }

            Ok(CleanupResult {
                deleted_cache_keys: stale,
            })
        }
        .boxed_local()
    }

    fn urls_to_cache_keys(&self) -> SharedKeyMapping {
        self.urls_to_cache_keys.clone()
    }

    fn handle_request(
        self: Rc<Self>,
        cache_key: String,
        request_url: String,
    ) -> RegistryFuture<CachedResponse> {
        async move {
            let cached = self
                .storage
                .borrow()
                .get(&self.cache_name)
                .and_then(|cache| cache.match_key(&cache_key))
                .cloned();
            match cached {
                Some(response) => Ok(response),
                None if self.options.fallback_to_network => {
                    trace!(%request_url, "Precache miss, falling back to network");
                    self.fetcher.fetch(&request_url, None).await
                }
                None => Err(RegistryError::Storage(format!(
                    "missing precached response for {cache_key}"
                ))),
            }
        }
        .boxed_local()
    }
}

// ==================== Scope ====================

/// One result per `wait_until` future, in registration order.
pub type DispatchResults = Vec<std::result::Result<(), RegistryError>>;

/// A single-threaded worker scope with manual event dispatch.
pub struct MemoryScope {
    location: Url,
    listeners: RefCell<Vec<(LifecycleEventKind, EventListener)>>,
    routes: RefCell<Vec<Rc<dyn Route>>>,
    storage: SharedCacheStorage,
}

impl MemoryScope {
    pub fn new(location: Url) -> Self {
        Self {
            location,
            listeners: RefCell::new(Vec::new()),
            routes: RefCell::new(Vec::new()),
            storage: Rc::new(RefCell::new(CacheStorage::new())),
        }
    }

    /// Cache storage backing this scope.
    pub fn storage(&self) -> SharedCacheStorage {
        self.storage.clone()
    }

    pub fn listener_count(&self, kind: LifecycleEventKind) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn route_count(&self) -> usize {
        self.routes.borrow().len()
    }

    /// Fire `kind` and wait for every registered `wait_until` future.
    /// The futures run concurrently.
    pub async fn dispatch(&self, kind: LifecycleEventKind) -> DispatchResults {
        let listeners: Vec<EventListener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, listener)| listener.clone())
            .collect();

        let event = ExtendableEvent::new(kind);
        for listener in &listeners {
            listener(&event);
        }
        debug!(
            event = kind.as_str(),
            listeners = listeners.len(),
            pending = event.pending_count(),
            "Dispatched lifecycle event"
        );

        join_all(event.take_pending()).await
    }

    pub async fn dispatch_install(&self) -> DispatchResults {
        self.dispatch(LifecycleEventKind::Install).await
    }

    pub async fn dispatch_activate(&self) -> DispatchResults {
        self.dispatch(LifecycleEventKind::Activate).await
    }

    /// Route a request. `None` when no registered route matches.
    pub async fn respond(
        &self,
        request_url: &Url,
    ) -> Option<std::result::Result<CachedResponse, RegistryError>> {
        let response: RouteResponse = self
            .routes
            .borrow()
            .iter()
            .find_map(|route| route.handle(request_url))?;
        Some(response.await)
    }
}

impl ServiceWorkerScope for MemoryScope {
    fn location(&self) -> Url {
        self.location.clone()
    }

    fn add_event_listener(&self, kind: LifecycleEventKind, listener: EventListener) {
        trace!(event = kind.as_str(), "Event listener added");
        self.listeners.borrow_mut().push((kind, listener));
    }

    fn register_route(&self, route: Rc<dyn Route>) {
        self.routes.borrow_mut().push(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::PrecacheEntry;
    use crate::registry::PrecachePlugin;

    fn base() -> Url {
        Url::parse("https://example.com/sw.js").unwrap()
    }

    fn registry(fetcher: StaticFetcher) -> (MemoryRegistry, SharedCacheStorage) {
        let storage: SharedCacheStorage = Rc::new(RefCell::new(CacheStorage::new()));
        let registry = MemoryRegistry::new(
            base(),
            RegistryOptions::default().with_cache_name("test"),
            storage.clone(),
            Rc::new(fetcher),
        );
        (registry, storage)
    }

    fn install_event() -> ExtendableEvent {
        ExtendableEvent::new(LifecycleEventKind::Install)
    }

    #[test]
    fn test_cache() {
        let mut cache = Cache::new("v1");
        cache.put("https://example.com/style.css", CachedResponse::ok("u", "a"));

        assert!(cache.match_key("https://example.com/style.css").is_some());
        assert!(cache.match_key("https://example.com/other.css").is_none());
        assert!(cache.delete("https://example.com/style.css"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_storage() {
        let mut storage = CacheStorage::new();
        assert!(!storage.has("v1"));

        storage.open("v1");
        assert!(storage.has("v1"));
        assert_eq!(storage.keys(), vec!["v1"]);

        assert!(storage.delete("v1"));
        assert!(!storage.has("v1"));
    }

    #[test]
    fn test_default_cache_name_uses_origin() {
        let storage: SharedCacheStorage = Rc::new(RefCell::new(CacheStorage::new()));
        let registry = MemoryRegistry::new(
            base(),
            RegistryOptions::default(),
            storage,
            Rc::new(StaticFetcher::new()),
        );
        assert_eq!(registry.cache_name(), "precache-v2-https://example.com");
    }

    #[test]
    fn test_conflicting_entries_rejected() {
        let (mut registry, _) = registry(StaticFetcher::new());
        registry
            .add_to_cache_list(&[CacheItem::revisioned("/index.html", "1")])
            .unwrap();
        registry
            .add_to_cache_list(&[CacheItem::revisioned("/index.html", "1")])
            .unwrap();

        let err = registry
            .add_to_cache_list(&[CacheItem::revisioned("/index.html", "2")])
            .unwrap_err();
        assert!(matches!(err, StripingError::ConflictingEntries { .. }));
        assert_eq!(
            registry.cache_key_for_url("/index.html").as_deref(),
            Some("https://example.com/index.html?__WB_REVISION__=1")
        );
    }

    #[tokio::test]
    async fn test_install_skips_cached_keys() {
        let fetcher = StaticFetcher::new()
            .with_body("https://example.com/a.js", "a")
            .with_body("https://example.com/b.js", "b");
        let (mut registry, storage) = registry(fetcher);
        registry
            .add_to_cache_list(&[CacheItem::from("/a.js"), CacheItem::from("/b.js")])
            .unwrap();
        storage
            .borrow_mut()
            .open("test")
            .put("https://example.com/a.js", CachedResponse::ok("x", "old"));

        let registry = Rc::new(registry);
        let result = registry.clone().install(&install_event()).await.unwrap();

        assert_eq!(result.updated_urls, vec!["https://example.com/b.js"]);
        assert_eq!(result.not_updated_urls, vec!["https://example.com/a.js"]);
        assert_eq!(storage.borrow().get("test").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_install_rejects_bad_status() {
        let fetcher = StaticFetcher::new().with_response(CachedResponse::with_status(
            "https://example.com/missing.js",
            404,
            "",
        ));
        let (mut registry, storage) = registry(fetcher);
        registry
            .add_to_cache_list(&[CacheItem::from("/missing.js")])
            .unwrap();

        let err = Rc::new(registry).install(&install_event()).await.unwrap_err();
        assert_eq!(
            err,
            RegistryError::BadResponse {
                url: "https://example.com/missing.js".to_string(),
                status: 404
            }
        );
        assert!(storage.borrow().get("test").is_none());
    }

    #[tokio::test]
    async fn test_plugin_can_skip_caching() {
        struct SkipEverything;
        impl PrecachePlugin for SkipEverything {
            fn name(&self) -> &str {
                "skip"
            }
            fn cache_will_update(
                &self,
                _url: &str,
                _response: CachedResponse,
            ) -> Option<CachedResponse> {
                None
            }
        }

        let storage: SharedCacheStorage = Rc::new(RefCell::new(CacheStorage::new()));
        let mut registry = MemoryRegistry::new(
            base(),
            RegistryOptions::default()
                .with_cache_name("test")
                .with_plugin(Rc::new(SkipEverything)),
            storage.clone(),
            Rc::new(StaticFetcher::new().with_body("https://example.com/a.js", "a")),
        );
        registry.add_to_cache_list(&[CacheItem::from("/a.js")]).unwrap();

        let result = Rc::new(registry).install(&install_event()).await.unwrap();
        assert!(result.updated_urls.is_empty());
        assert!(storage.borrow().get("test").is_none());
    }

    #[tokio::test]
    async fn test_activate_deletes_unlisted_keys() {
        let (mut registry, storage) = registry(StaticFetcher::new());
        registry
            .add_to_cache_list(&[CacheItem::from("/keep.js")])
            .unwrap();
        {
            let mut storage = storage.borrow_mut();
            let cache = storage.open("test");
            cache.put("https://example.com/keep.js", CachedResponse::ok("k", "k"));
            cache.put("https://example.com/stale.js", CachedResponse::ok("s", "s"));
        }

        let event = ExtendableEvent::new(LifecycleEventKind::Activate);
        let result = Rc::new(registry).activate(&event).await.unwrap();

        assert_eq!(result.deleted_cache_keys, vec!["https://example.com/stale.js"]);
        assert_eq!(
            storage.borrow().get("test").unwrap().keys(),
            vec!["https://example.com/keep.js"]
        );
    }

    #[tokio::test]
    async fn test_handle_request_network_fallback() {
        let storage: SharedCacheStorage = Rc::new(RefCell::new(CacheStorage::new()));
        let fetcher = Rc::new(StaticFetcher::new().with_body("https://example.com/a.js", "net"));
        let registry = Rc::new(MemoryRegistry::new(
            base(),
            RegistryOptions::default(),
            storage,
            fetcher.clone(),
        ));

        let response = registry
            .clone()
            .handle_request(
                "https://example.com/a.js".to_string(),
                "https://example.com/a.js".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(response.body, b"net");
        assert_eq!(fetcher.requests(), vec!["https://example.com/a.js"]);
    }

    #[tokio::test]
    async fn test_handle_request_without_fallback() {
        let storage: SharedCacheStorage = Rc::new(RefCell::new(CacheStorage::new()));
        let fetcher = Rc::new(StaticFetcher::new().with_body("https://example.com/a.js", "net"));
        let registry = Rc::new(MemoryRegistry::new(
            base(),
            RegistryOptions::default().with_fallback_to_network(false),
            storage,
            fetcher.clone(),
        ));

        let err = registry
            .handle_request(
                "https://example.com/a.js".to_string(),
                "https://example.com/a.js".to_string(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Storage(_)));
        assert!(fetcher.requests().is_empty());
    }

    fn with_integrity(url: &str, integrity: &str) -> CacheItem {
        CacheItem::from(PrecacheEntry {
            url: url.to_string(),
            revision: None,
            integrity: Some(integrity.to_string()),
        })
    }

    #[test]
    fn test_conflicting_integrity_rejected() {
        let (mut registry, _) = registry(StaticFetcher::new());
        registry
            .add_to_cache_list(&[with_integrity("/a.js", "sha256-one")])
            .unwrap();
        registry
            .add_to_cache_list(&[with_integrity("/a.js", "sha256-one"), CacheItem::from("/a.js")])
            .unwrap();

        let err = registry
            .add_to_cache_list(&[with_integrity("/a.js", "sha256-two")])
            .unwrap_err();
        assert!(matches!(
            err,
            StripingError::ConflictingIntegrity { ref existing, .. } if existing == "sha256-one"
        ));
    }

    #[tokio::test]
    async fn test_install_sends_integrity() {
        let fetcher = Rc::new(
            StaticFetcher::new()
                .with_body("https://example.com/a.js", "a")
                .with_integrity("https://example.com/a.js", "sha256-good")
                .with_body("https://example.com/b.js", "b")
                .with_integrity("https://example.com/b.js", "sha256-good"),
        );
        let storage: SharedCacheStorage = Rc::new(RefCell::new(CacheStorage::new()));
        let factory = MemoryRegistry::factory(base(), storage.clone(), fetcher.clone());

        let mut good = factory(&RegistryOptions::default());
        good.add_to_cache_list(&[with_integrity("/a.js", "sha256-good")])
            .unwrap();
        Rc::new(good).install(&install_event()).await.unwrap();
        assert_eq!(
            fetcher.requested_integrity("https://example.com/a.js").as_deref(),
            Some("sha256-good")
        );

        let mut tampered = factory(&RegistryOptions::default());
        tampered
            .add_to_cache_list(&[with_integrity("/b.js", "sha256-bad")])
            .unwrap();
        let err = Rc::new(tampered)
            .install(&install_event())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Network { .. }));
        assert_eq!(storage.borrow().get(&registry_cache_name()).unwrap().len(), 1);
    }

    fn registry_cache_name() -> String {
        RegistryOptions::default().resolved_cache_name("https://example.com")
    }

    #[tokio::test]
    async fn test_scope_dispatch_collects_results() {
        let scope = MemoryScope::new(base());
        scope.add_event_listener(
            LifecycleEventKind::Install,
            Rc::new(|event: &ExtendableEvent| {
                event.wait_until(async { Ok(()) }.boxed_local());
            }),
        );
        scope.add_event_listener(
            LifecycleEventKind::Install,
            Rc::new(|event: &ExtendableEvent| {
                event.wait_until(
                    async { Err(RegistryError::Storage("quota".into())) }.boxed_local(),
                );
            }),
        );

        assert_eq!(scope.listener_count(LifecycleEventKind::Install), 2);
        assert!(scope.dispatch_activate().await.is_empty());

        let results = scope.dispatch_install().await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[tokio::test]
    async fn test_scope_without_routes() {
        let scope = MemoryScope::new(base());
        let url = Url::parse("https://example.com/a.js").unwrap();
        assert!(scope.respond(&url).await.is_none());
        assert_eq!(scope.route_count(), 0);
    }
}
