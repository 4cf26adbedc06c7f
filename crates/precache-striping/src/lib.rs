//! # Precache Striping
//!
//! Concurrent precaching for service workers.
//!
//! A precache registry installs its list one entry at a time. Striping splits
//! the list into buckets and gives each bucket its own follower registry, so
//! the buckets install side by side. A single leader registry keeps the union
//! of every follower's URL → cache-key mapping, cleans stale entries on
//! activation, and answers requests through the precache route.
//!
//! ## Features
//!
//! - **Bucket splitting**: balanced, contiguous, lazy ([`split_into_buckets`])
//! - **Striping coordinator**: leader/follower registries ([`PrecacheStriping`])
//! - **Precache route**: URL variations against the shared mapping
//! - **Manifests**: JSON precache manifests ([`PrecacheManifest`])
//! - **In-memory collaborators**: registry, scope and cache storage ([`memory`])
//!
//! ## Threading
//!
//! Everything here assumes the single-threaded cooperative scheduling of a
//! service-worker context. Shared state uses `Rc<RefCell<_>>` and futures are
//! `!Send`.
//!
//! ## Example
//!
//! ```no_run
//! use std::rc::Rc;
//! use precache_striping::memory::{MemoryRegistry, MemoryScope, StaticFetcher};
//! use precache_striping::{CacheItem, PrecacheStriping, StripingConfig};
//! use url::Url;
//!
//! # async fn run() -> precache_striping::Result<()> {
//! let location = Url::parse("https://example.com/sw.js").unwrap();
//! let scope = Rc::new(MemoryScope::new(location.clone()));
//! let fetcher = Rc::new(StaticFetcher::new().with_body("https://example.com/app.js", "..."));
//! let factory = MemoryRegistry::factory(location, scope.storage(), fetcher);
//!
//! let striping = PrecacheStriping::new(StripingConfig::default(), scope.clone(), factory)?;
//! let entries: Vec<CacheItem> = vec!["/app.js".into(), "/app.css".into()];
//! striping.precache_striping(&entries)?;
//!
//! scope.dispatch_install().await;
//! scope.dispatch_activate().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod item;
pub mod keys;
pub mod lifecycle;
pub mod memory;
pub mod registry;
pub mod route;
pub mod split;
pub mod striping;

pub use error::{RegistryError, Result, StripingError};
pub use item::{CacheItem, PrecacheEntry, PrecacheManifest};
pub use keys::{create_cache_key, CacheKey, KeyMapping, SharedKeyMapping};
pub use lifecycle::{EventListener, ExtendableEvent, LifecycleEventKind, ServiceWorkerScope};
pub use registry::{
    CachedResponse, CleanupResult, InstallResult, PrecachePlugin, PrecacheRegistry,
    RegistryOptions,
};
pub use route::{PrecacheRoute, Route, RouteOptions};
pub use split::{
    split_by_bucket_size, split_into_buckets, BucketSplitter, Buckets, SplitEntries,
    DEFAULT_BUCKET_COUNT,
};
pub use striping::{
    MergePolicy, PrecacheStriping, RouteBinding, StripingConfig, StripingSettings,
};
