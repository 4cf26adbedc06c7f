//! The striping coordinator.
//!
//! One leader registry owns the authoritative URL → cache-key mapping and
//! serves requests; one follower registry per bucket performs the actual
//! install. Followers' mappings are merged into the leader's, so the leader's
//! activation cleanup keeps everything any follower installs.
//!
//! ```text
//! entries ──split──▶ [bucket 0] [bucket 1] ... [bucket n]
//!                        │          │              │
//!                    follower 0  follower 1 ... follower n   (install)
//!                        └──────────┴──── merge ───┘
//!                                   ▼
//!                        leader key mapping (shared)
//!                           │               │
//!                      activate cleanup   precache route
//! ```

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, StripingError};
use crate::item::CacheItem;
use crate::keys::SharedKeyMapping;
use crate::lifecycle::{ExtendableEvent, LifecycleEventKind, PendingWork, ServiceWorkerScope};
use crate::registry::{PrecacheRegistry, RegistryFactory, RegistryOptions};
use crate::route::{PrecacheRoute, RouteOptions};
use crate::split::{split_by_bucket_size, SplitEntries, DEFAULT_BUCKET_COUNT};

/// Resolves route options when the route is bound.
pub type RouteOptionResolver = Rc<dyn Fn() -> Option<RouteOptions>>;

/// Resolves registry construction options when the leader is created.
pub type RegistryOptionResolver = Rc<dyn Fn() -> RegistryOptions>;

/// When a follower's key mapping is copied into the shared mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Synchronously inside `precache`, before any install work starts.
    /// Activation cleanup can never delete a key a follower is installing.
    #[default]
    BeforeInstall,
    /// After the follower's install succeeds. Failed followers contribute
    /// nothing, but cleanup may run before a slow follower merges.
    AfterInstall,
}

/// When the leader's precache route is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteBinding {
    #[default]
    AtConstruction,
    /// On the first activation, after cleanup is scheduled.
    OnActivate,
}

/// Serializable coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripingSettings {
    /// Buckets used by `precache_striping`.
    pub bucket_count: usize,
    pub merge_policy: MergePolicy,
    pub route_binding: RouteBinding,
}

impl Default for StripingSettings {
    fn default() -> Self {
        Self {
            bucket_count: DEFAULT_BUCKET_COUNT,
            merge_policy: MergePolicy::default(),
            route_binding: RouteBinding::default(),
        }
    }
}

impl StripingSettings {
    /// Parse and validate settings from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| StripingError::Settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket_count == 0 {
            return Err(StripingError::InvalidBucketCount(self.bucket_count));
        }
        Ok(())
    }
}

/// Coordinator configuration: injected capabilities plus settings.
#[derive(Clone, Default)]
pub struct StripingConfig {
    /// Route options, resolved at bind time. `None` uses route defaults.
    pub option_resolver: Option<RouteOptionResolver>,
    /// Registry options, resolved once when the leader is created.
    pub controller_option_resolver: Option<RegistryOptionResolver>,
    /// Replaces the default bucket splitter.
    pub split_entries: Option<Rc<dyn SplitEntries>>,
    pub settings: StripingSettings,
}

impl StripingConfig {
    pub fn with_option_resolver(
        mut self,
        resolver: impl Fn() -> Option<RouteOptions> + 'static,
    ) -> Self {
        self.option_resolver = Some(Rc::new(resolver));
        self
    }

    pub fn with_controller_option_resolver(
        mut self,
        resolver: impl Fn() -> RegistryOptions + 'static,
    ) -> Self {
        self.controller_option_resolver = Some(Rc::new(resolver));
        self
    }

    pub fn with_split_entries(mut self, splitter: impl SplitEntries + 'static) -> Self {
        self.split_entries = Some(Rc::new(splitter));
        self
    }

    pub fn with_settings(mut self, settings: StripingSettings) -> Self {
        self.settings = settings;
        self
    }
}

fn bind_route<R: PrecacheRegistry + 'static>(
    leader: &Rc<R>,
    scope: &dyn ServiceWorkerScope,
    resolver: Option<&RouteOptionResolver>,
) {
    let options = resolver.and_then(|resolve| resolve()).unwrap_or_default();
    debug!(?options, "Binding precache route");
    let route = PrecacheRoute::new(leader.clone(), &scope.location(), options);
    scope.register_route(Rc::new(route));
}

fn run_cleanup<R: PrecacheRegistry + 'static>(
    leader: Rc<R>,
    event: &ExtendableEvent,
) -> PendingWork {
    let cleanup = leader.activate(event);
    async move {
        match cleanup.await {
            Ok(result) => {
                info!(
                    deleted = result.deleted_cache_keys.len(),
                    "Precache cleanup finished"
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Precache cleanup failed");
                Err(e)
            }
        }
    }
    .boxed_local()
}

fn install_follower<R: PrecacheRegistry + 'static>(
    follower: Rc<R>,
    event: &ExtendableEvent,
    index: usize,
    merge_into: Option<SharedKeyMapping>,
) -> PendingWork {
    let install = follower.clone().install(event);
    async move {
        let result = match install.await {
            Ok(result) => result,
            Err(e) => {
                warn!(follower = index, error = %e, "Precache follower install failed");
                return Err(e);
            }
        };
        info!(
            follower = index,
            updated = result.updated_urls.len(),
            not_updated = result.not_updated_urls.len(),
            "Precache follower installed"
        );
        if let Some(shared) = merge_into {
            let added = shared.merge_from(&follower.urls_to_cache_keys());
            trace!(follower = index, added, "Follower keys merged after install");
        }
        Ok(())
    }
    .boxed_local()
}

/// Splits precaching across independent follower registries while one leader
/// keeps the combined key mapping for cleanup and routing.
///
/// Single-threaded: see [`SharedKeyMapping`] for the scheduling precondition.
pub struct PrecacheStriping<R: PrecacheRegistry + 'static> {
    leader: Rc<R>,
    shared_cache_keys: SharedKeyMapping,
    registry_options: RegistryOptions,
    config: StripingConfig,
    scope: Rc<dyn ServiceWorkerScope>,
    factory: RegistryFactory<R>,
    followers: Cell<usize>,
    route_bound: Rc<Cell<bool>>,
}

impl<R: PrecacheRegistry + 'static> PrecacheStriping<R> {
    /// Create the leader, bind or defer its route, and subscribe its cleanup
    /// to `activate`.
    pub fn new(
        config: StripingConfig,
        scope: Rc<dyn ServiceWorkerScope>,
        factory: impl Fn(&RegistryOptions) -> R + 'static,
    ) -> Result<Self> {
        config.settings.validate()?;

        let registry_options = config
            .controller_option_resolver
            .as_ref()
            .map(|resolve| resolve())
            .unwrap_or_default();
        let factory: RegistryFactory<R> = Rc::new(factory);

        let leader = Rc::new(factory(&registry_options));
        let shared_cache_keys = leader.urls_to_cache_keys();
        let route_bound = Rc::new(Cell::new(false));

        if config.settings.route_binding == RouteBinding::AtConstruction {
            bind_route(&leader, &*scope, config.option_resolver.as_ref());
            route_bound.set(true);
        }

        {
            let leader = leader.clone();
            let weak_scope = Rc::downgrade(&scope);
            let resolver = config.option_resolver.clone();
            let route_bound = route_bound.clone();
            scope.add_event_listener(
                LifecycleEventKind::Activate,
                Rc::new(move |event: &ExtendableEvent| {
                    event.wait_until(run_cleanup(leader.clone(), event));

                    if !route_bound.get() {
                        if let Some(scope) = weak_scope.upgrade() {
                            bind_route(&leader, &*scope, resolver.as_ref());
                            route_bound.set(true);
                        }
                    }
                }),
            );
        }

        debug!(
            settings = ?config.settings,
            options = ?registry_options,
            "Precache striping leader created"
        );

        Ok(Self {
            leader,
            shared_cache_keys,
            registry_options,
            config,
            scope,
            factory,
            followers: Cell::new(0),
            route_bound,
        })
    }

    /// Schedule `entries` on a new follower registry.
    ///
    /// The follower installs on the next `install` notification. Its key
    /// mapping reaches the shared mapping according to the merge policy.
    pub fn precache(&self, entries: &[CacheItem]) -> Result<()> {
        let mut follower = (self.factory)(&self.registry_options);
        follower.add_to_cache_list(entries)?;
        let follower = Rc::new(follower);

        let index = self.followers.get();
        self.followers.set(index + 1);
        debug!(follower = index, entries = entries.len(), "Precache follower created");

        let merge_after_install = match self.config.settings.merge_policy {
            MergePolicy::BeforeInstall => {
                let added = self
                    .shared_cache_keys
                    .merge_from(&follower.urls_to_cache_keys());
                trace!(follower = index, added, "Follower keys merged before install");
                false
            }
            MergePolicy::AfterInstall => true,
        };

        let merge_into = merge_after_install.then(|| self.shared_cache_keys.clone());
        self.scope.add_event_listener(
            LifecycleEventKind::Install,
            Rc::new(move |event: &ExtendableEvent| {
                event.wait_until(install_follower(
                    follower.clone(),
                    event,
                    index,
                    merge_into.clone(),
                ));
            }),
        );

        Ok(())
    }

    /// Split `entries` into the configured number of buckets and precache
    /// each on its own follower. Returns the number of followers created.
    pub fn precache_striping(&self, entries: &[CacheItem]) -> Result<usize> {
        self.precache_striping_with(entries, self.config.settings.bucket_count)
    }

    /// Like [`precache_striping`](Self::precache_striping) with an explicit
    /// bucket count. An injected split strategy takes precedence over the
    /// count, which is still validated.
    ///
    /// Followers created before a failing bucket stay registered.
    pub fn precache_striping_with(
        &self,
        entries: &[CacheItem],
        bucket_count: usize,
    ) -> Result<usize> {
        let default_splitter = split_by_bucket_size(bucket_count)?;
        let splitter: &dyn SplitEntries = match self.config.split_entries {
            Some(ref custom) => custom.as_ref(),
            None => &default_splitter,
        };

        let mut created = 0;
        for bucket in splitter.split(entries) {
            self.precache(&bucket)?;
            created += 1;
        }

        info!(
            followers = created,
            entries = entries.len(),
            "Precache striping scheduled"
        );
        Ok(created)
    }

    pub fn leader(&self) -> &Rc<R> {
        &self.leader
    }

    /// Handle to the leader's live mapping.
    pub fn shared_cache_keys(&self) -> SharedKeyMapping {
        self.shared_cache_keys.clone()
    }

    /// Number of followers created so far.
    pub fn follower_count(&self) -> usize {
        self.followers.get()
    }

    pub fn is_route_bound(&self) -> bool {
        self.route_bound.get()
    }

    pub fn settings(&self) -> &StripingSettings {
        &self.config.settings
    }

    pub fn registry_options(&self) -> &RegistryOptions {
        &self.registry_options
    }
}
