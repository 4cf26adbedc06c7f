//! Request routing against the leader's key mapping.
//!
//! In-process stand-in for the host framework's precache route, used with
//! [`MemoryScope`](crate::memory::MemoryScope). The URL variation rules
//! follow the framework's defaults. Hosts with their own router register
//! the leader's mapping there and never construct [`PrecacheRoute`].

use std::fmt;
use std::rc::Rc;
use tracing::trace;
use url::{Origin, Url};

use crate::keys::SharedKeyMapping;
use crate::registry::{CachedResponse, PrecacheRegistry, RegistryFuture};

/// Response future produced by a matching route.
pub type RouteResponse = RegistryFuture<CachedResponse>;

/// A request-matching rule registered with the host router.
pub trait Route {
    /// Return a response future when this route handles `request_url`.
    fn handle(&self, request_url: &Url) -> Option<RouteResponse>;
}

/// Query parameter name matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamPattern {
    Exact(String),
    Prefix(String),
}

impl ParamPattern {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            ParamPattern::Exact(exact) => name == exact,
            ParamPattern::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

/// Extra URL candidates derived from a request URL.
pub type UrlManipulation = Rc<dyn Fn(&Url) -> Vec<Url>>;

/// Options controlling how request URLs map onto precached URLs.
#[derive(Clone)]
pub struct RouteOptions {
    /// Query parameters removed before lookup.
    pub ignore_url_parameters_matching: Vec<ParamPattern>,
    /// File appended to directory requests (`/docs/` → `/docs/index.html`).
    pub directory_index: Option<String>,
    /// Try `<path>.html` for extension-less requests.
    pub clean_urls: bool,
    /// Additional candidates, tried last.
    pub url_manipulation: Option<UrlManipulation>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            ignore_url_parameters_matching: vec![
                ParamPattern::Prefix("utm_".to_string()),
                ParamPattern::Exact("fbclid".to_string()),
            ],
            directory_index: Some("index.html".to_string()),
            clean_urls: true,
            url_manipulation: None,
        }
    }
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field(
                "ignore_url_parameters_matching",
                &self.ignore_url_parameters_matching,
            )
            .field("directory_index", &self.directory_index)
            .field("clean_urls", &self.clean_urls)
            .field("url_manipulation", &self.url_manipulation.is_some())
            .finish()
    }
}

fn remove_ignored_search_params(url: &Url, ignored: &[ParamPattern]) -> Url {
    let total = url.query_pairs().count();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !ignored.iter().any(|p| p.matches(name)))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.len() == total {
        return stripped;
    }
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

/// Candidate URLs for a request, in lookup order.
pub fn generate_url_variations(request_url: &Url, options: &RouteOptions) -> Vec<Url> {
    let mut url = request_url.clone();
    url.set_fragment(None);

    let stripped = remove_ignored_search_params(&url, &options.ignore_url_parameters_matching);
    let mut variations = vec![url.clone(), stripped.clone()];

    if let Some(ref index) = options.directory_index {
        if stripped.path().ends_with('/') {
            let mut with_index = stripped.clone();
            with_index.set_path(&format!("{}{}", stripped.path(), index));
            variations.push(with_index);
        }
    }

    if options.clean_urls {
        let mut clean = stripped.clone();
        clean.set_path(&format!("{}.html", stripped.path()));
        variations.push(clean);
    }

    if let Some(ref manipulation) = options.url_manipulation {
        variations.extend(manipulation(&url));
    }

    variations
}

/// Serves same-origin requests whose URL resolves to a precached key.
pub struct PrecacheRoute<R> {
    registry: Rc<R>,
    cache_keys: SharedKeyMapping,
    origin: Origin,
    options: RouteOptions,
}

impl<R: PrecacheRegistry> PrecacheRoute<R> {
    /// Create a route consulting `registry`'s live mapping for requests on
    /// `location`'s origin.
    pub fn new(registry: Rc<R>, location: &Url, options: RouteOptions) -> Self {
        let cache_keys = registry.urls_to_cache_keys();
        Self {
            registry,
            cache_keys,
            origin: location.origin(),
            options,
        }
    }

    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    /// Resolve the cache key a request maps to, if any.
    pub fn cache_key_for(&self, request_url: &Url) -> Option<String> {
        if request_url.origin() != self.origin {
            return None;
        }

        generate_url_variations(request_url, &self.options)
            .iter()
            .find_map(|candidate| self.cache_keys.get(candidate.as_str()))
    }
}

impl<R: PrecacheRegistry + 'static> Route for PrecacheRoute<R> {
    fn handle(&self, request_url: &Url) -> Option<RouteResponse> {
        let cache_key = self.cache_key_for(request_url)?;
        trace!(url = %request_url, %cache_key, "Precache route matched");
        Some(
            self.registry
                .clone()
                .handle_request(cache_key, request_url.to_string()),
        )
    }
}
