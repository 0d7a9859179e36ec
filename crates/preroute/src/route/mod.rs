/// Route configuration and the flattened route table
///
/// A [`RouteConfig`] tree is what applications write. [`RouteTable::build`]
/// flattens it into [`RouteEntry`] values keyed by their full pattern.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::path::SearchParams;
use crate::resource::{loader, Loader, Resource};

pub mod pattern;
pub mod table;

// Re-export commonly used types
pub use pattern::{classify_segments, match_pattern, Matcher, Params, PatternSegmentType, REST_PARAM};
pub use table::RouteTable;

// ============================================================================
// Caller-supplied functions
// ============================================================================

/// Computes a redirect target from the matched params and query
///
/// `None` or an empty string means "do not redirect".
pub type RedirectRule = Arc<dyn Fn(&Params, &SearchParams) -> Option<String> + Send + Sync>;

/// Builds the preload request for a matched route
pub type PreloadFn<D> = Arc<dyn Fn(&Params, &SearchParams) -> PreloadRequest<D> + Send + Sync>;

// ============================================================================
// Preload requests
// ============================================================================

/// One named item of a preload request
pub enum PreloadSource<D> {
    /// Bare loader; deferral follows the router's `await_preload` option
    Loader(Loader<D>),
    /// Loader with an explicit deferral flag
    Configured { data: Loader<D>, defer: Option<bool> },
}

impl<D> PreloadSource<D> {
    pub fn loader<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<D>> + Send + 'static,
    {
        PreloadSource::Loader(loader(f))
    }

    pub fn configured<F, Fut>(f: F, defer: Option<bool>) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<D>> + Send + 'static,
    {
        PreloadSource::Configured {
            data: loader(f),
            defer,
        }
    }

    pub(crate) fn data(&self) -> &Loader<D> {
        match self {
            PreloadSource::Loader(data) | PreloadSource::Configured { data, .. } => data,
        }
    }

    /// The explicit deferral flag, if any
    pub fn defer(&self) -> Option<bool> {
        match self {
            PreloadSource::Loader(_) => None,
            PreloadSource::Configured { defer, .. } => *defer,
        }
    }
}

impl<D> Clone for PreloadSource<D> {
    fn clone(&self) -> Self {
        match self {
            PreloadSource::Loader(data) => PreloadSource::Loader(Arc::clone(data)),
            PreloadSource::Configured { data, defer } => PreloadSource::Configured {
                data: Arc::clone(data),
                defer: *defer,
            },
        }
    }
}

impl<D> fmt::Debug for PreloadSource<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreloadSource::Loader(_) => f.write_str("Loader(..)"),
            PreloadSource::Configured { defer, .. } => f
                .debug_struct("Configured")
                .field("defer", defer)
                .finish_non_exhaustive(),
        }
    }
}

/// Ordered, keyed collection of preload sources
///
/// # Examples
///
/// ```
/// use preroute::PreloadRequest;
///
/// let request: PreloadRequest<String> = PreloadRequest::new()
///     .with_loader("user", || async { Ok("jane".to_string()) })
///     .with_configured("feed", || async { Ok("[]".to_string()) }, Some(true));
///
/// assert_eq!(request.keys().collect::<Vec<_>>(), vec!["user", "feed"]);
/// ```
pub struct PreloadRequest<D> {
    entries: Vec<(String, PreloadSource<D>)>,
}

impl<D> Default for PreloadRequest<D> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<D> Clone for PreloadRequest<D> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<D> fmt::Debug for PreloadRequest<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<D> PreloadRequest<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source; a repeated key replaces the earlier source in place
    pub fn insert(&mut self, key: impl Into<String>, source: PreloadSource<D>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = source,
            None => self.entries.push((key, source)),
        }
    }

    pub fn with_source(mut self, key: impl Into<String>, source: PreloadSource<D>) -> Self {
        self.insert(key, source);
        self
    }

    pub fn with_loader<F, Fut>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<D>> + Send + 'static,
    {
        self.with_source(key, PreloadSource::loader(f))
    }

    pub fn with_configured<F, Fut>(self, key: impl Into<String>, f: F, defer: Option<bool>) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<D>> + Send + 'static,
    {
        self.with_source(key, PreloadSource::configured(f, defer))
    }

    pub fn get(&self, key: &str) -> Option<&PreloadSource<D>> {
        self.entries
            .iter()
            .find_map(|(existing, source)| (existing == key).then_some(source))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PreloadSource<D>)> {
        self.entries.iter().map(|(key, source)| (key.as_str(), source))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Configuration tree
// ============================================================================

/// One node of the application's route tree
///
/// `V` is the view type produced by the view loader, `D` the preload data type.
///
/// # Examples
///
/// ```
/// use preroute::{PreloadRequest, RouteConfig};
///
/// let routes: Vec<RouteConfig<&'static str, String>> = vec![
///     RouteConfig::new("/", || async { Ok("home") }).with_children(vec![
///         RouteConfig::new("users/:id", || async { Ok("user") }).with_preload(|params, _| {
///             let id = params["id"].clone();
///             PreloadRequest::new().with_loader("user", move || {
///                 let id = id.clone();
///                 async move { Ok(id) }
///             })
///         }),
///     ]),
///     RouteConfig::new("/*", || async { Ok("not found") }),
/// ];
/// assert_eq!(routes[0].children.len(), 1);
/// ```
pub struct RouteConfig<V, D = ()> {
    pub path: String,
    pub view: Loader<V>,
    pub preload: Option<PreloadFn<D>>,
    pub redirect: Option<RedirectRule>,
    pub children: Vec<RouteConfig<V, D>>,
}

impl<V, D> RouteConfig<V, D> {
    /// Creates a route with a view loader and no children
    pub fn new<F, Fut>(path: impl Into<String>, view: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        Self::with_view_loader(path, loader(view))
    }

    /// Creates a route around an already boxed loader
    pub fn with_view_loader(path: impl Into<String>, view: Loader<V>) -> Self {
        Self {
            path: path.into(),
            view,
            preload: None,
            redirect: None,
            children: Vec::new(),
        }
    }

    pub fn with_preload<F>(mut self, preload: F) -> Self
    where
        F: Fn(&Params, &SearchParams) -> PreloadRequest<D> + Send + Sync + 'static,
    {
        self.preload = Some(Arc::new(preload));
        self
    }

    pub fn with_redirect<F>(mut self, redirect: F) -> Self
    where
        F: Fn(&Params, &SearchParams) -> Option<String> + Send + Sync + 'static,
    {
        self.redirect = Some(Arc::new(redirect));
        self
    }

    /// Installs a shared redirect rule
    pub fn with_redirect_rule(mut self, redirect: RedirectRule) -> Self {
        self.redirect = Some(redirect);
        self
    }

    pub fn with_child(mut self, child: RouteConfig<V, D>) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = RouteConfig<V, D>>,
    {
        self.children.extend(children);
        self
    }
}

impl<V, D> fmt::Debug for RouteConfig<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("path", &self.path)
            .field("preload", &self.preload.is_some())
            .field("redirect", &self.redirect.is_some())
            .field("children", &self.children)
            .finish()
    }
}

// ============================================================================
// Flattened entries
// ============================================================================

/// A registered route after flattening
///
/// Immutable once the table is built.
pub struct RouteEntry<V, D = ()> {
    /// Full pattern, e.g. `/users/:id`
    pub pattern: String,
    pub matcher: Matcher,
    pub view: Resource<V>,
    pub preload: Option<PreloadFn<D>>,
    /// Own rule, or the nearest ancestor's when none is set
    pub redirect: Option<RedirectRule>,
}

impl<V, D> RouteEntry<V, D> {
    /// Evaluates the redirect rule; empty targets count as no redirect
    pub fn redirect_target(&self, params: &Params, search: &SearchParams) -> Option<String> {
        self.redirect
            .as_ref()
            .and_then(|rule| rule(params, search))
            .filter(|target| !target.is_empty())
    }
}

impl<V, D> fmt::Debug for RouteEntry<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("pattern", &self.pattern)
            .field("view", &self.view)
            .field("preload", &self.preload.is_some())
            .field("redirect", &self.redirect.is_some())
            .finish()
    }
}
