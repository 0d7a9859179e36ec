//! Match preparation and the single-slot preload cache
//!
//! Preparing a match starts loading the view code and, in assisted mode,
//! turns the route's preload request into started [`Resource`]s. The last
//! assisted entry is remembered so that preparing the same pathname with the
//! same params again reuses its resources instead of issuing new requests.

use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::Mutex;

use crate::error::LoadError;
use crate::path::{request_signature, Location, QueryValue, SearchParams};
use crate::resolve::MatchedRoute;
use crate::resource::{Loadable, Resource};
use crate::route::{Params, PreloadRequest};

// ============================================================================
// Prepared entries
// ============================================================================

/// A started preload in assisted mode
pub struct PreloadedItem<D> {
    pub data: Resource<D>,
    /// When false the route should not render before `data` settles
    pub defer: bool,
}

impl<D> Clone for PreloadedItem<D> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            defer: self.defer,
        }
    }
}

impl<D> fmt::Debug for PreloadedItem<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreloadedItem")
            .field("data", &self.data)
            .field("defer", &self.defer)
            .finish()
    }
}

/// Started preloads keyed by name, in request order
pub struct PreloadedMap<D> {
    items: Vec<(String, PreloadedItem<D>)>,
}

impl<D> Clone for PreloadedMap<D> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<D> fmt::Debug for PreloadedMap<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.items.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<D> PreloadedMap<D> {
    pub fn get(&self, key: &str) -> Option<&PreloadedItem<D>> {
        self.items
            .iter()
            .find_map(|(existing, item)| (existing == key).then_some(item))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PreloadedItem<D>)> {
        self.items.iter().map(|(key, item)| (key.as_str(), item))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Preload payload of a prepared entry
pub enum Preloaded<D> {
    /// The raw request, left for the rendering layer to drive
    Unassisted(Option<PreloadRequest<D>>),
    /// Started resources with their deferral policy
    Assisted(Option<PreloadedMap<D>>),
}

impl<D> Preloaded<D> {
    pub fn is_assisted(&self) -> bool {
        matches!(self, Preloaded::Assisted(_))
    }

    pub fn assisted(&self) -> Option<&PreloadedMap<D>> {
        match self {
            Preloaded::Assisted(map) => map.as_ref(),
            Preloaded::Unassisted(_) => None,
        }
    }

    pub fn unassisted(&self) -> Option<&PreloadRequest<D>> {
        match self {
            Preloaded::Unassisted(request) => request.as_ref(),
            Preloaded::Assisted(_) => None,
        }
    }
}

impl<D> Clone for Preloaded<D> {
    fn clone(&self) -> Self {
        match self {
            Preloaded::Unassisted(request) => Preloaded::Unassisted(request.clone()),
            Preloaded::Assisted(map) => Preloaded::Assisted(map.clone()),
        }
    }
}

impl<D> fmt::Debug for Preloaded<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preloaded::Unassisted(request) => f.debug_tuple("Unassisted").field(request).finish(),
            Preloaded::Assisted(map) => f.debug_tuple("Assisted").field(map).finish(),
        }
    }
}

/// A resolved match whose loads have been started
pub struct PreparedEntry<V, D = ()> {
    /// Route key of the match
    pub key: String,
    pub component: Resource<V>,
    pub location: Location,
    pub params: Params,
    pub search: SearchParams,
    pub preloaded: Preloaded<D>,
}

impl<V, D> Clone for PreparedEntry<V, D> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            component: self.component.clone(),
            location: self.location.clone(),
            params: self.params.clone(),
            search: self.search.clone(),
            preloaded: self.preloaded.clone(),
        }
    }
}

impl<V, D> fmt::Debug for PreparedEntry<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedEntry")
            .field("key", &self.key)
            .field("component", &self.component)
            .field("location", &self.location)
            .field("params", &self.params)
            .field("search", &self.search)
            .field("preloaded", &self.preloaded)
            .finish()
    }
}

impl<V: Loadable, D: Loadable> PreparedEntry<V, D> {
    /// Waits until the entry may be rendered
    ///
    /// Awaits the view when `await_component` is set, and every assisted
    /// preload that is not deferred. Returns the first load failure.
    pub async fn ready(&self, await_component: bool) -> Result<(), LoadError> {
        if await_component {
            self.component.load().await?;
        }

        if let Some(map) = self.preloaded.assisted() {
            let awaited = map
                .iter()
                .filter(|(_, item)| !item.defer)
                .map(|(_, item)| item.data.load());
            try_join_all(awaited).await?;
        }

        Ok(())
    }
}

// ============================================================================
// Preparer
// ============================================================================

struct CacheSlot<V, D> {
    pathname: String,
    signature: String,
    value: Arc<PreparedEntry<V, D>>,
}

/// Cache identity of a set of route params
///
/// # Examples
///
/// ```
/// use preroute::{params_signature, Params};
///
/// let params: Params = [("b", "2"), ("a", "1")]
///     .into_iter()
///     .map(|(k, v)| (k.to_string(), v.to_string()))
///     .collect();
/// assert_eq!(params_signature(&params), "?a=1&b=2");
/// ```
pub fn params_signature(params: &Params) -> String {
    let as_query: SearchParams = params
        .iter()
        .map(|(key, value)| (key.clone(), QueryValue::Single(value.clone())))
        .collect();
    request_signature(&as_query)
}

/// Prepares matches and owns the single-slot preload cache
pub struct Preparer<V, D = ()> {
    cache: Mutex<Option<CacheSlot<V, D>>>,
}

impl<V, D> Default for Preparer<V, D> {
    fn default() -> Self {
        Self {
            cache: Mutex::new(None),
        }
    }
}

impl<V, D> fmt::Debug for Preparer<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.cache.lock();
        f.debug_struct("Preparer")
            .field("cached", &cache.as_ref().map(|slot| (&slot.pathname, &slot.signature)))
            .finish()
    }
}

impl<V: Loadable, D: Loadable> Preparer<V, D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the loads for a match
    ///
    /// In assisted mode a match with the same pathname and params as the
    /// previous assisted one returns that entry as-is, without starting
    /// anything. Otherwise the view starts loading and the preload request is
    /// built; assisted mode starts every preload and replaces the cache slot.
    pub fn prepare(
        &self,
        matched: MatchedRoute<V, D>,
        assist: bool,
        await_preload: bool,
    ) -> Arc<PreparedEntry<V, D>> {
        let MatchedRoute {
            key,
            location,
            params,
            search,
            route,
        } = matched;

        let signature = params_signature(&params);

        if assist {
            if let Some(cached) = self.cached(&location.pathname, &signature) {
                tracing::debug!(pathname = %location.pathname, "preload cache hit");
                return cached;
            }
        }

        route.view.start();

        let request = route.preload.as_ref().map(|preload| preload(&params, &search));

        if !assist {
            return Arc::new(PreparedEntry {
                key,
                component: route.view.clone(),
                location,
                params,
                search,
                preloaded: Preloaded::Unassisted(request),
            });
        }

        let preloaded = request.map(|request| start_preloads(&request, await_preload));
        let entry = Arc::new(PreparedEntry {
            key,
            component: route.view.clone(),
            location,
            params,
            search,
            preloaded: Preloaded::Assisted(preloaded),
        });

        *self.cache.lock() = Some(CacheSlot {
            pathname: entry.location.pathname.clone(),
            signature,
            value: Arc::clone(&entry),
        });

        entry
    }

    fn cached(&self, pathname: &str, signature: &str) -> Option<Arc<PreparedEntry<V, D>>> {
        self.cache
            .lock()
            .as_ref()
            .filter(|slot| slot.pathname == pathname && slot.signature == signature)
            .map(|slot| Arc::clone(&slot.value))
    }
}

fn start_preloads<D: Loadable>(request: &PreloadRequest<D>, await_preload: bool) -> PreloadedMap<D> {
    let items = request
        .iter()
        .map(|(key, source)| {
            let data = Resource::from_loader(Arc::clone(source.data()));
            data.start();
            let item = PreloadedItem {
                data,
                defer: source.defer().unwrap_or(!await_preload),
            };
            (key.to_string(), item)
        })
        .collect();

    PreloadedMap { items }
}
