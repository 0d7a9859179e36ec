//! Router core
//!
//! Ties the route table, resolver and preparer to a [`History`]. The router
//! keeps exactly one current [`PreparedEntry`], replaces it whenever history
//! moves to a new location, and tells subscribers about the transition.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde_json::json;

use crate::config::RouterOptions;
use crate::error::{Result, RouterError};
use crate::history::{History, ListenerId, MemoryHistory, Update};
use crate::logger::{LogRecord, Logger};
use crate::path::{locations_match, Location};
use crate::prepare::{PreparedEntry, Preparer};
use crate::resolve::{resolve, MatchedRoute};
use crate::resource::Loadable;
use crate::route::{RouteConfig, RouteTable};

/// Called with the new entry and the history update that caused it
pub type TransitionStart<V, D> = Arc<dyn Fn(&Arc<PreparedEntry<V, D>>, &Update) + Send + Sync>;

/// Called once the rendering layer reports a finished transition
pub type TransitionComplete = Arc<dyn Fn(&Update) + Send + Sync>;

/// A pair of optional transition callbacks
pub struct Subscription<V, D = ()> {
    pub on_transition_start: Option<TransitionStart<V, D>>,
    pub on_transition_complete: Option<TransitionComplete>,
}

impl<V, D> Default for Subscription<V, D> {
    fn default() -> Self {
        Self {
            on_transition_start: None,
            on_transition_complete: None,
        }
    }
}

impl<V, D> Subscription<V, D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_transition_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Arc<PreparedEntry<V, D>>, &Update) + Send + Sync + 'static,
    {
        self.on_transition_start = Some(Arc::new(callback));
        self
    }

    pub fn on_transition_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Update) + Send + Sync + 'static,
    {
        self.on_transition_complete = Some(Arc::new(callback));
        self
    }
}

/// Returned by [`Router::subscribe`]; removes the subscription on `dispose`
pub struct SubscriptionHandle<V, D = ()> {
    id: u64,
    router: Weak<RouterInner<V, D>>,
}

impl<V, D> SubscriptionHandle<V, D> {
    /// Removes the subscription; later calls are no-ops
    ///
    /// A notification round already in progress still reaches this
    /// subscriber.
    pub fn dispose(&self) {
        if let Some(router) = self.router.upgrade() {
            router.subscribers.lock().remove(&self.id);
        }
    }
}

impl<V, D> fmt::Debug for SubscriptionHandle<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

struct RouterInner<V, D> {
    history: Arc<dyn History>,
    table: RouteTable<V, D>,
    preparer: Preparer<V, D>,
    options: RouterOptions,
    current: ArcSwap<PreparedEntry<V, D>>,
    subscribers: Mutex<BTreeMap<u64, Subscription<V, D>>>,
    next_subscriber: AtomicU64,
    listener: Mutex<Option<ListenerId>>,
}

impl<V, D> Drop for RouterInner<V, D> {
    fn drop(&mut self) {
        if let Some(id) = self.listener.lock().take() {
            self.history.unlisten(id);
        }
    }
}

impl<V: Loadable, D: Loadable> RouterInner<V, D> {
    fn logger(&self) -> &dyn Logger {
        self.options.logger.as_ref()
    }

    fn resolve(&self, to: impl Into<Location>) -> Result<MatchedRoute<V, D>> {
        resolve(&self.table, to, self.options.max_redirects, self.logger())
    }

    fn prepare(&self, matched: MatchedRoute<V, D>) -> Arc<PreparedEntry<V, D>> {
        self.preparer.prepare(
            matched,
            self.options.assist_preload,
            self.options.await_preload,
        )
    }

    fn on_history_update(&self, update: &Update) -> anyhow::Result<()> {
        if locations_match(&self.current.load().location, &update.location, true) {
            return Ok(());
        }

        let matched = self.resolve(&update.location)?;
        let resolved = matched.location.clone();
        let entry = self.prepare(matched);

        if !locations_match(&resolved, &update.location, true) {
            tracing::debug!(from = %update.location, to = %resolved, "correcting redirected location");
            return self.history.replace(resolved);
        }

        self.current.store(Arc::clone(&entry));

        let callbacks: Vec<TransitionStart<V, D>> = self
            .subscribers
            .lock()
            .values()
            .filter_map(|subscription| subscription.on_transition_start.clone())
            .collect();

        tracing::debug!(key = %entry.key, subscribers = callbacks.len(), "route transition started");
        callbacks.iter().for_each(|callback| callback(&entry, update));
        Ok(())
    }

    fn report(&self, operation: &str, to: &Location, err: &RouterError) {
        self.logger().log(
            &LogRecord::error("router", format!("{} failed for '{}': {}", operation, to, err))
                .with_context(json!({ "operation": operation, "location": to.href() })),
        );
    }
}

/// The route-matching and preloading engine
///
/// Cloning a `Router` yields another handle to the same router; the history
/// listener is removed when the last handle is dropped.
///
/// # Examples
///
/// ```
/// use preroute::{create_memory_router, History, RouteConfig, RouterOptions};
///
/// let routes: Vec<RouteConfig<&'static str>> = vec![
///     RouteConfig::new("/", || async { Ok("home") }),
///     RouteConfig::new("/about", || async { Ok("about") }),
///     RouteConfig::new("/*", || async { Ok("not found") }),
/// ];
///
/// let router = create_memory_router(routes, RouterOptions::default(), ["/"]).unwrap();
/// assert_eq!(router.current_route_key(), "/");
///
/// router.history().push("/about#team".into()).unwrap();
/// assert_eq!(router.current_route_key(), "/about");
/// assert!(router.is_active("/about", false));
/// ```
pub struct Router<V, D = ()> {
    inner: Arc<RouterInner<V, D>>,
}

impl<V, D> Clone for Router<V, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, D> fmt::Debug for Router<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("current", &self.inner.current.load().key)
            .field("routes", &self.inner.table)
            .field("options", &self.inner.options)
            .finish()
    }
}

impl<V: Loadable, D: Loadable> Router<V, D> {
    /// Builds the route table, prepares the initial location and starts
    /// listening to `history`
    ///
    /// When the initial location redirects, history is corrected with
    /// `replace` before the listener is registered.
    pub fn new(
        history: Arc<dyn History>,
        routes: Vec<RouteConfig<V, D>>,
        options: RouterOptions,
    ) -> Result<Self> {
        let table = RouteTable::build(routes, options.logger.as_ref())?;
        let preparer = Preparer::new();

        let requested = history.location();
        let matched = resolve(
            &table,
            &requested,
            options.max_redirects,
            options.logger.as_ref(),
        )?;
        let resolved = matched.location.clone();
        let entry = preparer.prepare(matched, options.assist_preload, options.await_preload);

        if !locations_match(&resolved, &requested, true) {
            tracing::debug!(from = %requested, to = %resolved, "initial location redirected");
            history
                .replace(resolved)
                .map_err(RouterError::History)?;
        }

        let inner = Arc::new(RouterInner {
            history,
            table,
            preparer,
            options,
            current: ArcSwap::new(entry),
            subscribers: Mutex::new(BTreeMap::new()),
            next_subscriber: AtomicU64::new(0),
            listener: Mutex::new(None),
        });

        let router = Arc::downgrade(&inner);
        let id = inner.history.listen(Arc::new(move |update: &Update| -> anyhow::Result<()> {
            match router.upgrade() {
                Some(router) => router.on_history_update(update),
                None => Ok(()),
            }
        }));
        *inner.listener.lock() = Some(id);

        Ok(Self { inner })
    }

    /// The current prepared entry
    ///
    /// With `assist_preload`, a preload cache hit reuses the earlier entry
    /// as-is, so its `location` can lag behind history (for example after a
    /// hash-only change). Use [`History::location`] for the exact address.
    pub fn get(&self) -> Arc<PreparedEntry<V, D>> {
        self.inner.current.load_full()
    }

    pub fn current_route_key(&self) -> String {
        self.inner.current.load().key.clone()
    }

    /// Whether the history's current location matches `to`
    pub fn is_active(&self, to: impl Into<Location>, exact: bool) -> bool {
        locations_match(self.inner.history.location(), to, exact)
    }

    /// Starts loading the view code for `to` without preparing it
    ///
    /// Resolution failures are logged and otherwise ignored.
    pub fn preload_code(&self, to: impl Into<Location>) {
        let to = to.into();
        match self.inner.resolve(&to) {
            Ok(matched) => matched.route.view.start(),
            Err(err) => self.inner.report("preload_code", &to, &err),
        }
    }

    /// Prepares `to` ahead of navigation, view and preloads included
    ///
    /// In assisted mode this fills the preload cache, so navigating to the
    /// same location right after reuses the started resources. Resolution
    /// failures are logged and otherwise ignored.
    pub fn warm_route(&self, to: impl Into<Location>) {
        let to = to.into();
        match self.inner.resolve(&to) {
            Ok(matched) => {
                self.inner.prepare(matched);
            }
            Err(err) => self.inner.report("warm_route", &to, &err),
        }
    }

    /// Registers transition callbacks
    pub fn subscribe(&self, subscription: Subscription<V, D>) -> SubscriptionHandle<V, D> {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().insert(id, subscription);
        SubscriptionHandle {
            id,
            router: Arc::downgrade(&self.inner),
        }
    }

    /// Reports that the rendering layer finished the transition for `update`
    pub fn route_transition_completed(&self, update: &Update) {
        let callbacks: Vec<TransitionComplete> = self
            .inner
            .subscribers
            .lock()
            .values()
            .filter_map(|subscription| subscription.on_transition_complete.clone())
            .collect();

        callbacks.iter().for_each(|callback| callback(update));
    }

    pub fn history(&self) -> &Arc<dyn History> {
        &self.inner.history
    }

    pub fn options(&self) -> &RouterOptions {
        &self.inner.options
    }

    pub fn routes(&self) -> &RouteTable<V, D> {
        &self.inner.table
    }
}

/// Creates a router backed by a fresh [`MemoryHistory`]
///
/// The history starts on the last of `initial_entries` (`/` when empty).
pub fn create_memory_router<V, D, I, L>(
    routes: Vec<RouteConfig<V, D>>,
    options: RouterOptions,
    initial_entries: I,
) -> Result<Router<V, D>>
where
    V: Loadable,
    D: Loadable,
    I: IntoIterator<Item = L>,
    L: Into<Location>,
{
    if routes.is_empty() {
        return Err(RouterError::EmptyRoutes);
    }

    let history: Arc<dyn History> = Arc::new(MemoryHistory::new(initial_entries));
    Router::new(history, routes, options)
}
