//! One-shot memoized asynchronous values
//!
//! A [`Resource`] wraps a loader and runs it at most once. Every caller that
//! asks for the value before it settles shares the same in-flight future, and
//! once settled the value (or error) is returned forever after.
//!
//! ```text
//! Pending ──load()──► Loading ──ok──► Ready(T)
//!                        └────err───► Failed(LoadError)
//! ```

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::error::LoadError;

/// Caller-supplied asynchronous factory
pub type Loader<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// The in-flight (or already settled) load shared by every waiter
pub type LoadFuture<T> = Shared<BoxFuture<'static, Result<T, LoadError>>>;

/// Values a [`Resource`] can hold and share between waiters
pub trait Loadable: Clone + Send + Sync + 'static {}

impl<T> Loadable for T where T: Clone + Send + Sync + 'static {}

/// Boxes an async closure into a [`Loader`]
///
/// # Examples
///
/// ```
/// use preroute::resource::loader;
///
/// let load_name = loader(|| async { Ok("home".to_string()) });
/// let _future = load_name();
/// ```
pub fn loader<T, F, Fut>(f: F) -> Loader<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Observable state of a [`Resource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    /// Loader not invoked yet
    Pending,
    /// Loader invoked, result outstanding
    Loading,
    Ready,
    Failed,
}

/// Why [`Resource::read`] could not hand out a value
pub enum ReadError<T> {
    /// Still loading; await the future to be notified when it settles
    Pending(LoadFuture<T>),
    /// The loader failed; the failure is permanent
    Failed(LoadError),
}

impl<T> fmt::Debug for ReadError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Pending(_) => f.write_str("Pending(..)"),
            ReadError::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

enum State<T> {
    Pending,
    Loading(LoadFuture<T>),
    Ready(T),
    Failed(LoadError),
}

struct Inner<T> {
    loader: Loader<T>,
    state: Mutex<State<T>>,
}

impl<T: Clone> Inner<T> {
    /// Records the outcome unless the resource already settled
    fn settle(&self, result: &Result<T, LoadError>) {
        let mut state = self.state.lock();
        if matches!(*state, State::Loading(_)) {
            *state = match result {
                Ok(value) => State::Ready(value.clone()),
                Err(err) => State::Failed(err.clone()),
            };
            tracing::trace!(ok = result.is_ok(), "resource settled");
        }
    }
}

/// A lazily loaded, memoized value
///
/// Cloning a `Resource` yields another handle to the same underlying load.
///
/// # Examples
///
/// ```
/// use preroute::{Resource, ResourceStatus};
///
/// futures::executor::block_on(async {
///     let resource = Resource::new(|| async { Ok(42) });
///     assert_eq!(resource.status(), ResourceStatus::Pending);
///
///     assert_eq!(resource.load().await.unwrap(), 42);
///     assert_eq!(resource.status(), ResourceStatus::Ready);
///     assert_eq!(resource.read().unwrap(), 42);
/// });
/// ```
pub struct Resource<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("status", &self.status())
            .finish()
    }
}

impl<T> Resource<T> {
    pub fn status(&self) -> ResourceStatus {
        match &*self.inner.state.lock() {
            State::Pending => ResourceStatus::Pending,
            State::Loading(_) => ResourceStatus::Loading,
            State::Ready(_) => ResourceStatus::Ready,
            State::Failed(_) => ResourceStatus::Failed,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(
            self.status(),
            ResourceStatus::Ready | ResourceStatus::Failed
        )
    }

    /// Whether both handles refer to the same underlying load
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Loadable> Resource<T> {
    /// Creates a resource from an async closure
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::from_loader(loader(f))
    }

    /// Creates a resource around an existing loader
    ///
    /// Each resource invokes the loader at most once, so a loader shared by
    /// several resources runs once per resource.
    pub fn from_loader(loader: Loader<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                state: Mutex::new(State::Pending),
            }),
        }
    }

    /// Returns the future for this resource, invoking the loader on first use
    ///
    /// The returned flag is `true` only for the call that invoked the loader.
    /// The loader runs after the state lock is released, so it may inspect
    /// its own resource.
    fn ensure_loading(&self) -> (LoadFuture<T>, bool) {
        let (future, handoff) = {
            let mut state = self.inner.state.lock();
            let existing = match &*state {
                State::Ready(value) => Some(settled(Ok(value.clone()))),
                State::Failed(err) => Some(settled(Err(err.clone()))),
                State::Loading(future) => Some(future.clone()),
                State::Pending => None,
            };
            if let Some(future) = existing {
                return (future, false);
            }

            let (handoff, pending) = oneshot::channel::<BoxFuture<'static, anyhow::Result<T>>>();
            let inner: Weak<Inner<T>> = Arc::downgrade(&self.inner);

            let future = async move {
                let result = match pending.await {
                    Ok(pending) => pending.await.map_err(LoadError::from),
                    Err(_) => Err(LoadError::from(anyhow::anyhow!(
                        "loader panicked before returning a future"
                    ))),
                };
                if let Some(inner) = inner.upgrade() {
                    inner.settle(&result);
                }
                result
            }
            .boxed()
            .shared();

            *state = State::Loading(future.clone());
            (future, handoff)
        };

        tracing::trace!("resource loading");
        let _ = handoff.send((self.inner.loader)());
        (future, true)
    }

    /// Loads the value
    ///
    /// Concurrent calls before settlement share one invocation of the loader.
    pub fn load(&self) -> LoadFuture<T> {
        self.ensure_loading().0
    }

    /// Begins loading without waiting for the result
    ///
    /// On a Tokio runtime the load is spawned so it progresses in the
    /// background; elsewhere it is polled once in place and continues when a
    /// reader awaits it.
    pub fn start(&self) {
        let (future, started) = self.ensure_loading();
        if !started {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = future.await;
                });
            }
            Err(_) => {
                let _ = future.now_or_never();
            }
        }
    }

    /// Reads the value without waiting
    ///
    /// Returns the value once ready, the stored error once failed, or the
    /// in-flight future while loading. A resource that was never started is
    /// started first.
    pub fn read(&self) -> Result<T, ReadError<T>> {
        if let Some(outcome) = self.peek() {
            return outcome;
        }

        self.start();
        self.peek()
            .unwrap_or_else(|| Err(ReadError::Pending(self.load())))
    }

    /// Snapshot of the current state; `None` while still pending
    fn peek(&self) -> Option<Result<T, ReadError<T>>> {
        match &*self.inner.state.lock() {
            State::Pending => None,
            State::Loading(future) => Some(Err(ReadError::Pending(future.clone()))),
            State::Ready(value) => Some(Ok(value.clone())),
            State::Failed(err) => Some(Err(ReadError::Failed(err.clone()))),
        }
    }
}

fn settled<T: Loadable>(result: Result<T, LoadError>) -> LoadFuture<T> {
    futures::future::ready(result).boxed().shared()
}
