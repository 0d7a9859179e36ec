//! Navigation history collaborator
//!
//! The router only needs to read the current location, listen for changes
//! and replace the current entry after a redirect. [`MemoryHistory`] is the
//! in-process implementation: a stack of locations with a cursor.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::path::Location;

/// How the current location changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Push,
    Replace,
    /// Moving through existing entries (`go`, `back`, `forward`)
    Pop,
}

/// A change notification delivered to history listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub action: Action,
    pub location: Location,
}

impl Update {
    pub fn new(action: Action, location: impl Into<Location>) -> Self {
        Self {
            action,
            location: location.into(),
        }
    }
}

pub type ListenerId = u64;

/// Callback invoked synchronously on every history change
pub type Listener = Arc<dyn Fn(&Update) -> anyhow::Result<()> + Send + Sync>;

/// Navigation history the router is driven by
pub trait History: Send + Sync {
    /// The current location
    fn location(&self) -> Location;

    /// Registers a listener and returns its id
    fn listen(&self, listener: Listener) -> ListenerId;

    /// Removes a listener; unknown ids are ignored
    fn unlisten(&self, id: ListenerId);

    /// Adds a new entry and makes it current
    fn push(&self, to: Location) -> anyhow::Result<()>;

    /// Overwrites the current entry
    fn replace(&self, to: Location) -> anyhow::Result<()>;
}

struct Stack {
    entries: Vec<Location>,
    index: usize,
}

/// In-memory history
///
/// Listeners are called after the stack has been updated and without any
/// lock held, so they may navigate again. Every listener sees every update;
/// the first listener error is returned to the navigating caller.
///
/// # Examples
///
/// ```
/// use preroute::history::{History, MemoryHistory};
///
/// let history = MemoryHistory::new(["/", "/about"]);
/// assert_eq!(history.location().pathname, "/about");
///
/// history.back().unwrap();
/// assert_eq!(history.location().pathname, "/");
///
/// history.push("/contact?from=home".into()).unwrap();
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.location().search, "?from=home");
/// ```
pub struct MemoryHistory {
    stack: Mutex<Stack>,
    listeners: Mutex<BTreeMap<ListenerId, Listener>>,
    next_id: AtomicU64,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(["/"])
    }
}

impl fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stack = self.stack.lock();
        f.debug_struct("MemoryHistory")
            .field("entries", &stack.entries)
            .field("index", &stack.index)
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl MemoryHistory {
    /// Creates a history positioned on the last of `initial_entries`
    ///
    /// An empty list starts at `/`.
    pub fn new<I, L>(initial_entries: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Location>,
    {
        let mut entries: Vec<Location> = initial_entries.into_iter().map(Into::into).collect();
        if entries.is_empty() {
            entries.push(Location::parse("/"));
        }
        let index = entries.len() - 1;
        Self::from_stack(entries, index)
    }

    /// Creates a history positioned on `index` (clamped to the entries)
    pub fn with_index<I, L>(initial_entries: I, index: usize) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Location>,
    {
        let history = Self::new(initial_entries);
        {
            let mut stack = history.stack.lock();
            stack.index = index.min(stack.entries.len() - 1);
        }
        history
    }

    fn from_stack(entries: Vec<Location>, index: usize) -> Self {
        Self {
            stack: Mutex::new(Stack { entries, index }),
            listeners: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn index(&self) -> usize {
        self.stack.lock().index
    }

    pub fn len(&self) -> usize {
        self.stack.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.lock().entries.is_empty()
    }

    /// Snapshot of every entry
    pub fn entries(&self) -> Vec<Location> {
        self.stack.lock().entries.clone()
    }

    /// Moves the cursor by `delta`, clamped to the stack
    ///
    /// Listeners are only notified when the cursor actually moves.
    pub fn go(&self, delta: isize) -> anyhow::Result<()> {
        let location = {
            let mut stack = self.stack.lock();
            let last = stack.entries.len() - 1;
            let target = stack.index.saturating_add_signed(delta).min(last);
            if target == stack.index {
                return Ok(());
            }
            stack.index = target;
            stack.entries[target].clone()
        };
        self.notify(Update::new(Action::Pop, location))
    }

    pub fn back(&self) -> anyhow::Result<()> {
        self.go(-1)
    }

    pub fn forward(&self) -> anyhow::Result<()> {
        self.go(1)
    }

    fn notify(&self, update: Update) -> anyhow::Result<()> {
        let listeners: Vec<Listener> = self.listeners.lock().values().cloned().collect();
        tracing::trace!(
            action = ?update.action,
            location = %update.location,
            listeners = listeners.len(),
            "history changed"
        );

        listeners
            .iter()
            .map(|listener| listener(&update))
            .fold(Ok(()), |first, result| first.and(result))
    }
}

impl History for MemoryHistory {
    fn location(&self) -> Location {
        let stack = self.stack.lock();
        stack.entries[stack.index].clone()
    }

    fn listen(&self, listener: Listener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, listener);
        id
    }

    fn unlisten(&self, id: ListenerId) {
        self.listeners.lock().remove(&id);
    }

    fn push(&self, to: Location) -> anyhow::Result<()> {
        {
            let mut stack = self.stack.lock();
            let next = stack.index + 1;
            stack.entries.truncate(next);
            stack.entries.push(to.clone());
            stack.index = next;
        }
        self.notify(Update::new(Action::Push, to))
    }

    fn replace(&self, to: Location) -> anyhow::Result<()> {
        {
            let mut stack = self.stack.lock();
            let index = stack.index;
            stack.entries[index] = to.clone();
        }
        self.notify(Update::new(Action::Replace, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(history: &MemoryHistory) -> Arc<Mutex<Vec<Update>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        history.listen(Arc::new(move |update: &Update| -> anyhow::Result<()> {
            sink.lock().push(update.clone());
            Ok(())
        }));
        seen
    }

    #[test]
    fn test_defaults_to_root() {
        let history = MemoryHistory::default();
        assert_eq!(history.location(), Location::new("/", "", ""));
        assert_eq!(MemoryHistory::new(Vec::<String>::new()).len(), 1);
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let history = MemoryHistory::new(["/a", "/b", "/c"]);
        history.go(-2).unwrap();
        assert_eq!(history.location().pathname, "/a");

        history.push("/d".into()).unwrap();
        let paths: Vec<String> = history.entries().into_iter().map(|l| l.pathname).collect();
        assert_eq!(paths, vec!["/a", "/d"]);
        assert_eq!(history.index(), 1);
    }

    #[test]
    fn test_replace_keeps_length() {
        let history = MemoryHistory::new(["/a", "/b"]);
        let seen = recorder(&history);
        history.replace("/c#x".into()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.location().href(), "/c#x");
        assert_eq!(seen.lock()[0], Update::new(Action::Replace, "/c#x"));
    }

    #[test]
    fn test_go_clamps_and_skips_noop() {
        let history = MemoryHistory::with_index(["/a", "/b", "/c"], 1);
        let seen = recorder(&history);

        history.go(10).unwrap();
        assert_eq!(history.location().pathname, "/c");
        history.forward().unwrap();
        history.go(-10).unwrap();
        assert_eq!(history.location().pathname, "/a");
        history.back().unwrap();

        let actions: Vec<Action> = seen.lock().iter().map(|u| u.action).collect();
        assert_eq!(actions, vec![Action::Pop, Action::Pop]);
    }

    #[test]
    fn test_unlisten_stops_notifications() {
        let history = MemoryHistory::default();
        let seen = Arc::new(Mutex::new(0));
        let sink = seen.clone();
        let id = history.listen(Arc::new(move |_: &Update| -> anyhow::Result<()> {
            *sink.lock() += 1;
            Ok(())
        }));

        history.push("/one".into()).unwrap();
        history.unlisten(id);
        history.push("/two".into()).unwrap();
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn test_listener_errors_surface_after_all_listeners_ran() {
        let history = MemoryHistory::default();
        history.listen(Arc::new(|_: &Update| -> anyhow::Result<()> {
            Err(anyhow::anyhow!("listener failed"))
        }));
        let seen = recorder(&history);

        let err = history.push("/next".into()).unwrap_err();
        assert!(err.to_string().contains("listener failed"));
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(history.location().pathname, "/next");
    }

    #[test]
    fn test_listener_may_navigate() {
        let history = Arc::new(MemoryHistory::default());
        let weak = Arc::downgrade(&history);
        history.listen(Arc::new(move |update: &Update| -> anyhow::Result<()> {
            if update.location.pathname == "/old" {
                if let Some(history) = weak.upgrade() {
                    history.replace("/new".into())?;
                }
            }
            Ok(())
        }));

        history.push("/old".into()).unwrap();
        assert_eq!(history.location().pathname, "/new");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_update_serializes_action_uppercase() {
        let value = serde_json::to_value(Update::new(Action::Push, "/a")).unwrap();
        assert_eq!(value["action"], "PUSH");
        assert_eq!(value["location"]["pathname"], "/a");
    }
}
