/// Flattened route registry
///
/// Keeps registration order (depth-first pre-order), which is the
/// tie-break order when several patterns match the same pathname.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::json;

use super::{Matcher, RedirectRule, RouteConfig, RouteEntry};
use crate::error::{Result, RouterError};
use crate::logger::{LogRecord, Logger};
use crate::path::canonical_path;
use crate::resource::{Loadable, Resource};

/// Pattern of the catch-all route
pub const CATCH_ALL: &str = "/*";

/// Ordered routes plus an index for exact lookups
pub struct RouteTable<V, D = ()> {
    entries: Vec<(String, Arc<RouteEntry<V, D>>)>,
    index: HashMap<String, usize>,
}

/// Joins a parent pattern with a child path
///
/// The root pattern `/` contributes nothing, an empty child path contributes
/// nothing, and a child path always gets a leading `/`.
fn join_patterns(parent: &str, path: &str) -> String {
    let parent = if parent == "/" { "" } else { parent };
    let own = if path.is_empty() {
        "".into()
    } else {
        canonical_path(path)
    };

    match format!("{}{}", parent, own) {
        joined if joined.is_empty() => "/".to_string(),
        joined => joined,
    }
}

impl<V: Loadable, D> RouteTable<V, D> {
    /// Flattens a configuration tree
    ///
    /// Every view loader is wrapped in its own [`Resource`] and every pattern
    /// is compiled once. Redirect rules are inherited by descendants that do
    /// not set their own.
    ///
    /// # Errors
    ///
    /// [`RouterError::EmptyRoutes`] for an empty configuration and
    /// [`RouterError::InvalidPattern`] when a pattern fails to compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use preroute::{NoopLogger, RouteConfig, RouteTable};
    ///
    /// let routes: Vec<RouteConfig<&'static str>> = vec![
    ///     RouteConfig::new("/", || async { Ok("home") })
    ///         .with_child(RouteConfig::new("about", || async { Ok("about") })),
    ///     RouteConfig::new("/*", || async { Ok("not found") }),
    /// ];
    ///
    /// let table = RouteTable::build(routes, &NoopLogger).unwrap();
    /// assert_eq!(table.patterns().collect::<Vec<_>>(), vec!["/", "/about", "/*"]);
    /// ```
    pub fn build(configs: Vec<RouteConfig<V, D>>, logger: &dyn Logger) -> Result<Self> {
        if configs.is_empty() {
            return Err(RouterError::EmptyRoutes);
        }

        let mut table = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };

        for config in configs {
            table.register(config, "", None, logger)?;
        }

        if !table.index.contains_key(CATCH_ALL) {
            logger.log(
                &LogRecord::warn(
                    "table",
                    "You didn't set a wildcard (*) route to catch any unmatched path. \
                     This is required to make sure you push users to a Not Found page \
                     when they request a route that doesn't exist; e.g. 404.",
                )
                .with_context(json!({ "routes": table.len() })),
            );
        }

        tracing::debug!(routes = table.len(), "route table built");
        Ok(table)
    }

    fn register(
        &mut self,
        config: RouteConfig<V, D>,
        parent: &str,
        inherited: Option<&RedirectRule>,
        logger: &dyn Logger,
    ) -> Result<()> {
        let RouteConfig {
            path,
            view,
            preload,
            redirect,
            children,
        } = config;

        let pattern = join_patterns(parent, &path);
        let redirect = redirect.or_else(|| inherited.cloned());

        let entry = RouteEntry {
            matcher: Matcher::compile(&pattern)?,
            pattern: pattern.clone(),
            view: Resource::from_loader(view),
            preload,
            redirect: redirect.clone(),
        };
        self.insert(entry, logger);

        children
            .into_iter()
            .try_for_each(|child| self.register(child, &pattern, redirect.as_ref(), logger))
    }

    fn insert(&mut self, entry: RouteEntry<V, D>, logger: &dyn Logger) {
        let pattern = entry.pattern.clone();
        let entry = Arc::new(entry);

        match self.index.get(&pattern) {
            Some(&position) => {
                logger.log(&LogRecord::warn(
                    "table",
                    format!(
                        "Route '{}' was registered more than once; the last definition wins.",
                        pattern
                    ),
                ));
                self.entries[position].1 = entry;
            }
            None => {
                self.index.insert(pattern.clone(), self.entries.len());
                self.entries.push((pattern, entry));
            }
        }
    }
}

impl<V, D> RouteTable<V, D> {
    /// O(1) lookup by full pattern
    pub fn get(&self, pattern: &str) -> Option<&Arc<RouteEntry<V, D>>> {
        self.index
            .get(pattern)
            .map(|&position| &self.entries[position].1)
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.index.contains_key(pattern)
    }

    /// The catch-all entry, when registered
    pub fn catch_all(&self) -> Option<&Arc<RouteEntry<V, D>>> {
        self.get(CATCH_ALL)
    }

    /// Entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<RouteEntry<V, D>>)> {
        self.entries
            .iter()
            .map(|(pattern, entry)| (pattern.as_str(), entry))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(pattern, _)| pattern.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V, D> fmt::Debug for RouteTable<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.patterns()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use crate::path::SearchParams;
    use crate::route::Params;
    use parking_lot::Mutex;

    fn view(name: &'static str) -> RouteConfig<&'static str> {
        RouteConfig::new("", move || async move { Ok(name) })
    }

    fn route(path: &str, name: &'static str) -> RouteConfig<&'static str> {
        RouteConfig {
            path: path.to_string(),
            ..view(name)
        }
    }

    #[test]
    fn test_join_patterns() {
        assert_eq!(join_patterns("", "/"), "/");
        assert_eq!(join_patterns("/", "about"), "/about");
        assert_eq!(join_patterns("/", "/about"), "/about");
        assert_eq!(join_patterns("/users", ":id"), "/users/:id");
        assert_eq!(join_patterns("/users", ""), "/users");
        assert_eq!(join_patterns("", ""), "/");
    }

    #[test]
    fn test_empty_configuration_is_rejected() {
        let result = RouteTable::<&'static str>::build(Vec::new(), &NoopLogger);
        assert!(matches!(result, Err(RouterError::EmptyRoutes)));
    }

    #[test]
    fn test_depth_first_order() {
        let routes = vec![
            route("/", "root").with_children(vec![
                route("users", "users").with_child(route(":id", "user")),
                route("about", "about"),
            ]),
            route("/*", "missing"),
        ];
        let table = RouteTable::build(routes, &NoopLogger).unwrap();
        assert_eq!(
            table.patterns().collect::<Vec<_>>(),
            vec!["/", "/users", "/users/:id", "/about", "/*"]
        );
        assert!(table.catch_all().is_some());
        assert_eq!(table.get("/users/:id").unwrap().matcher.pattern(), "/users/:id");
    }

    #[test]
    fn test_duplicate_pattern_replaces_in_place() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let logger = move |record: &LogRecord| sink.lock().push(record.message.clone());

        let first = route("/a", "first");
        let second = route("/a", "second");
        let table = RouteTable::build(
            vec![first, route("/b", "b"), second, route("/*", "missing")],
            &logger,
        )
        .unwrap();

        assert_eq!(table.patterns().collect::<Vec<_>>(), vec!["/a", "/b", "/*"]);
        let entry = table.get("/a").unwrap();
        assert_eq!(futures::executor::block_on(entry.view.load()).unwrap(), "second");
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_missing_catch_all_warns_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let logger = move |record: &LogRecord| sink.lock().push(record.clone());

        RouteTable::build(vec![route("/", "root"), route("/about", "about")], &logger).unwrap();

        let records = seen.lock();
        assert_eq!(records.len(), 1);
        let message = records[0].message.to_lowercase();
        for needle in ["wildcard", "route", "not found", "404"] {
            assert!(message.contains(needle), "missing '{}' in {}", needle, message);
        }
    }

    #[test]
    fn test_redirect_rules_are_inherited_by_reference() {
        let rule: RedirectRule =
            Arc::new(|_: &Params, _: &SearchParams| Some("/login".to_string()));
        let own: RedirectRule = Arc::new(|_: &Params, _: &SearchParams| None);

        let routes = vec![
            route("/account", "account")
                .with_redirect_rule(rule.clone())
                .with_children(vec![
                    route("settings", "settings").with_child(route("email", "email")),
                    route("public", "public").with_redirect_rule(own.clone()),
                ]),
            route("/*", "missing"),
        ];
        let table = RouteTable::build(routes, &NoopLogger).unwrap();

        let redirect_of = |pattern: &str| table.get(pattern).unwrap().redirect.clone().unwrap();
        assert!(Arc::ptr_eq(&redirect_of("/account"), &rule));
        assert!(Arc::ptr_eq(&redirect_of("/account/settings"), &rule));
        assert!(Arc::ptr_eq(&redirect_of("/account/settings/email"), &rule));
        assert!(Arc::ptr_eq(&redirect_of("/account/public"), &own));
        assert!(table.get("/*").unwrap().redirect.is_none());
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let table = RouteTable::build(vec![route("/bad/(", "bad")], &NoopLogger).unwrap();
        let matcher = &table.get("/bad/(").unwrap().matcher;
        assert!(matcher.matches("/bad/(", &NoopLogger).is_some());
        assert!(matcher.matches("/bad/x", &NoopLogger).is_none());
    }
}
