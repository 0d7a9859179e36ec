//! Location → route resolution
//!
//! Resolution order for a pathname:
//! 1. exact pattern lookup (static routes, O(1))
//! 2. first pattern in registration order that matches, skipping `/*`
//! 3. the `/*` catch-all
//!
//! The matched route's redirect rule is then consulted and, when it yields a
//! target, resolution starts over from that target.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, RouterError};
use crate::logger::Logger;
use crate::path::{Location, SearchParams};
use crate::route::table::CATCH_ALL;
use crate::route::{Params, RouteEntry, RouteTable};

/// Default bound on the length of a redirect chain
pub const DEFAULT_MAX_REDIRECTS: usize = 32;

/// The terminal (non-redirecting) match for a location
pub struct MatchedRoute<V, D = ()> {
    /// Pattern of the matched route, or the pathname itself on an exact hit
    pub key: String,
    /// The location that matched, after any redirects
    pub location: Location,
    pub params: Params,
    pub search: SearchParams,
    pub route: Arc<RouteEntry<V, D>>,
}

impl<V, D> Clone for MatchedRoute<V, D> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            location: self.location.clone(),
            params: self.params.clone(),
            search: self.search.clone(),
            route: Arc::clone(&self.route),
        }
    }
}

impl<V, D> fmt::Debug for MatchedRoute<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchedRoute")
            .field("key", &self.key)
            .field("location", &self.location)
            .field("params", &self.params)
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}

/// Finds the entry for a pathname without following redirects
fn find_entry<'a, V, D>(
    table: &'a RouteTable<V, D>,
    pathname: &str,
    logger: &dyn Logger,
) -> Option<(&'a str, &'a Arc<RouteEntry<V, D>>, Params)> {
    if let Some(entry) = table.get(pathname) {
        return Some((entry.pattern.as_str(), entry, Params::new()));
    }

    table
        .iter()
        .filter(|(pattern, _)| *pattern != CATCH_ALL)
        .find_map(|(pattern, entry)| {
            entry
                .matcher
                .matches(pathname, logger)
                .map(|params| (pattern, entry, params))
        })
        .or_else(|| {
            table
                .catch_all()
                .map(|entry| (CATCH_ALL, entry, Params::new()))
        })
}

/// Resolves a location to its terminal route, following redirects
///
/// Each redirect rule is called once per visit with the matched params and
/// the parsed query of the location being resolved.
///
/// # Errors
///
/// - [`RouterError::MissingPathname`] if the location has no pathname
/// - [`RouterError::NoRouteFound`] if nothing matches and no `/*` exists
/// - [`RouterError::RedirectLoop`] if more than `max_redirects` redirects occur
///
/// # Examples
///
/// ```
/// use preroute::{resolve, NoopLogger, RouteConfig, RouteTable};
///
/// let routes: Vec<RouteConfig<&'static str>> = vec![
///     RouteConfig::new("/users/:id", || async { Ok("user") }),
///     RouteConfig::new("/*", || async { Ok("not found") }),
/// ];
/// let table = RouteTable::build(routes, &NoopLogger).unwrap();
///
/// let matched = resolve(&table, "/users/42?tab=posts", 32, &NoopLogger).unwrap();
/// assert_eq!(matched.key, "/users/:id");
/// assert_eq!(matched.params["id"], "42");
/// assert_eq!(matched.search["tab"].first(), "posts");
///
/// assert_eq!(resolve(&table, "/nope", 32, &NoopLogger).unwrap().key, "/*");
/// ```
pub fn resolve<V, D>(
    table: &RouteTable<V, D>,
    to: impl Into<Location>,
    max_redirects: usize,
    logger: &dyn Logger,
) -> Result<MatchedRoute<V, D>> {
    let mut location: Location = to.into();
    let mut redirects = 0;

    loop {
        if location.pathname.is_empty() {
            return Err(RouterError::MissingPathname);
        }

        let search = location.search_params();
        let (key, entry, params) = find_entry(table, &location.pathname, logger).ok_or_else(
            || RouterError::NoRouteFound {
                pathname: location.pathname.clone(),
            },
        )?;

        let Some(target) = entry.redirect_target(&params, &search) else {
            tracing::debug!(
                pathname = %location.pathname,
                key,
                redirects,
                "location resolved"
            );
            return Ok(MatchedRoute {
                key: key.to_string(),
                location,
                params,
                search,
                route: Arc::clone(entry),
            });
        };

        if redirects >= max_redirects {
            return Err(RouterError::RedirectLoop {
                path: target,
                limit: max_redirects,
            });
        }

        tracing::debug!(from = %location.pathname, to = %target, "following redirect");
        redirects += 1;
        location = Location::parse(&target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use crate::path::QueryValue;
    use crate::route::RouteConfig;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn route(path: &str) -> RouteConfig<String> {
        let name = path.to_string();
        RouteConfig::new(path, move || {
            let name = name.clone();
            async move { Ok(name) }
        })
    }

    fn table(routes: Vec<RouteConfig<String>>) -> RouteTable<String> {
        RouteTable::build(routes, &NoopLogger).unwrap()
    }

    #[rstest]
    #[case("/", "/")]
    #[case("/about", "/about")]
    #[case("/about/", "/about")]
    #[case("/users/7", "/users/:id")]
    #[case("/users/new", "/users/new")]
    #[case("/users/7/posts/3", "/users/:id/posts/:post")]
    #[case("/files/a/b/c", "/files/*")]
    #[case("/unknown/path", "/*")]
    fn test_resolution_order(#[case] pathname: &str, #[case] expected: &str) {
        let table = table(vec![
            route("/"),
            route("/about"),
            route("/users/:id"),
            route("/users/new"),
            route("/users/:id/posts/:post"),
            route("/files/*"),
            route("/*"),
        ]);
        assert_eq!(resolve(&table, pathname, 32, &NoopLogger).unwrap().key, expected);
    }

    #[test]
    fn test_first_registered_pattern_wins() {
        let table = table(vec![route("/:a"), route("/:b"), route("/*")]);
        let matched = resolve(&table, "/x", 32, &NoopLogger).unwrap();
        assert_eq!(matched.key, "/:a");
        assert_eq!(matched.params["a"], "x");
    }

    #[test]
    fn test_catch_all_is_not_scanned_early() {
        let table = table(vec![route("/*"), route("/users/:id")]);
        assert_eq!(resolve(&table, "/users/9", 32, &NoopLogger).unwrap().key, "/users/:id");
    }

    #[test]
    fn test_missing_pathname() {
        let table = table(vec![route("/*")]);
        assert!(matches!(
            resolve(&table, "?x=1", 32, &NoopLogger),
            Err(RouterError::MissingPathname)
        ));
    }

    #[test]
    fn test_no_route_found() {
        let table = table(vec![route("/known")]);
        let err = resolve(&table, "/unknown", 32, &NoopLogger).unwrap_err();
        assert!(matches!(err, RouterError::NoRouteFound { .. }));
        let message = err.to_string();
        assert!(message.contains("wildcard"));
        assert!(message.contains("catch-all"));
    }

    #[test]
    fn test_redirect_invoked_once_with_params_and_search() {
        let calls = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let table = table(vec![
            route("/user").with_redirect(move |params, search| {
                sink.lock().push((params.clone(), search.clone()));
                Some("/login".to_string())
            }),
            route("/login"),
            route("/*"),
        ]);

        let matched = resolve(&table, "/user?foo=bar", 32, &NoopLogger).unwrap();
        assert_eq!(matched.key, "/login");
        assert_eq!(matched.location, Location::new("/login", "", ""));

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Params::new());
        let mut expected = SearchParams::new();
        expected.insert("foo".to_string(), QueryValue::Single("bar".to_string()));
        assert_eq!(calls[0].1, expected);
    }

    #[test]
    fn test_redirect_receives_dynamic_params() {
        let table = table(vec![
            route("/old/:id").with_redirect(|params, _| Some(format!("/new/{}", params["id"]))),
            route("/new/:id"),
            route("/*"),
        ]);
        let matched = resolve(&table, "/old/5", 32, &NoopLogger).unwrap();
        assert_eq!(matched.key, "/new/:id");
        assert_eq!(matched.params["id"], "5");
    }

    #[test]
    fn test_redirect_none_or_empty_keeps_match() {
        let table = table(vec![
            route("/a").with_redirect(|_, _| None),
            route("/b").with_redirect(|_, _| Some(String::new())),
            route("/*"),
        ]);
        assert_eq!(resolve(&table, "/a", 32, &NoopLogger).unwrap().key, "/a");
        assert_eq!(resolve(&table, "/b", 32, &NoopLogger).unwrap().key, "/b");
    }

    #[test]
    fn test_redirect_loop_is_bounded() {
        let table = table(vec![
            route("/ping").with_redirect(|_, _| Some("/pong".to_string())),
            route("/pong").with_redirect(|_, _| Some("/ping".to_string())),
            route("/*"),
        ]);
        match resolve(&table, "/ping", 4, &NoopLogger) {
            Err(RouterError::RedirectLoop { limit, .. }) => assert_eq!(limit, 4),
            other => panic!("expected redirect loop, got {:?}", other),
        }
    }

    #[test]
    fn test_chain_within_limit_resolves() {
        let table = table(vec![
            route("/a").with_redirect(|_, _| Some("/b".to_string())),
            route("/b").with_redirect(|_, _| Some("/c?from=b#top".to_string())),
            route("/c"),
            route("/*"),
        ]);
        let matched = resolve(&table, "/a", 2, &NoopLogger).unwrap();
        assert_eq!(matched.key, "/c");
        assert_eq!(matched.location.href(), "/c?from=b#top");
        assert!(resolve(&table, "/a", 1, &NoopLogger).is_err());
    }
}
