//! Error types for route resolution and resource loading

use std::fmt;
use std::sync::Arc;

/// Result alias used throughout the router
pub type Result<T, E = RouterError> = std::result::Result<T, E>;

/// Configuration and resolution failures
///
/// Every variant signals a caller misconfiguration: they are raised while
/// building the route table or resolving a location and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The route configuration contained no routes at all
    #[error("At least one route must be provided.")]
    EmptyRoutes,

    /// The requested location had no pathname to match against
    #[error("Unable to determine pathname from given location")]
    MissingPathname,

    /// Nothing matched the pathname and no `/*` route is registered
    #[error(
        "No route found for requested path '{pathname}'. Ensure you have a wildcard (*) route to catch-all non-matching paths."
    )]
    NoRouteFound { pathname: String },

    /// Redirect rules kept redirecting past the configured limit
    #[error("Redirect loop detected while resolving '{path}' (more than {limit} redirects)")]
    RedirectLoop { path: String, limit: usize },

    /// The navigation history refused to apply a correction
    #[error("Failed to update navigation history")]
    History(#[source] anyhow::Error),

    /// A route pattern could not be compiled into a matcher
    #[error("Invalid route pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A failed view or preload load
///
/// Cheap to clone so a settled [`Resource`](crate::Resource) can hand the same
/// failure to every reader.
#[derive(Clone)]
pub struct LoadError(Arc<anyhow::Error>);

impl LoadError {
    /// Wraps any error produced by a loader
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(error.into()))
    }

    /// The underlying loader error
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl From<anyhow::Error> for LoadError {
    fn from(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource failed to load: {:#}", self.0)
    }
}

impl fmt::Debug for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LoadError").field(&self.0).finish()
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&**self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_route_message_mentions_catch_all() {
        let err = RouterError::NoRouteFound {
            pathname: "/foo".to_string(),
        };
        let message = err.to_string().to_lowercase();
        assert!(message.contains("no route found"));
        assert!(message.contains("wildcard"));
        assert!(message.contains("catch-all"));
    }

    #[test]
    fn test_load_error_clones_share_source() {
        let err = LoadError::new(anyhow::anyhow!("network down"));
        let copy = err.clone();
        assert!(copy.to_string().contains("network down"));
        assert!(Arc::ptr_eq(&err.0, &copy.0));
    }
}
