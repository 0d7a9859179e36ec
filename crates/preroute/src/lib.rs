//! # preroute
//!
//! Route matching and preloading for single-page applications:
//! - Static routes (`/about`)
//! - Dynamic parameters (`/users/:id`)
//! - Wildcards (`/docs/*`, captured as `$rest`)
//! - Nested route trees with inherited redirect rules
//! - View code and data preloading with a one-entry dedup cache
//!
//! ## Flow
//!
//! A history change is parsed into a [`Location`], resolved against the
//! [`RouteTable`] (following redirects), prepared by the [`Preparer`] (which
//! starts the loads) and published by the [`Router`] as the current
//! [`PreparedEntry`].
//!
//! ## Resolution order
//!
//! 1. Exact pattern lookup
//! 2. First matching pattern in registration order, skipping `/*`
//! 3. The `/*` catch-all
//!
//! ## Example
//!
//! ```
//! use preroute::{create_memory_router, History, PreloadRequest, RouteConfig, RouterOptions};
//!
//! let routes: Vec<RouteConfig<&'static str, String>> = vec![
//!     RouteConfig::new("/", || async { Ok("home") }),
//!     RouteConfig::new("/users/:id", || async { Ok("user") }).with_preload(|params, _| {
//!         let id = params["id"].clone();
//!         PreloadRequest::new().with_loader("profile", move || {
//!             let id = id.clone();
//!             async move { Ok(format!("profile of {}", id)) }
//!         })
//!     }),
//!     RouteConfig::new("/*", || async { Ok("not found") }),
//! ];
//!
//! let options = RouterOptions::default().with_assist_preload(true);
//! let router = create_memory_router(routes, options, ["/"]).unwrap();
//!
//! router.history().push("/users/42".into()).unwrap();
//! let entry = router.get();
//! assert_eq!(entry.key, "/users/:id");
//! assert_eq!(entry.params["id"], "42");
//!
//! let profile = entry.preloaded.assisted().unwrap().get("profile").unwrap();
//! assert_eq!(profile.data.read().unwrap(), "profile of 42");
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod config;
pub mod error;
pub mod history;
pub mod logger;
pub mod path;
pub mod prepare;
pub mod resolve;
pub mod resource;
pub mod route;
pub mod router;

// Re-export public types
pub use config::RouterOptions;
pub use error::{LoadError, Result, RouterError};
pub use history::{Action, History, Listener, ListenerId, MemoryHistory, Update};
pub use logger::{LogLevel, LogRecord, Logger, NoopLogger, TracingLogger};
pub use path::{
    create_href, decode_query, locations_match, request_signature, stringify_search, Location,
    PartialLocation, QueryValue, SearchParams,
};
pub use prepare::{params_signature, Preloaded, PreloadedItem, PreloadedMap, PreparedEntry, Preparer};
pub use resolve::{resolve, MatchedRoute, DEFAULT_MAX_REDIRECTS};
pub use resource::{Loadable, LoadFuture, Loader, ReadError, Resource, ResourceStatus};
pub use route::{
    match_pattern, Matcher, Params, PreloadFn, PreloadRequest, PreloadSource, RedirectRule,
    RouteConfig, RouteEntry, RouteTable, REST_PARAM,
};
pub use router::{create_memory_router, Router, Subscription, SubscriptionHandle};
