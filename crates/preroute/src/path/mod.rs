/// Location parsing and comparison
///
/// All functions are **pure**: given same input, always produce same output with no side effects.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod query;
pub use query::{decode_query, request_signature, stringify_search, QueryValue, SearchParams};

/// A parsed location: `pathname`, `search` (with leading `?`) and `hash` (with leading `#`)
///
/// # Examples
///
/// ```
/// use preroute::Location;
///
/// let location = Location::parse("/about?x=1#team");
/// assert_eq!(location.pathname, "/about");
/// assert_eq!(location.search, "?x=1");
/// assert_eq!(location.hash, "#team");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub pathname: String,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub hash: String,
}

/// A location fragment where any part may be missing
///
/// Missing parts become empty strings when converted into a [`Location`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialLocation {
    pub pathname: Option<String>,
    pub search: Option<String>,
    pub hash: Option<String>,
}

impl Location {
    pub fn new(
        pathname: impl Into<String>,
        search: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            pathname: pathname.into(),
            search: search.into(),
            hash: hash.into(),
        }
    }

    /// Splits a path string into its parts
    ///
    /// The hash is everything from the first `#`, the search is everything
    /// from the first `?` before that, and the remainder is the pathname.
    ///
    /// # Examples
    ///
    /// ```
    /// use preroute::Location;
    ///
    /// assert_eq!(Location::parse("/a#h?x").search, "");
    /// assert_eq!(Location::parse("?x=1").pathname, "");
    /// assert_eq!(Location::parse(""), Location::default());
    /// ```
    pub fn parse(path: &str) -> Self {
        let (rest, hash) = match path.find('#') {
            Some(index) => path.split_at(index),
            None => (path, ""),
        };
        let (pathname, search) = match rest.find('?') {
            Some(index) => rest.split_at(index),
            None => (rest, ""),
        };

        Self::new(pathname, search, hash)
    }

    /// Renders the location back into a path string
    ///
    /// Adds the `?` / `#` prefix when a non-empty search or hash lacks it.
    ///
    /// # Examples
    ///
    /// ```
    /// use preroute::Location;
    ///
    /// let location = Location::new("/search", "q=rust", "top");
    /// assert_eq!(location.href(), "/search?q=rust#top");
    /// ```
    pub fn href(&self) -> String {
        let search = prefixed(&self.search, '?');
        let hash = prefixed(&self.hash, '#');
        format!("{}{}{}", self.pathname, search, hash)
    }

    /// Parsed query parameters of this location
    pub fn search_params(&self) -> SearchParams {
        decode_query(&self.search)
    }
}

fn prefixed(value: &str, prefix: char) -> Cow<'_, str> {
    if value.is_empty() || value.starts_with(prefix) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("{}{}", prefix, value))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

impl From<&str> for Location {
    fn from(path: &str) -> Self {
        Location::parse(path)
    }
}

impl From<String> for Location {
    fn from(path: String) -> Self {
        Location::parse(&path)
    }
}

impl From<&String> for Location {
    fn from(path: &String) -> Self {
        Location::parse(path)
    }
}

impl From<&Location> for Location {
    fn from(location: &Location) -> Self {
        location.clone()
    }
}

impl From<PartialLocation> for Location {
    fn from(partial: PartialLocation) -> Self {
        Self {
            pathname: partial.pathname.unwrap_or_default(),
            search: partial.search.unwrap_or_default(),
            hash: partial.hash.unwrap_or_default(),
        }
    }
}

/// Renders anything location-like as a path string
///
/// # Examples
///
/// ```
/// use preroute::path::{create_href, PartialLocation};
///
/// let partial = PartialLocation {
///     pathname: Some("/docs".to_string()),
///     hash: Some("intro".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(create_href(partial), "/docs#intro");
/// ```
pub fn create_href(to: impl Into<Location>) -> String {
    to.into().href()
}

/// Adds a leading slash when not already present
///
/// # Examples
///
/// ```
/// use preroute::path::canonical_path;
///
/// assert_eq!(canonical_path("about"), "/about");
/// assert_eq!(canonical_path("/about"), "/about");
/// ```
pub fn canonical_path(path: &str) -> Cow<'_, str> {
    if path.starts_with('/') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("/{}", path))
    }
}

/// Compares two locations
///
/// Pathnames must be equal. With `exact`, the query strings must also be
/// equal once canonicalized (key order does not matter) and the hashes must
/// be identical.
///
/// # Examples
///
/// ```
/// use preroute::path::locations_match;
///
/// assert!(locations_match("/a?x=1&y=2", "/a?y=2&x=1", true));
/// assert!(locations_match("/a?x=1", "/a?x=2", false));
/// assert!(!locations_match("/a", "/b", false));
/// ```
pub fn locations_match(left: impl Into<Location>, right: impl Into<Location>, exact: bool) -> bool {
    let left = left.into();
    let right = right.into();

    if left.pathname != right.pathname {
        return false;
    }

    if !exact {
        return true;
    }

    stringify_search(&decode_query(&left.search)) == stringify_search(&decode_query(&right.search))
        && left.hash == right.hash
}
