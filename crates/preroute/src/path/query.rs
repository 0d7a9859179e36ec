/// Query-string codec
///
/// Decoding aggregates repeated keys; encoding produces a canonical,
/// case-insensitively sorted string in one of two flavours:
/// - [`stringify_search`]: repeated keys (`?a=1&a=2`), used for location comparison
/// - [`request_signature`]: comma-joined values (`?a=1,2`), used for cache keys

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A query parameter value: one occurrence or several
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multiple(Vec<String>),
}

/// Parsed query parameters keyed by (undecoded) name
pub type SearchParams = HashMap<String, QueryValue>;

impl QueryValue {
    /// First value in encounter order
    pub fn first(&self) -> &str {
        match self {
            QueryValue::Single(value) => value,
            QueryValue::Multiple(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// All values in encounter order
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(value) => vec![value.as_str()],
            QueryValue::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Adds another occurrence, promoting a single value to a list
    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(first) => {
                let first = std::mem::take(first);
                *self = QueryValue::Multiple(vec![first, value]);
            }
            QueryValue::Multiple(values) => values.push(value),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::Multiple(values)
    }
}

/// Percent-decodes a component, keeping the raw text when it is not valid UTF-8
pub(crate) fn decode_component(value: &str) -> Cow<'_, str> {
    urlencoding::decode(value).unwrap_or(Cow::Borrowed(value))
}

/// Parses a query string into a map
///
/// # Examples
///
/// ```
/// use preroute::{decode_query, QueryValue};
///
/// let params = decode_query("?fruit=apple&fruit=pear&q=a%20b");
/// assert_eq!(params["q"], QueryValue::Single("a b".into()));
/// assert_eq!(params["fruit"].values(), vec!["apple", "pear"]);
/// assert!(decode_query("").is_empty());
/// ```
pub fn decode_query(search: &str) -> SearchParams {
    let trimmed = search.strip_prefix('?').unwrap_or(search);

    trimmed
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (!key.is_empty()).then_some((key, value))
        })
        .fold(SearchParams::new(), |mut params, (key, value)| {
            let value = decode_component(value).into_owned();
            match params.get_mut(key) {
                Some(existing) => existing.push(value),
                None => {
                    params.insert(key.to_string(), QueryValue::Single(value));
                }
            }
            params
        })
}

/// Keys sorted case-insensitively, ties broken by exact key
fn sorted_keys(params: &SearchParams) -> Vec<&String> {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
    keys
}

fn sorted_encoded_values(value: &QueryValue) -> Vec<String> {
    let mut values: Vec<&str> = value.values();
    values.sort_unstable();
    values
        .into_iter()
        .map(|v| urlencoding::encode(v).into_owned())
        .collect()
}

fn join_pairs(pairs: Vec<String>) -> String {
    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

/// Canonical query string with repeated keys for multi-values
///
/// # Examples
///
/// ```
/// use preroute::{decode_query, stringify_search};
///
/// let params = decode_query("?red=red&fruits=orange&fruits=apple&blue=blue");
/// assert_eq!(stringify_search(&params), "?blue=blue&fruits=apple&fruits=orange&red=red");
/// ```
pub fn stringify_search(params: &SearchParams) -> String {
    let pairs = sorted_keys(params)
        .into_iter()
        .flat_map(|key| {
            sorted_encoded_values(&params[key])
                .into_iter()
                .map(move |value| format!("{}={}", key, value))
        })
        .collect();

    join_pairs(pairs)
}

/// Canonical query string with comma-joined multi-values
///
/// Used as the identity of a request so identical preloads are not issued twice.
///
/// # Examples
///
/// ```
/// use preroute::{decode_query, request_signature};
///
/// let params = decode_query("?b=2&a=z&a=y");
/// assert_eq!(request_signature(&params), "?a=y,z&b=2");
/// ```
pub fn request_signature(params: &SearchParams) -> String {
    let pairs = sorted_keys(params)
        .into_iter()
        .map(|key| format!("{}={}", key, sorted_encoded_values(&params[key]).join(",")))
        .collect();

    join_pairs(pairs)
}
