/// Pattern compilation and matching for route paths
///
/// A pattern is literal text plus two kinds of captures:
/// - `:name` captures one or more characters up to the next `/`
/// - `*` captures one or more characters of anything, stored as `$rest`
///
/// Literal text is matched verbatim (regex metacharacters are escaped), so
/// patterns such as `/:foo/file/prefix-*.:extension` work as expected.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{Result, RouterError};
use crate::logger::{LogRecord, Logger};
use crate::path::canonical_path;
use crate::path::query::decode_component;

/// Synthetic parameter name for wildcard captures
pub const REST_PARAM: &str = "$rest";

/// Captured route parameters keyed by name
pub type Params = HashMap<String, String>;

/// Represents the pieces a route pattern is made of
#[derive(Debug, Clone, PartialEq)]
pub enum PatternSegmentType {
    /// Literal text, matched exactly
    Static(String),
    /// `:name` capture, bounded by `/`
    Param(String),
    /// `*` capture, unbounded
    Wildcard,
}

impl PatternSegmentType {
    fn param_name(&self) -> Option<&str> {
        match self {
            PatternSegmentType::Static(_) => None,
            PatternSegmentType::Param(name) => Some(name),
            PatternSegmentType::Wildcard => Some(REST_PARAM),
        }
    }

    fn to_regex(&self) -> String {
        match self {
            PatternSegmentType::Static(text) => regex::escape(text),
            PatternSegmentType::Param(_) => "([^/]+)".to_string(),
            PatternSegmentType::Wildcard => "(.+)".to_string(),
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Splits a raw pattern into typed segments (pure function)
///
/// A `:` that is not followed by a name character stays literal.
///
/// # Examples
///
/// ```
/// use preroute::route::pattern::{classify_segments, PatternSegmentType};
///
/// let segments = classify_segments("/users/:id/*");
/// assert_eq!(
///     segments,
///     vec![
///         PatternSegmentType::Static("/users/".to_string()),
///         PatternSegmentType::Param("id".to_string()),
///         PatternSegmentType::Static("/".to_string()),
///         PatternSegmentType::Wildcard,
///     ]
/// );
/// ```
pub fn classify_segments(pattern: &str) -> Vec<PatternSegmentType> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        match c {
            '*' => {
                if !literal.is_empty() {
                    segments.push(PatternSegmentType::Static(std::mem::take(&mut literal)));
                }
                segments.push(PatternSegmentType::Wildcard);
            }
            ':' if chars.peek().is_some_and(|&(_, next)| is_name_char(next)) => {
                let start = index + 1;
                let mut end = start;
                while let Some(&(i, next)) = chars.peek() {
                    if !is_name_char(next) {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                if !literal.is_empty() {
                    segments.push(PatternSegmentType::Static(std::mem::take(&mut literal)));
                }
                segments.push(PatternSegmentType::Param(pattern[start..end].to_string()));
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(PatternSegmentType::Static(literal));
    }

    segments
}

/// A compiled route pattern
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    regex: Regex,
    /// Parameter name for each capture group, in group order
    keys: Vec<String>,
}

impl Matcher {
    /// Compiles a pattern into an anchored matcher
    ///
    /// A trailing `/` on the matched pathname is always tolerated.
    ///
    /// # Examples
    ///
    /// ```
    /// use preroute::{Matcher, NoopLogger};
    ///
    /// let matcher = Matcher::compile("/:resource/:id").unwrap();
    /// let params = matcher.matches("/path/subpath", &NoopLogger).unwrap();
    /// assert_eq!(params["resource"], "path");
    /// assert_eq!(params["id"], "subpath");
    /// assert!(matcher.matches("/path", &NoopLogger).is_none());
    /// ```
    pub fn compile(pattern: &str) -> Result<Self> {
        let segments = classify_segments(pattern);

        let keys = segments
            .iter()
            .filter_map(PatternSegmentType::param_name)
            .map(str::to_string)
            .collect();
        let body: String = segments.iter().map(PatternSegmentType::to_regex).collect();

        let regex = Regex::new(&format!("^{}/?$", body)).map_err(|source| {
            RouterError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            keys,
        })
    }

    /// The raw pattern this matcher was compiled from
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parameter names in capture order (duplicates included)
    pub fn param_names(&self) -> &[String] {
        &self.keys
    }

    /// Tests a pathname and extracts its parameters
    ///
    /// Values are percent-decoded. When a name occurs more than once the first
    /// value is kept and a warning is sent to `logger` for each repeat.
    pub fn matches(&self, pathname: &str, logger: &dyn Logger) -> Option<Params> {
        let pathname = canonical_path(pathname);
        let captures = self.regex.captures(&pathname)?;

        let params = self.keys.iter().enumerate().fold(
            Params::with_capacity(self.keys.len()),
            |mut params, (index, key)| {
                let value = captures
                    .get(index + 1)
                    .map(|m| decode_component(m.as_str()).into_owned())
                    .unwrap_or_default();

                if params.contains_key(key) {
                    logger.log(&LogRecord::warn(
                        "pattern",
                        format!(
                            "Path '{}' had multiple route parameters of same name '{}'.",
                            self.pattern, key
                        ),
                    ));
                } else {
                    params.insert(key.clone(), value);
                }
                params
            },
        );

        Some(params)
    }
}

/// Compiles `pattern` and matches `pathname` against it in one step
///
/// # Examples
///
/// ```
/// use preroute::{match_pattern, NoopLogger};
///
/// let params = match_pattern("/:foo/*", "/test/route/child", &NoopLogger).unwrap().unwrap();
/// assert_eq!(params["foo"], "test");
/// assert_eq!(params["$rest"], "route/child");
///
/// assert!(match_pattern("/path/subpath", "/path/sub-path", &NoopLogger).unwrap().is_none());
/// ```
pub fn match_pattern(pattern: &str, pathname: &str, logger: &dyn Logger) -> Result<Option<Params>> {
    Ok(Matcher::compile(pattern)?.matches(pathname, logger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn matched(pattern: &str, pathname: &str) -> Option<Params> {
        match_pattern(pattern, pathname, &NoopLogger).unwrap()
    }

    fn recording_logger() -> (Arc<Mutex<Vec<String>>>, impl Logger) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let logger = move |record: &LogRecord| sink.lock().push(record.message.clone());
        (seen, logger)
    }

    #[test]
    fn test_classify_literal_colon() {
        assert_eq!(
            classify_segments("/a:/b"),
            vec![PatternSegmentType::Static("/a:/b".to_string())]
        );
    }

    #[test]
    fn test_classify_adjacent_params() {
        assert_eq!(
            classify_segments("/:part1-:part2"),
            vec![
                PatternSegmentType::Static("/".to_string()),
                PatternSegmentType::Param("part1".to_string()),
                PatternSegmentType::Static("-".to_string()),
                PatternSegmentType::Param("part2".to_string()),
            ]
        );
    }

    #[test]
    fn test_positive_matches() {
        assert_eq!(
            matched("/path/:parameter", "/path/foo"),
            Some(params(&[("parameter", "foo")]))
        );
        assert_eq!(
            matched("/:part1-:part2-:part3", "/test1-test2-test3"),
            Some(params(&[("part1", "test1"), ("part2", "test2"), ("part3", "test3")]))
        );
        assert_eq!(
            matched("/:foo/*", "/test/route"),
            Some(params(&[("foo", "test"), ("$rest", "route")]))
        );
        assert_eq!(
            matched("/:foo*", "/bar/baz"),
            Some(params(&[("foo", "bar"), ("$rest", "/baz")]))
        );
        assert_eq!(
            matched("/:foo/file/prefix-*.:extension", "/bar/file/prefix-baz.js"),
            Some(params(&[("foo", "bar"), ("$rest", "baz"), ("extension", "js")]))
        );
        assert_eq!(
            matched(
                "/search/:tableName?useIndex=true&term=amazing",
                "/search/people?useIndex=true&term=amazing"
            ),
            Some(params(&[("tableName", "people")]))
        );
    }

    #[test]
    fn test_negative_matches() {
        assert_eq!(matched("/path/:parameter", "/path/foo/bar"), None);
        assert_eq!(matched("/:foo/:bar", "/foo/bar/baz"), None);
        assert_eq!(matched("/:part1-:part2-:part3", "/test1/test2/test3"), None);
        assert_eq!(matched("/:foo/file/*.js", "/bar/file/baz.jsx"), None);
        assert_eq!(
            matched(
                "/search/:resource?useIndex=true&term=amazing",
                "/search/people?term=amazing&useIndex=true"
            ),
            None
        );
    }

    #[test]
    fn test_wildcard_is_not_limited_by_letters() {
        assert_eq!(
            matched("/:foo/*", "/docs/www/wiki"),
            Some(params(&[("foo", "docs"), ("$rest", "www/wiki")]))
        );
    }

    #[test]
    fn test_trailing_slash_and_canonicalization() {
        assert_eq!(matched("/about", "/about/"), Some(Params::new()));
        assert_eq!(matched("/about", "about"), Some(Params::new()));
    }

    #[test]
    fn test_values_are_percent_decoded() {
        assert_eq!(
            matched("/users/:name", "/users/jane%20doe"),
            Some(params(&[("name", "jane doe")]))
        );
    }

    #[test]
    fn test_duplicate_param_keeps_first_and_warns() {
        let (seen, logger) = recording_logger();

        let result = match_pattern("/:foo/:foo", "/foo/bar", &logger).unwrap();
        assert_eq!(result, Some(params(&[("foo", "foo")])));

        let result = match_pattern("/:foo/*/*", "/test/route/child", &logger).unwrap();
        assert_eq!(result, Some(params(&[("foo", "test"), ("$rest", "route")])));

        assert_eq!(
            *seen.lock(),
            vec![
                "Path '/:foo/:foo' had multiple route parameters of same name 'foo'.".to_string(),
                "Path '/:foo/*/*' had multiple route parameters of same name '$rest'.".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_warning_without_duplicates() {
        let (seen, logger) = recording_logger();
        match_pattern("/:a/:b/*", "/x/y/z", &logger).unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_param_names_in_order() {
        let matcher = Matcher::compile("/:a/x/*/:b").unwrap();
        assert_eq!(matcher.param_names(), ["a", "$rest", "b"]);
        assert_eq!(matcher.pattern(), "/:a/x/*/:b");
    }
}
