// File: src/config.rs
// Purpose: Router options, optionally read from preroute.toml

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::logger::{Logger, TracingLogger};
use crate::resolve::DEFAULT_MAX_REDIRECTS;

/// Router behaviour switches
#[derive(Clone, Serialize, Deserialize)]
pub struct RouterOptions {
    /// Turn preload requests into started resources and cache the last one
    #[serde(default = "default_false")]
    pub assist_preload: bool,

    /// Whether rendering should wait for the view code
    #[serde(default = "default_false")]
    pub await_component: bool,

    /// Default for preloads without an explicit `defer` flag
    #[serde(default = "default_false")]
    pub await_preload: bool,

    /// Longest redirect chain followed before giving up
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Receives warnings and swallowed errors
    #[serde(skip, default = "default_logger")]
    pub logger: Arc<dyn Logger>,
}

// Default values
fn default_false() -> bool {
    false
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            assist_preload: false,
            await_component: false,
            await_preload: false,
            max_redirects: default_max_redirects(),
            logger: default_logger(),
        }
    }
}

impl fmt::Debug for RouterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterOptions")
            .field("assist_preload", &self.assist_preload)
            .field("await_component", &self.await_component)
            .field("await_preload", &self.await_preload)
            .field("max_redirects", &self.max_redirects)
            .finish_non_exhaustive()
    }
}

impl RouterOptions {
    /// Load options from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Missing file means defaults
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read router options: {:?}", path))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse router options: {:?}", path))
    }

    /// Load options from the default path (./preroute.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("preroute.toml")
    }

    /// Parse options from TOML text; blank text means defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(toml::from_str(content)?)
    }

    pub fn with_assist_preload(mut self, assist_preload: bool) -> Self {
        self.assist_preload = assist_preload;
        self
    }

    pub fn with_await_component(mut self, await_component: bool) -> Self {
        self.await_component = await_component;
        self
    }

    pub fn with_await_preload(mut self, await_preload: bool) -> Self {
        self.await_preload = await_preload;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = RouterOptions::default();
        assert!(!options.assist_preload);
        assert!(!options.await_component);
        assert!(!options.await_preload);
        assert_eq!(options.max_redirects, 32);
    }

    #[test]
    fn test_empty_options() {
        let options = RouterOptions::from_toml_str("  \n").unwrap();
        assert_eq!(options.max_redirects, 32);
    }

    #[test]
    fn test_partial_options() {
        let toml = r#"
            assist_preload = true
            max_redirects = 5
        "#;
        let options = RouterOptions::from_toml_str(toml).unwrap();
        assert!(options.assist_preload);
        assert!(!options.await_preload);
        assert_eq!(options.max_redirects, 5);
    }

    #[test]
    fn test_invalid_options() {
        assert!(RouterOptions::from_toml_str("assist_preload = \"yes\"").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let options = RouterOptions::load("does/not/exist/preroute.toml").unwrap();
        assert!(!options.assist_preload);
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("preroute-{}.toml", std::process::id()));
        fs::write(&path, "await_component = true\nawait_preload = true\n").unwrap();

        let options = RouterOptions::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert!(options.await_component);
        assert!(options.await_preload);
        assert!(!options.assist_preload);
    }

    #[test]
    fn test_builders() {
        let options = RouterOptions::default()
            .with_assist_preload(true)
            .with_await_component(true)
            .with_max_redirects(2)
            .with_logger(crate::logger::NoopLogger);
        assert!(options.assist_preload);
        assert!(options.await_component);
        assert_eq!(options.max_redirects, 2);
    }
}
