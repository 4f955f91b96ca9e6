use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

pub const DEFAULT_VIEWS_CACHE_TTL: u64 = 60_000;


/// Settings the engine reads, usually from YAML:
///
/// ```yaml
/// views: /srv/app/views
/// views_cache_ttl: 60000
/// ignore_errors: false
/// default_scheme: main
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub views: Option<PathBuf>,
    /// Milliseconds a cached view stays fresh.
    pub views_cache_ttl: u64,
    pub ignore_errors: bool,
    pub default_scheme: Option<String>,
    pub watch_views: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            views: None,
            views_cache_ttl: DEFAULT_VIEWS_CACHE_TTL,
            ignore_errors: false,
            default_scheme: None,
            watch_views: true
        }
    }
}

impl Config {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str::<Config>(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(
            |source| ConfigError::Io { path: path.to_owned(), source }
        )?;
        Config::from_yaml_str(&text)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.views_cache_ttl)
    }

    pub fn with_views(mut self, views: impl Into<PathBuf>) -> Self {
        self.views = Some(views.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.views_cache_ttl = ttl.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = ignore_errors;
        self
    }

    pub fn with_default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = Some(scheme.into());
        self
    }

    pub fn with_watch_views(mut self, watch_views: bool) -> Self {
        self.watch_views = watch_views;
        self
    }
}
