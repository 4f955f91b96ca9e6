use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};
use async_trait::async_trait;
use dashmap::DashMap;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use tracing::{debug, trace};
use crate::config::Config;
use crate::context::Context;
use crate::error::RenderError;
use crate::eval::Value;
use crate::template::IncludeTarget;

pub const VIEW_EXTENSION: &str = "html";

static LOOKUP_TARGET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").unwrap());
static ALLOWED_TARGET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-/]+$").unwrap());


/// The file name an include points at. Targets that look like a data path are
/// looked up first; a non-empty string found there replaces the target.
pub fn resolve_target(target: &IncludeTarget, context: &Context) -> String {
    let target = target.as_str();
    if LOOKUP_TARGET.is_match(target) {
        if let Value::String(found) = context.lookup_dotted(target) {
            if !found.is_empty() {
                return found;
            }
        }
    }
    target.to_owned()
}

pub fn check_target(target: &str) -> Result<(), RenderError> {
    if target.contains("..") || target.starts_with('/') || target.starts_with('\\') {
        return Err(RenderError::PathTraversal { target: target.to_owned() });
    }
    if !ALLOWED_TARGET.is_match(target) {
        return Err(RenderError::IllegalCharacters { target: target.to_owned() });
    }
    Ok(())
}


/// Reads view files. The blocking and the tokio reader drive the same
/// render walk.
#[async_trait]
pub trait ViewReader: Send + Sync {
    async fn modified(&self, path: &Path) -> io::Result<SystemTime>;
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// `std::fs` reader; its futures are ready on first poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingReader;

#[async_trait]
impl ViewReader for BlockingReader {
    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioReader;

#[async_trait]
impl ViewReader for TokioReader {
    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        tokio::fs::metadata(path).await?.modified()
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}


#[derive(Debug, Clone)]
pub struct ViewCacheEntry {
    pub content: Arc<str>,
    pub modified: SystemTime,
    pub cached_at: Instant,
}

/// View contents keyed by file path. An entry is reused while its recorded
/// modification time matches the file and it is younger than the TTL.
#[derive(Debug, Clone)]
pub struct ViewCache {
    entries: Arc<DashMap<PathBuf, ViewCacheEntry>>,
    ttl: Duration,
}

impl ViewCache {
    pub fn new(ttl: Duration) -> Self {
        ViewCache { entries: Arc::new(DashMap::new()), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn fresh(&self, path: &Path, modified: SystemTime) -> Option<Arc<str>> {
        let entry = self.entries.get(path)?;
        if entry.modified == modified && entry.cached_at.elapsed() < self.ttl {
            Some(Arc::clone(&entry.content))
        } else {
            None
        }
    }

    pub fn store(&self, path: PathBuf, content: Arc<str>, modified: SystemTime) {
        self.entries.insert(path, ViewCacheEntry { content, modified, cached_at: Instant::now() });
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn invalidate_under(&self, dir: &Path) {
        self.entries.retain(|path, _| !path.starts_with(dir));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear()
    }
}


/// Directories that already had a change watch attempted. A failed attempt is
/// remembered too, so it is never retried.
pub struct WatchRegistry {
    enabled: bool,
    watched: Mutex<HashMap<PathBuf, Option<RecommendedWatcher>>>,
}

impl WatchRegistry {
    pub fn new(enabled: bool) -> Self {
        WatchRegistry { enabled, watched: Mutex::new(HashMap::new()) }
    }

    pub fn ensure(&self, dir: &Path, cache: &ViewCache) {
        if !self.enabled {
            return;
        }
        let mut watched = self.watched.lock().unwrap_or_else(PoisonError::into_inner);
        if watched.contains_key(dir) {
            return;
        }
        let watcher = watch(dir, cache.clone());
        watched.insert(dir.to_owned(), watcher);
    }

    pub fn is_watching(&self, dir: &Path) -> bool {
        let watched = self.watched.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(watched.get(dir), Some(Some(_)))
    }

    pub fn attempted(&self) -> usize {
        self.watched.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("enabled", &self.enabled)
            .field("attempted", &self.attempted())
            .finish()
    }
}

fn watch(dir: &Path, cache: ViewCache) -> Option<RecommendedWatcher> {
    let root = dir.to_owned();
    let handler = move |event: notify::Result<notify::Event>| {
        match event {
            Ok(event) if !event.kind.is_access() => {
                trace!(dir = %root.display(), kind = ?event.kind, "views changed");
                cache.invalidate_under(&root);
            },
            Ok(_) => {},
            Err(err) => trace!(error = %err, "views watch error"),
        }
    };
    let installed = notify::recommended_watcher(handler).and_then(|mut watcher| {
        watcher.watch(dir, RecursiveMode::Recursive)?;
        Ok(watcher)
    });
    match installed {
        Ok(watcher) => {
            debug!(dir = %dir.display(), "watching views directory");
            Some(watcher)
        },
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "cannot watch views directory");
            None
        }
    }
}


#[derive(Debug)]
pub struct Views {
    root: Option<PathBuf>,
    cache: ViewCache,
    watches: WatchRegistry,
}

impl Views {
    pub fn new(root: Option<PathBuf>, ttl: Duration, watch: bool) -> Self {
        Views { root, cache: ViewCache::new(ttl), watches: WatchRegistry::new(watch) }
    }

    pub fn from_config(config: &Config) -> Self {
        Views::new(config.views.clone(), config.cache_ttl(), config.watch_views)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    pub fn watches(&self) -> &WatchRegistry {
        &self.watches
    }

    pub fn path_of(&self, target: &str) -> Result<PathBuf, RenderError> {
        let root = self.root.as_ref().ok_or(RenderError::MissingViewsDirectory)?;
        check_target(target)?;
        Ok(root.join(format!("{target}.{VIEW_EXTENSION}")))
    }

    /// Content of the view named by an already resolved target.
    pub async fn load<R>(&self, reader: &R, target: &str) -> Result<Arc<str>, RenderError>
    where
        R: ViewReader + ?Sized
    {
        let path = self.path_of(target)?;
        if let Some(root) = self.root.as_deref() {
            self.watches.ensure(root, &self.cache);
        }
        let modified = reader.modified(&path).await.map_err(|err| RenderError::io(&path, err))?;
        if let Some(content) = self.cache.fresh(&path, modified) {
            trace!(path = %path.display(), "view cache hit");
            return Ok(content);
        }
        trace!(path = %path.display(), "view cache miss");
        let text = reader.read_to_string(&path).await.map_err(|err| RenderError::io(&path, err))?;
        let content: Arc<str> = Arc::from(text.replace("\r\n", "\n"));
        self.cache.store(path, Arc::clone(&content), modified);
        Ok(content)
    }
}
