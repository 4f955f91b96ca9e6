use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use futures::future::try_join_all;
use tracing::debug;
use crate::error::LoadError;


/// A page skeleton that views are rendered into.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheme {
    pub name: String,
    pub file: PathBuf,
    pub html: String,
}

impl Scheme {
    pub fn new(name: impl Into<String>, html: impl Into<String>) -> Self {
        Scheme { name: name.into(), file: PathBuf::new(), html: html.into() }
    }
}


/// Schemes by name. A file `main.html` (or `main.v2.html`) loads as `main`.
#[derive(Debug, Clone, Default)]
pub struct SchemeStore {
    schemes: HashMap<String, Scheme>
}

impl SchemeStore {
    pub fn new() -> Self {
        SchemeStore { schemes: HashMap::new() }
    }

    /// Loads every `*.html` file in `dir`. Nothing is stored unless all of
    /// them could be read.
    pub fn load(&mut self, dir: impl AsRef<Path>) -> Result<usize, LoadError> {
        let dir = dir.as_ref();
        let loaded = read_schemes(dir).map_err(|source| LoadError::Schemes { dir: dir.to_owned(), source })?;
        Ok(self.extend(dir, loaded))
    }

    pub async fn load_async(&mut self, dir: impl AsRef<Path>) -> Result<usize, LoadError> {
        let dir = dir.as_ref();
        let loaded = read_schemes_async(dir).await
            .map_err(|source| LoadError::Schemes { dir: dir.to_owned(), source })?;
        Ok(self.extend(dir, loaded))
    }

    fn extend(&mut self, dir: &Path, loaded: Vec<Scheme>) -> usize {
        let count = loaded.len();
        for scheme in loaded {
            self.insert(scheme);
        }
        debug!(dir = %dir.display(), count, "loaded html schemes");
        count
    }

    pub fn get(&self, name: &str) -> Option<&Scheme> {
        self.schemes.get(name)
    }

    pub fn insert(&mut self, scheme: Scheme) -> Option<Scheme> {
        self.schemes.insert(scheme.name.clone(), scheme)
    }

    pub fn remove(&mut self, name: &str) -> Option<Scheme> {
        self.schemes.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemes.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.schemes.clear()
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scheme> {
        self.schemes.values()
    }
}


fn scheme_name(file_name: &str) -> Option<&str> {
    if file_name.ends_with(".html") {
        file_name.split('.').next()
    } else {
        None
    }
}

fn normalize(html: String) -> String {
    if html.contains("\r\n") {
        html.replace("\r\n", "\n")
    } else {
        html
    }
}

fn read_schemes(dir: &Path) -> io::Result<Vec<Scheme>> {
    let mut schemes = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().and_then(scheme_name) else {
            continue;
        };
        let file = entry.path();
        let html = normalize(fs::read_to_string(&file)?);
        schemes.push(Scheme { name: name.to_owned(), file, html });
    }
    Ok(schemes)
}

async fn read_schemes_async(dir: &Path) -> io::Result<Vec<Scheme>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        if let Some(name) = file_name.to_str().and_then(scheme_name) {
            found.push((name.to_owned(), entry.path()));
        }
    }
    try_join_all(found.into_iter().map(|(name, file)| async move {
        let html = normalize(tokio::fs::read_to_string(&file).await?);
        Ok::<_, io::Error>(Scheme { name, file, html })
    })).await
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scheme_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.html"), "<html>\r\n{{ include(file_name) }}\r\n</html>").unwrap();
        fs::write(dir.path().join("admin.v2.html"), "<admin/>").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip").unwrap();
        dir
    }

    #[test]
    fn names_stop_at_the_first_dot() {
        assert_eq!(scheme_name("main.html"), Some("main"));
        assert_eq!(scheme_name("admin.v2.html"), Some("admin"));
        assert_eq!(scheme_name("main.htm"), None);
        assert_eq!(scheme_name(".html"), Some(""));
    }

    #[test]
    fn load_reads_html_files_only() {
        let dir = scheme_dir();
        let mut store = SchemeStore::new();
        assert_eq!(store.load(dir.path()).unwrap(), 2);
        let mut names = store.names().collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["admin", "main"]);
        let main = store.get("main").unwrap();
        assert_eq!(main.html, "<html>\n{{ include(file_name) }}\n</html>");
        assert_eq!(main.file, dir.path().join("main.html"));
    }

    #[test]
    fn missing_directory_names_it() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = SchemeStore::new().load(&missing).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn map_operations() {
        let mut store = SchemeStore::new();
        assert!(store.is_empty());
        store.insert(Scheme::new("main", "<main/>"));
        assert!(store.contains("main"));
        assert_eq!(store.remove("main").map(|it| it.html), Some("<main/>".to_owned()));
        store.insert(Scheme::new("a", ""));
        store.clear();
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn async_load_matches_blocking_load() {
        let dir = scheme_dir();
        let mut blocking = SchemeStore::new();
        blocking.load(dir.path()).unwrap();
        let mut suspending = SchemeStore::new();
        suspending.load_async(dir.path()).await.unwrap();
        for name in blocking.names() {
            assert_eq!(blocking.get(name), suspending.get(name));
        }
        assert_eq!(blocking.len(), suspending.len());
    }
}
