extern crate scheme_views;
use scheme_views::{Config, Engine, Page, SchemeStore, INTERNAL_ERROR};

use std::{fs, path::Path};
use indoc::{formatdoc, indoc};
use pretty_assertions::assert_eq;
use serde_json::json;


struct Site {
    root: tempfile::TempDir,
}

impl Site {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("schemes")).unwrap();
        fs::create_dir_all(root.path().join("views/pages")).unwrap();
        fs::write(root.path().join("schemes/main.html"), indoc! {"
            <html>\r
            <title>{{ title ?? 'untitled' }}</title>\r
            {{ include(file_name) }}\r
            </html>
        "}).unwrap();
        fs::write(root.path().join("schemes/bare.html"), "{{ include(file_name) }}").unwrap();
        fs::write(root.path().join("views/pages/home.html"), "<p>Welcome {{ user }}</p>").unwrap();
        Site { root }
    }

    fn dir(&self, name: &str) -> std::path::PathBuf {
        self.root.path().join(name)
    }

    fn config(&self) -> Config {
        let text = formatdoc! {"
            views: {views}
            views_cache_ttl: 1000
            default_scheme: main
            watch_views: false
        ", views = self.dir("views").display()};
        Config::from_yaml_str(&text).unwrap()
    }

    fn engine(&self, config: Config) -> Engine {
        let mut schemes = SchemeStore::new();
        schemes.load(self.dir("schemes")).unwrap();
        Engine::new(config).with_schemes(schemes)
    }
}


#[test]
fn view_renders_inside_default_scheme() {
    let site = Site::new();
    let engine = site.engine(site.config());
    let page = engine.render_page("pages/home", json!({ "title": "Home", "user": "Ann" }), None);
    assert_eq!(page, Page::Html(indoc! {"
        <html>
        <title>Home</title>
        <p>Welcome Ann</p>
        </html>
    "}.to_owned()));
}

#[test]
fn explicit_scheme_wins() {
    let site = Site::new();
    let engine = site.engine(site.config());
    let page = engine.render_page("pages/home", json!({ "_scheme": "main", "user": "Bo" }), Some("bare"));
    assert_eq!(page.html(), Some("<p>Welcome Bo</p>"));
}

#[test]
fn missing_view_fails_the_page() {
    let site = Site::new();
    let engine = site.engine(site.config());
    let page = engine.render_page("pages/absent", json!({}), None);
    assert_eq!(page.status(), 500);
    assert_eq!(page.to_json(), Some(json!({ "status": 500, "message": INTERNAL_ERROR })));

    let lenient = site.engine(site.config().with_ignore_errors(true));
    let page = lenient.render_page("pages/absent", json!({}), Some("bare"));
    assert_eq!(page, Page::Html(String::new()));
}

#[test]
fn view_names_are_checked() {
    let site = Site::new();
    fs::write(site.dir("secret.html"), "secret").unwrap();
    let engine = site.engine(site.config().with_ignore_errors(true));
    let page = engine.render_page("../secret", json!({}), Some("bare"));
    assert_eq!(page, Page::Html(String::new()));
}

#[test]
fn unknown_scheme_is_not_found() {
    let site = Site::new();
    let engine = site.engine(Config::default());
    let page = engine.render_page("pages/home", json!({}), None);
    assert_eq!(page.status(), 404);
    let page = engine.render_page("pages/home", json!({ "_scheme": "nope" }), None);
    assert_eq!(page.status(), 404);
}

#[test]
fn config_file_loads() {
    let site = Site::new();
    let path = site.dir("config.yml");
    fs::write(&path, "ignore_errors: true\n").unwrap();
    let config = Config::load(&path).unwrap();
    assert!(config.ignore_errors);
    assert!(Config::load(Path::new("/definitely/not/here.yml")).is_err());
}

#[tokio::test]
async fn async_page_matches_blocking_page() {
    let site = Site::new();
    let mut schemes = SchemeStore::new();
    schemes.load_async(site.dir("schemes")).await.unwrap();
    let engine = Engine::new(site.config()).with_schemes(schemes);

    let data = json!({ "title": "Home", "user": "<Ann>" });
    let suspending = engine.render_page_async("pages/home", data.clone(), None).await;
    let blocking = engine.render_page("pages/home", data, None);
    assert_eq!(suspending, blocking);
    assert!(suspending.html().unwrap().contains("Welcome &lt;Ann&gt;"));
}
