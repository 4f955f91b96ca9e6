use std::sync::Arc;
use futures::executor::block_on;
use serde_json::json;
use tracing::{debug, error};
use crate::config::Config;
use crate::context::Context;
use crate::error::RenderError;
use crate::json::JsonValue;
use crate::render::{Rendered, Renderer};
use crate::scheme::SchemeStore;
use crate::template::{Template, TemplateCache};
use crate::views::{BlockingReader, TokioReader, ViewReader, Views};

pub const SCHEME_NOT_FOUND: &str = "Html scheme not found.";
pub const INTERNAL_ERROR: &str = "Internal Server Error.";


/// Owns the caches a render shares: compiled templates, view contents and
/// directory watches, plus the loaded schemes. Separate engines share nothing.
#[derive(Debug)]
pub struct Engine {
    config: Config,
    templates: TemplateCache,
    views: Views,
    schemes: SchemeStore,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Engine {
            views: Views::from_config(&config),
            templates: TemplateCache::new(),
            schemes: SchemeStore::new(),
            config,
        }
    }

    pub fn with_schemes(mut self, schemes: SchemeStore) -> Self {
        self.schemes = schemes;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    pub fn views(&self) -> &Views {
        &self.views
    }

    pub fn schemes(&self) -> &SchemeStore {
        &self.schemes
    }

    pub fn schemes_mut(&mut self) -> &mut SchemeStore {
        &mut self.schemes
    }

    /// Compiles through the template cache.
    pub fn compile(&self, source: &str) -> Arc<Template> {
        self.templates.get_or_compile(source)
    }

    /// Renders, blocking the thread on view file reads.
    pub fn render(&self, template: &Template, context: &Context) -> Rendered {
        block_on(self.render_with(&BlockingReader, template, context))
    }

    /// Renders, suspending on view file reads.
    pub async fn render_async(&self, template: &Template, context: &Context) -> Rendered {
        self.render_with(&TokioReader, template, context).await
    }

    pub fn render_str(&self, source: &str, context: &Context) -> Rendered {
        self.render(&self.compile(source), context)
    }

    pub async fn render_with<R>(&self, reader: &R, template: &Template, context: &Context) -> Rendered
    where
        R: ViewReader + ?Sized
    {
        Renderer::new(&self.templates, &self.views, reader, context).run(template).await
    }

    pub fn scheme_template(&self, name: &str) -> Result<Arc<Template>, RenderError> {
        match self.schemes.get(name) {
            Some(scheme) if !scheme.html.is_empty() => Ok(self.compile(&scheme.html)),
            _ => Err(RenderError::UnresolvedScheme { name: name.to_owned() })
        }
    }

    /// Renders `view` inside a scheme. The scheme is `scheme` when given,
    /// otherwise the `_scheme` data key, otherwise the configured default.
    pub fn render_page(&self, view: &str, data: impl Into<Context>, scheme: Option<&str>) -> Page {
        match self.page_parts(view, data.into(), scheme) {
            Ok((template, context)) => self.finish_page(self.render(&template, &context)),
            Err(page) => page
        }
    }

    pub async fn render_page_async(
        &self, view: &str, data: impl Into<Context>, scheme: Option<&str>
    ) -> Page {
        match self.page_parts(view, data.into(), scheme) {
            Ok((template, context)) => self.finish_page(self.render_async(&template, &context).await),
            Err(page) => page
        }
    }

    fn page_parts(
        &self, view: &str, mut context: Context, scheme: Option<&str>
    ) -> Result<(Arc<Template>, Context), Page> {
        let name = scheme
            .map(str::to_owned)
            .or_else(|| match context.get("_scheme") {
                Some(JsonValue::String(name)) => Some(name.clone()),
                _ => None
            })
            .or_else(|| self.config.default_scheme.clone())
            .unwrap_or_default();
        let template = self.scheme_template(&name).map_err(|err| {
            debug!(error = %err, "page not rendered");
            Page::Failure { status: 404, message: SCHEME_NOT_FOUND.to_owned() }
        })?;
        context.insert("file_name", view);
        Ok((template, context))
    }

    fn finish_page(&self, rendered: Rendered) -> Page {
        if rendered.errors.is_empty() || self.config.ignore_errors {
            return Page::Html(rendered.output);
        }
        error!("page not rendered because of errors, fix them first");
        for err in &rendered.errors {
            error!(error = %err, "render error");
        }
        Page::Failure { status: 500, message: INTERNAL_ERROR.to_owned() }
    }
}


/// What a page request produces: the document, or the status and message
/// to answer with instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Html(String),
    Failure { status: u16, message: String },
}

impl Page {
    pub fn status(&self) -> u16 {
        match self {
            Page::Html(_) => 200,
            Page::Failure { status, .. } => *status
        }
    }

    pub fn html(&self) -> Option<&str> {
        match self {
            Page::Html(html) => Some(html),
            Page::Failure { .. } => None
        }
    }

    /// `{"status": .., "message": ..}` for failures.
    pub fn to_json(&self) -> Option<JsonValue> {
        match self {
            Page::Html(_) => None,
            Page::Failure { status, message } => Some(json!({ "status": status, "message": message }))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::Scheme;
    use serde_json::json;

    fn engine(config: Config) -> Engine {
        let mut schemes = SchemeStore::new();
        schemes.insert(Scheme::new("main", "<main>{{ title }}|{{ file_name }}</main>"));
        schemes.insert(Scheme::new("alt", "<alt>{{ file_name }}</alt>"));
        schemes.insert(Scheme::new("blank", ""));
        Engine::new(config).with_schemes(schemes)
    }

    #[test]
    fn compile_is_cached() {
        let engine = engine(Config::default());
        assert!(Arc::ptr_eq(&engine.compile("{{ a }}"), &engine.compile("{{ a }}")));
    }

    #[test]
    fn page_scheme_selection() {
        let engine = engine(Config::default().with_default_scheme("main"));
        let data = json!({ "title": "Home" });
        assert_eq!(
            engine.render_page("home", data.clone(), None),
            Page::Html("<main>Home|home</main>".to_owned())
        );
        assert_eq!(
            engine.render_page("home", json!({ "_scheme": "alt" }), None),
            Page::Html("<alt>home</alt>".to_owned())
        );
        assert_eq!(
            engine.render_page("home", json!({ "_scheme": "alt" }), Some("main")),
            Page::Html("<main>|home</main>".to_owned())
        );
    }

    #[test]
    fn unknown_or_empty_scheme_is_not_found() {
        let engine = engine(Config::default());
        for scheme in [None, Some("nope"), Some("blank")] {
            let page = engine.render_page("home", json!({}), scheme);
            assert_eq!(page.status(), 404);
            assert_eq!(page.to_json(), Some(json!({ "status": 404, "message": SCHEME_NOT_FOUND })));
        }
    }

    #[test]
    fn errors_fail_the_page_unless_ignored() {
        let mut schemes = SchemeStore::new();
        schemes.insert(Scheme::new("main", "a{{ include(file_name) }}b"));

        let strict = Engine::new(Config::default()).with_schemes(schemes.clone());
        let page = strict.render_page("home", json!({}), Some("main"));
        assert_eq!(page.status(), 500);
        assert_eq!(page.html(), None);

        let lenient = Engine::new(Config::default().with_ignore_errors(true)).with_schemes(schemes);
        assert_eq!(lenient.render_page("home", json!({}), Some("main")), Page::Html("ab".to_owned()));
    }

    #[test]
    fn non_object_data_is_empty() {
        let engine = engine(Config::default());
        assert_eq!(
            engine.render_page("x", json!([1, 2]), Some("main")),
            Page::Html("<main>|x</main>".to_owned())
        );
    }
}
