use futures::future::{BoxFuture, FutureExt};
use tracing::trace;
use crate::context::Context;
use crate::error::RenderError;
use crate::eval::evaluate;
use crate::template::{html_escape, IncludeTarget, Segment, Template, TemplateCache};
use crate::views::{resolve_target, ViewReader, Views};

/// Includes nested deeper than this are reported instead of followed.
pub const MAX_INCLUDE_DEPTH: usize = 64;


/// Output of one render together with everything that went wrong along the way.
#[derive(Debug, Default)]
pub struct Rendered {
    pub output: String,
    pub errors: Vec<RenderError>,
}

impl Rendered {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}


/// Walks segments in order. The reader decides whether include I/O blocks or
/// suspends; nothing else differs between the two render forms.
pub(crate) struct Renderer<'a, R: ViewReader + ?Sized> {
    templates: &'a TemplateCache,
    views: &'a Views,
    reader: &'a R,
    context: &'a Context,
    rendered: Rendered,
}

impl<'a, R: ViewReader + ?Sized> Renderer<'a, R> {
    pub(crate) fn new(
        templates: &'a TemplateCache, views: &'a Views, reader: &'a R, context: &'a Context
    ) -> Self {
        Renderer { templates, views, reader, context, rendered: Rendered::default() }
    }

    pub(crate) async fn run(mut self, template: &Template) -> Rendered {
        self.walk(template, 0).await;
        self.rendered
    }

    fn walk<'s>(&'s mut self, template: &'s Template, depth: usize) -> BoxFuture<'s, ()> {
        async move {
            for segment in template.segments() {
                match segment {
                    Segment::Text(text) => self.rendered.output.push_str(text),
                    Segment::Ident(path) => {
                        if let Some(text) = self.context.lookup(path).render() {
                            self.rendered.output.push_str(&html_escape(&text));
                        }
                    },
                    Segment::Expr(expr) => match evaluate(expr, self.context) {
                        Ok(value) => if let Some(text) = value.render() {
                            self.rendered.output.push_str(&html_escape(&text));
                        },
                        Err(err) => trace!(error = %err, "expression renders empty"),
                    },
                    Segment::Include(target) => self.include(target, depth).await,
                    Segment::Unsafe => {},
                }
            }
        }.boxed()
    }

    async fn include(&mut self, target: &IncludeTarget, depth: usize) {
        let target = resolve_target(target, self.context);
        if depth >= MAX_INCLUDE_DEPTH {
            self.rendered.errors.push(RenderError::IncludeTooDeep { target, limit: MAX_INCLUDE_DEPTH });
            return;
        }
        match self.views.load(self.reader, &target).await {
            Ok(content) => {
                let child = self.templates.get_or_compile(&content);
                self.walk(&child, depth + 1).await;
            },
            Err(err) => self.rendered.errors.push(err),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::BlockingReader;
    use futures::executor::block_on;
    use serde_json::json;
    use std::fs;
    use std::time::Duration;

    fn render(views: &Views, source: &str, context: &Context) -> Rendered {
        let templates = TemplateCache::new();
        let template = templates.get_or_compile(source);
        block_on(Renderer::new(&templates, views, &BlockingReader, context).run(&template))
    }

    #[test]
    fn segments_render_in_order() {
        let views = Views::new(None, Duration::from_secs(60), false);
        let context = Context::from(json!({ "name": "<b>", "n": 2 }));
        let rendered = render(&views, "[{{ name }}|{{ n * 3 }}|{{ missing }}|{{ a[0] }}]", &context);
        assert_eq!(rendered.output, "[&lt;b&gt;|6||]");
        assert!(rendered.is_clean());
    }

    #[test]
    fn evaluation_errors_are_swallowed() {
        let views = Views::new(None, Duration::from_secs(60), false);
        let rendered = render(&views, "a{{ missing.deeper + 1 }}b", &Context::new());
        assert_eq!(rendered.output, "ab");
        assert!(rendered.is_clean());
    }

    #[test]
    fn include_failures_are_collected() {
        let views = Views::new(None, Duration::from_secs(60), false);
        let rendered = render(&views, "a{{ include('x') }}b{{ include('y') }}", &Context::new());
        assert_eq!(rendered.output, "ab");
        assert_eq!(rendered.errors.len(), 2);
        assert!(matches!(rendered.errors[0], RenderError::MissingViewsDirectory));
    }

    #[test]
    fn self_include_stops_at_the_depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("loop.html"), "+{{ include('loop') }}").unwrap();
        let views = Views::new(Some(dir.path().to_owned()), Duration::from_secs(60), false);
        let rendered = render(&views, "{{ include('loop') }}", &Context::new());
        assert_eq!(rendered.output, "+".repeat(MAX_INCLUDE_DEPTH));
        assert_eq!(rendered.errors.len(), 1);
        assert!(matches!(rendered.errors[0], RenderError::IncludeTooDeep { .. }));
    }
}
