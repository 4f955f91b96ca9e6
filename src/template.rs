use std::sync::{Arc, LazyLock};
use dashmap::DashMap;
use regex::Regex;
use tracing::debug;
use crate::parser::parse_expression;
use crate::reader::{Reader, Token};
use crate::sandbox::SafeExpr;

/// Longest expression, in UTF-16 units, that is handed to the parser.
pub const MAX_EXPRESSION_LEN: usize = 800;

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^include\s*\(\s*(?:'([^']+)'|"([^"]+)"|([A-Za-z0-9_.]+))\s*\)\s*;?$"#).unwrap()
});

static IDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").unwrap());


#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Ident(Vec<String>),
    Include(IncludeTarget),
    Expr(SafeExpr),
    /// Rejected at compile time; renders nothing.
    Unsafe,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IncludeTarget {
    /// `include('header')` or `include("header")`
    Quoted(String),
    /// `include(page.body)`
    Bare(String),
}

impl IncludeTarget {
    pub fn as_str(&self) -> &str {
        match self {
            IncludeTarget::Quoted(s) | IncludeTarget::Bare(s) => s
        }
    }
}

impl Template {
    /// Compiles without consulting any cache; see [`TemplateCache`].
    pub fn compile(source: &str) -> Self {
        let mut reader = Reader::new(source);
        let mut segments: Vec<Segment> = Vec::new();
        while let Some(token) = reader.pop_front() {
            match token {
                Token::Text(text) => {
                    if let Some(Segment::Text(previous)) = segments.last_mut() {
                        previous.push_str(text);
                    } else {
                        segments.push(Segment::Text(text.to_owned()));
                    }
                },
                Token::Tag(code) => segments.push(classify(code)),
            }
        }
        Template { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_includes(&self) -> bool {
        self.segments.iter().any(|it| matches!(it, Segment::Include(_)))
    }
}

fn classify(code: &str) -> Segment {
    if let Some(captures) = INCLUDE.captures(code) {
        let target = match (captures.get(1).or(captures.get(2)), captures.get(3)) {
            (Some(quoted), _) => IncludeTarget::Quoted(quoted.as_str().to_owned()),
            (None, Some(bare)) => IncludeTarget::Bare(bare.as_str().to_owned()),
            (None, None) => return Segment::Unsafe
        };
        return Segment::Include(target);
    }
    if IDENT.is_match(code) {
        return Segment::Ident(code.split('.').map(str::to_owned).collect());
    }
    if code.encode_utf16().count() > MAX_EXPRESSION_LEN {
        debug!(len = code.len(), "template expression over length limit");
        return Segment::Unsafe;
    }
    match parse_expression(code) {
        Ok(expr) => match SafeExpr::new(expr) {
            Some(expr) => Segment::Expr(expr),
            None => {
                debug!(expression = code, "template expression uses a denied name");
                Segment::Unsafe
            }
        },
        Err(err) => {
            debug!(expression = code, error = %err, "template expression does not parse");
            Segment::Unsafe
        }
    }
}


/// Compiled templates keyed by their exact source text, kept for the life of
/// the cache.
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: DashMap<String, Arc<Template>>
}

impl TemplateCache {
    pub fn new() -> Self {
        TemplateCache { templates: DashMap::new() }
    }

    pub fn get_or_compile(&self, source: &str) -> Arc<Template> {
        if let Some(template) = self.templates.get(source) {
            return Arc::clone(template.value());
        }
        let template = Arc::new(Template::compile(source));
        debug!(
            segments = template.segments().len(),
            cached = self.templates.len(),
            "compiled template"
        );
        let entry = self.templates
            .entry(source.to_owned())
            .or_insert(template);
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn clear(&self) {
        self.templates.clear()
    }
}


pub fn html_escape(input: &str) -> String {
    input.replace("&", "&amp;")
        .replace("<", "&lt;")
        .replace(">", "&gt;")
        .replace("\"", "&quot;")
        .replace("'", "&#39;")
}
