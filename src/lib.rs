//! Server-side HTML views with sandboxed `{{ expr }}` interpolation.
//!
//! A [Template] compiled from source is rendered against a [Context] by an
//! [Engine], which resolves `include(...)` directives under a views
//! directory and caches both compiled templates and view file contents.
//!
//! Markers are classified once, at compile time: `include('name')` pulls in
//! `<views>/name.html`, a dotted path such as `user.name` reads the context,
//! anything else must parse as a restricted expression (no calls, no
//! computed member access, no names that reach outside the context) or it
//! silently renders nothing. Values are HTML escaped.
//!
//! Rendering never stops on a problem: include and file errors are collected
//! in [Rendered::errors] while the rest of the output is produced.
//! [Engine::render_page] applies the page policy on top of that.
//!
//!
//! # Samples
//!
//! ## Hello world
//!
//! ```
//! use scheme_views::{Config, Context, Engine, JsonValue};
//!
//! let text = "Hello {{ name }}!";
//! let data = r#"{
//!     "name": "World"
//! }"#;
//!
//! let engine = Engine::new(Config::default());
//! let context = Context::from(serde_json::from_str::<JsonValue>(data).unwrap());
//!
//! let rendered = engine.render_str(text, &context);
//! assert_eq!(rendered.output, "Hello World!");
//! assert!(rendered.errors.is_empty());
//! ```
//!
//! ## Expressions
//!
//! ```
//! use scheme_views::{Config, Context, Engine, YamlValue};
//!
//! let text = "{{ count > 1 ? count + ' items' : 'one item' }} for {{ user.name ?? 'guest' }}";
//! let data = r#"
//!   count: 3
//!   user:
//!     name: <ann>
//! "#;
//!
//! let engine = Engine::new(Config::default());
//! let context = Context::from(serde_yaml::from_str::<YamlValue>(data).unwrap());
//!
//! let template = engine.compile(text);
//! let rendered = engine.render(&template, &context);
//! assert_eq!(rendered.output, "3 items for &lt;ann&gt;");
//! ```
//!
//! ## Pages
//!
//! ```
//! use scheme_views::{Config, Engine, Page, Scheme, SchemeStore};
//! use serde_json::json;
//!
//! let mut schemes = SchemeStore::new();
//! schemes.insert(Scheme::new("main", "<title>{{ title }}</title>"));
//!
//! let engine = Engine::new(Config::default().with_default_scheme("main"))
//!     .with_schemes(schemes);
//!
//! let page = engine.render_page("home", json!({ "title": "Home" }), None);
//! assert_eq!(page, Page::Html("<title>Home</title>".to_owned()));
//! ```
mod ast;
mod lexer;
mod parser;
mod reader;
mod sandbox;
mod eval;
mod template;
mod context;
mod json;
mod yaml;
mod views;
mod render;
mod engine;
mod config;
mod scheme;
mod error;

pub use self::ast::{Expr, Literal, UnaryOp, BinaryOp, LogicalOp};
pub use self::parser::{parse_expression, ParseError};
pub use self::sandbox::{is_safe, is_denied, SafeExpr, DENYLIST};
pub use self::eval::{evaluate, format_number, Value, EvalError};
pub use self::template::{Template, Segment, IncludeTarget, TemplateCache, html_escape, MAX_EXPRESSION_LEN};
pub use self::context::Context;
pub use self::json::JsonValue;
pub use self::yaml::YamlValue;
pub use self::views::{
    resolve_target, check_target, ViewReader, BlockingReader, TokioReader,
    ViewCache, ViewCacheEntry, WatchRegistry, Views, VIEW_EXTENSION
};
pub use self::render::{Rendered, MAX_INCLUDE_DEPTH};
pub use self::engine::{Engine, Page, SCHEME_NOT_FOUND, INTERNAL_ERROR};
pub use self::config::{Config, DEFAULT_VIEWS_CACHE_TTL};
pub use self::scheme::{Scheme, SchemeStore};
pub use self::error::{RenderError, LoadError, ConfigError};
