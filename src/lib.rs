//! # Zenith Router
//!
//! Client-side navigation engine for the Zenith Framework.
//!
//! Three parts, leaves first:
//!
//! - [`manifest`] walks the `src/routes` tree and produces an ordered,
//!   serializable route table (`router-manifest.json`).
//! - [`router`] owns history integration, intercepts link clicks and
//!   `popstate`, and selects the matching route for a URL.
//! - [`renderer`] runs the per-route load pipeline with dependency-tracked
//!   invalidation, maxage caching and last-navigation-wins commit gating.
//!
//! The browser itself is reached only through the traits in [`host`], so the
//! engine runs unchanged under a real DOM binding or an in-memory test host.

pub mod host;
pub mod manifest;
pub mod renderer;
pub mod router;
pub mod routes;
pub mod utils;

use std::collections::BTreeMap;
use std::fmt;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use manifest::{compile_dir, compile_files, CompiledManifest, ManifestConfig, ManifestData};
pub use renderer::{LoadInput, LoadOutput, Loader, RenderOutcome, Renderer, RootProps, Session};
pub use router::{Anchor, ClickEvent, GotoOptions, NavigationTarget, Router, RouterConfig};
pub use routes::{NodeRegistry, Route, RouteTable};

/// Identifier of a view component as recorded in the manifest
/// (e.g. `src/routes/blog/[slug].zen`).
pub type ComponentId = ArcStr;

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// A single path parameter value. Spread parameters capture several segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    One(String),
    Many(Vec<String>),
}

impl ParamValue {
    /// The value as a single string; spread values are re-joined with `/`.
    pub fn as_joined(&self) -> String {
        match self {
            ParamValue::One(value) => value.clone(),
            ParamValue::Many(values) => values.join("/"),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_joined())
    }
}

pub type Params = BTreeMap<String, ParamValue>;

/// Ordered query-string pairs, equivalent to `URLSearchParams`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query(Vec<(String, String)>);

impl Query {
    /// Parse a raw query string (with or without the leading `?`).
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        Self(
            url::form_urlencoded::parse(raw.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Query {
    /// Serialized form without the leading `?`. Used for change detection
    /// and as part of cache keys.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.0 {
            serializer.append_pair(k, v);
        }
        f.write_str(&serializer.finish())
    }
}

/// Immutable snapshot of a resolved URL, driving exactly one render pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub host: String,
    pub path: String,
    pub query: Query,
    pub params: Params,
}

impl Page {
    /// `path` plus `?query` when the query is non-empty.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic emitted while compiling the route manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Fatal route-tree errors. These block the build.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("The {a} and {b} routes clash (both compile to `{pattern}`)")]
    Clash {
        a: String,
        b: String,
        pattern: String,
    },

    #[error("Invalid route {file}: {reason}")]
    Malformed { file: String, reason: String },

    #[error("Invalid route {file}: cannot use (, ), ? or : in route qualifier `{qualifier}`")]
    InvalidQualifier { file: String, qualifier: String },

    #[error("Invalid route {file}: parameter name `{name}` must match /^[a-zA-Z0-9_$]+$/")]
    InvalidParamName { file: String, name: String },

    #[error("Invalid route pattern `{pattern}`: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort a render pass before anything is committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Conflicting redirects in a single render pass: `{first}` and `{second}`")]
    RedirectConflict { first: String, second: String },
}

/// Errors surfaced by programmatic navigation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("Too many redirects while navigating to `{location}`")]
    TooManyRedirects { location: String },

    #[error("Invalid navigation href `{href}`: {reason}")]
    InvalidHref { href: String, reason: String },

    #[error(transparent)]
    Render(#[from] RenderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_round_trips_through_display() {
        let query = Query::parse("?a=1&b=two%20words&a=3");
        assert_eq!(query.get("a"), Some("1"));
        assert_eq!(query.get_all("a"), vec!["1", "3"]);
        assert_eq!(query.get("b"), Some("two words"));
        assert_eq!(query.to_string(), "a=1&b=two+words&a=3");
    }

    #[test]
    fn path_and_query_omits_empty_query() {
        let page = Page {
            host: "example.com".into(),
            path: "/blog".into(),
            query: Query::default(),
            params: Params::new(),
        };
        assert_eq!(page.path_and_query(), "/blog");
    }

    #[test]
    fn spread_param_joins_with_slash() {
        let value = ParamValue::Many(vec!["a".into(), "b".into()]);
        assert_eq!(value.to_string(), "a/b");
    }
}
