//! Runtime route table.
//!
//! Built once from a [`ManifestData`] at startup: compiles every pattern and
//! binds component ids to their load steps. The order of the manifest is the
//! match order and is never re-sorted.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};

use crate::manifest::{ManifestData, ParamSpec};
use crate::renderer::Loader;
use crate::{ComponentId, ManifestError, ParamValue, Params};

/// One view node of a route: the component and its load step, if any.
#[derive(Clone)]
pub struct RouteNode {
    pub component: ComponentId,
    pub loader: Option<Arc<dyn Loader>>,
}

impl fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteNode")
            .field("component", &self.component)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

/// Load steps keyed by component id.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    loaders: HashMap<String, Arc<dyn Loader>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, component: impl Into<String>, loader: impl Loader + 'static) -> Self {
        self.loaders.insert(component.into(), Arc::new(loader));
        self
    }

    pub fn insert(&mut self, component: impl Into<String>, loader: Arc<dyn Loader>) {
        self.loaders.insert(component.into(), loader);
    }

    fn node(&self, component: &ComponentId) -> RouteNode {
        RouteNode {
            component: component.clone(),
            loader: self.loaders.get(component.as_str()).cloned(),
        }
    }
}

/// A compiled, immutable page route.
#[derive(Debug)]
pub struct Route {
    pub pattern: Regex,
    pub file: String,
    params: Vec<ParamSpec>,
    /// Layouts root first, then the page.
    pub nodes: Vec<RouteNode>,
    /// Error boundary per layout, parallel to `nodes`.
    pub errors: Vec<Option<RouteNode>>,
}

impl Route {
    /// Map capture groups to named params, percent-decoding each value.
    /// Spread params are split on `/`; absent optional params are omitted.
    pub fn extract_params(&self, captures: &Captures<'_>) -> Params {
        let mut params = Params::new();
        for (index, spec) in self.params.iter().enumerate() {
            let Some(m) = captures.get(index + 1) else {
                continue;
            };
            let value = if spec.spread {
                ParamValue::Many(m.as_str().split('/').map(decode).collect())
            } else {
                ParamValue::One(decode(m.as_str()))
            };
            params.insert(spec.name.clone(), value);
        }
        params
    }

    /// Structural match of an (encoded) path.
    pub fn exec(&self, path: &str) -> Option<Params> {
        self.pattern
            .captures(path)
            .map(|captures| self.extract_params(&captures))
    }
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// The ordered route table plus the endpoint ignore list.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    ignore: Vec<Regex>,
}

fn compile(pattern: &str) -> Result<Regex, ManifestError> {
    Regex::new(pattern).map_err(|source| ManifestError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

impl RouteTable {
    pub fn from_manifest(data: &ManifestData, registry: &NodeRegistry) -> Result<Self, ManifestError> {
        let routes = data
            .pages
            .iter()
            .map(|page| {
                Ok(Arc::new(Route {
                    pattern: compile(&page.pattern)?,
                    file: page.file.clone(),
                    params: page.params.clone(),
                    nodes: page.nodes.iter().map(|c| registry.node(c)).collect(),
                    errors: page
                        .errors
                        .iter()
                        .map(|e| e.as_ref().map(|c| registry.node(c)))
                        .collect(),
                }))
            })
            .collect::<Result<Vec<_>, ManifestError>>()?;

        let ignore = data
            .endpoints
            .iter()
            .map(|endpoint| compile(&endpoint.pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            routes,
            ignore,
        })
    }

    /// True when `path` belongs to a server-only endpoint.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore.iter().any(|re| re.is_match(path))
    }

    /// First route in table order whose pattern matches `path`.
    pub fn find(&self, path: &str) -> Option<(Arc<Route>, Params)> {
        self.routes
            .iter()
            .find_map(|route| route.exec(path).map(|params| (Arc::clone(route), params)))
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
