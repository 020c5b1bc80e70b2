//! The load-step contract.
//!
//! A load step receives a [`LoadInput`] and returns a [`LoadOutput`]. Every
//! accessor on `LoadInput` records what was read; after the step finishes the
//! renderer takes the recorded [`Uses`] alongside the result and uses them to
//! decide when the node must run again.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::host::{Fetch, FetchResponse};
use crate::{Page, ParamValue, Params, Query};

/// Shallow map threaded root-to-leaf through a branch.
pub type Context = Map<String, Value>;

/// A per-node load step implemented by page and layout authors.
#[async_trait]
pub trait Loader: Send + Sync {
    /// An `Err` is treated as an uncaught exception: status 500.
    async fn load(&self, input: &LoadInput) -> anyhow::Result<LoadOutput>;
}

/// What a load step read from its input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uses {
    pub params: BTreeSet<String>,
    pub query: bool,
    pub session: bool,
    pub context: bool,
}

/// What changed between the previous render and this pass.
#[derive(Debug, Clone, Default)]
pub(crate) struct Changed {
    pub params: BTreeSet<String>,
    pub query: bool,
    pub session: bool,
}

impl Changed {
    pub(crate) fn between(previous: Option<&Page>, next: &Page, session: bool) -> Self {
        let Some(previous) = previous else {
            return Self {
                params: next.params.keys().cloned().collect(),
                query: true,
                session,
            };
        };

        let params = previous
            .params
            .keys()
            .chain(next.params.keys())
            .filter(|key| previous.params.get(*key) != next.params.get(*key))
            .cloned()
            .collect();

        Self {
            params,
            query: previous.query.to_string() != next.query.to_string(),
            session,
        }
    }
}

impl Uses {
    /// True when something this node read has changed.
    pub(crate) fn invalidated_by(&self, changed: &Changed, context_changed: bool) -> bool {
        (self.query && changed.query)
            || (self.session && changed.session)
            || (self.context && context_changed)
            || self.params.iter().any(|p| changed.params.contains(p))
    }
}

/// Input handed to a load step.
pub struct LoadInput {
    page: Page,
    url: Url,
    session: Value,
    context: Context,
    fetcher: Arc<dyn Fetch>,
    uses: Mutex<Uses>,
}

impl LoadInput {
    pub fn new(page: Page, url: Url, session: Value, context: Context, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            page,
            url,
            session,
            context,
            fetcher,
            uses: Mutex::new(Uses::default()),
        }
    }

    /// All path params. Marks every param as read.
    pub fn params(&self) -> &Params {
        self.uses
            .lock()
            .params
            .extend(self.page.params.keys().cloned());
        &self.page.params
    }

    /// A single path param. Marks only `name` as read.
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.uses.lock().params.insert(name.to_string());
        self.page.params.get(name)
    }

    pub fn query(&self) -> &Query {
        self.uses.lock().query = true;
        &self.page.query
    }

    pub fn session(&self) -> &Value {
        self.uses.lock().session = true;
        &self.session
    }

    /// Context merged from every ancestor's load result.
    pub fn context(&self) -> &Context {
        self.uses.lock().context = true;
        &self.context
    }

    /// Not tracked.
    pub fn host(&self) -> &str {
        &self.page.host
    }

    /// Not tracked.
    pub fn path(&self) -> &str {
        &self.page.path
    }

    /// Fetch `href`, resolved against the page URL.
    pub async fn fetch(&self, href: &str) -> anyhow::Result<FetchResponse> {
        let url = self.url.join(href)?;
        self.fetcher.fetch(&url).await
    }

    pub(crate) fn into_uses(self) -> Uses {
        self.uses.into_inner()
    }
}

/// Redirect requested by a load step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub status: u16,
    pub location: String,
}

/// Result of a load step. The default value means "no extra props".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOutput {
    pub props: Option<Map<String, Value>>,
    pub context: Option<Context>,
    /// Cache lifetime in seconds.
    pub maxage: Option<u64>,
    pub status: Option<u16>,
    /// A string, or an object with a string `message`.
    pub error: Option<Value>,
    pub redirect: Option<Redirect>,
}

impl LoadOutput {
    /// Plain data. Non-object values are wrapped as `{ "value": .. }`.
    pub fn props(props: Value) -> Self {
        let props = match props {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        Self {
            props: Some(props),
            ..Default::default()
        }
    }

    pub fn error(status: u16, error: impl Into<Value>) -> Self {
        Self {
            status: Some(status),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            redirect: Some(Redirect {
                status,
                location: location.into(),
            }),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        if let Value::Object(map) = context {
            self.context = Some(map);
        }
        self
    }

    pub fn with_maxage(mut self, seconds: u64) -> Self {
        self.maxage = Some(seconds);
        self
    }
}

/// Error value surfaced to the view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    pub message: String,
}

impl PageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for PageError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// A validated load result.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Normalized {
    Data {
        props: Map<String, Value>,
        context: Option<Context>,
        maxage: Option<Duration>,
    },
    Error {
        status: u16,
        error: PageError,
    },
    Redirect(Redirect),
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a raw load result.
///
/// Malformed errors and redirects are escalated to a 500 with a message
/// describing what was wrong instead of being coerced.
pub(crate) fn normalize(output: LoadOutput) -> Normalized {
    let has_error_status = output.status.is_some_and(|s| s >= 400);

    if output.error.is_some() || has_error_status {
        let status = output.status.unwrap_or(500);
        let error = match &output.error {
            None => PageError::new(format!("Error {status}")),
            Some(Value::String(message)) => PageError::new(message.clone()),
            Some(Value::Object(map)) => match map.get("message") {
                Some(Value::String(message)) => PageError::new(message.clone()),
                _ => {
                    return malformed(
                        "\"error\" property returned from load() must be a string or an object with a string \"message\", received an object without one",
                    )
                }
            },
            Some(other) => {
                return malformed(&format!(
                    "\"error\" property returned from load() must be a string or an object with a string \"message\", received type \"{}\"",
                    type_name(other)
                ))
            }
        };

        if !(400..=599).contains(&status) {
            tracing::warn!(status, "\"error\" returned from load() without a valid status code, defaulting to 500");
            return Normalized::Error { status: 500, error };
        }
        return Normalized::Error { status, error };
    }

    if let Some(redirect) = output.redirect {
        if !(300..=399).contains(&redirect.status) {
            return malformed("\"redirect\" property returned from load() must be accompanied by a 3xx status code");
        }
        if redirect.location.is_empty() {
            return malformed("\"redirect\" property returned from load() must have a non-empty location");
        }
        return Normalized::Redirect(redirect);
    }

    Normalized::Data {
        props: output.props.unwrap_or_default(),
        context: output.context,
        maxage: output.maxage.map(Duration::from_secs),
    }
}

fn malformed(message: &str) -> Normalized {
    Normalized::Error {
        status: 500,
        error: PageError::new(message),
    }
}
