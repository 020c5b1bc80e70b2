//! Host integration traits.
//!
//! Everything the engine needs from the browser: location, history, scroll,
//! focus, full-page navigation, fetch and the view-component mount contract.
//! A DOM binding implements these against `window`/`document`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::renderer::RootProps;

/// A scroll offset in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

impl ScrollPosition {
    pub const TOP: ScrollPosition = ScrollPosition { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// State stored alongside each history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
    /// Navigation id, monotonically increasing per session.
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollRestoration {
    Auto,
    Manual,
}

/// Browser window: location, history, scroll and focus.
pub trait Host: Send + Sync {
    /// Current `location.href`.
    fn location(&self) -> Url;

    /// State of the current history entry, if the router wrote one.
    fn history_state(&self) -> Option<HistoryState>;

    fn push_state(&self, state: HistoryState, url: &Url);

    fn replace_state(&self, state: HistoryState, url: &Url);

    fn scroll_position(&self) -> ScrollPosition;

    fn scroll_to(&self, position: ScrollPosition);

    /// Document position of the element addressed by a URL fragment
    /// (`id` or `name`), if it exists.
    fn element_position(&self, fragment: &str) -> Option<ScrollPosition>;

    /// Drop focus from the active element.
    fn blur_active_element(&self);

    /// Full browser navigation (`location.href = url`).
    fn assign(&self, url: &Url);

    /// Full page reload.
    fn reload(&self);

    fn set_scroll_restoration(&self, mode: ScrollRestoration);
}

/// Response returned by [`Fetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The `fetch` given to load steps.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &Url) -> anyhow::Result<FetchResponse>;
}

/// Fetcher for hosts without network access; every request fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFetch;

#[async_trait]
impl Fetch for NoFetch {
    async fn fetch(&self, url: &Url) -> anyhow::Result<FetchResponse> {
        anyhow::bail!("fetch is not available in this host (requested {url})")
    }
}

/// Mount contract of the view-component layer.
pub trait Mount: Send + Sync {
    /// First render. With `hydrate` the tree reconciles with server-rendered
    /// markup instead of re-creating it.
    fn construct(&self, target: &str, props: &RootProps, hydrate: bool);

    /// Every later render updates the existing tree in place.
    fn update(&self, props: &RootProps);
}
