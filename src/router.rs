//! Router.
//!
//! The one integration point with browser history and DOM navigation
//! events. Decides whether a URL is navigable and by which route, writes
//! history entries, hands the target to the [`Renderer`] and restores scroll
//! once the render committed.
//!
//! Navigation ids are minted per fresh navigation and stored in each history
//! entry's state, so back/forward can look up the scroll offset recorded when
//! the entry was left.

pub mod events;
pub mod scroll;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::host::{HistoryState, Host, ScrollPosition, ScrollRestoration};
use crate::renderer::{Navigating, RenderOutcome, Renderer};
use crate::routes::{Route, RouteTable};
use crate::{utils, NavigationError, Page, Query};

pub use events::{Anchor, ClickEvent};
pub use scroll::ScrollHistory;

use events::{classify_click, ClickAction};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Path prefix the app is served under, e.g. `/app`.
    pub base: String,
    /// Selector of the DOM node the root component mounts into.
    pub target: String,
    /// Reconcile the first mount with server-rendered markup.
    pub hydrate: bool,
    /// Redirect hops followed before a navigation fails.
    pub max_redirects: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base: String::new(),
            target: "body".to_string(),
            hydrate: true,
            max_redirects: 20,
        }
    }
}

/// Options for [`Router::goto`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GotoOptions {
    /// Replace the current history entry instead of pushing one.
    pub replace_state: bool,
    /// Keep the current scroll position.
    pub noscroll: bool,
    /// Keep focus on the active element.
    pub keepfocus: bool,
}

// ---------------------------------------------------------------------------
// NavigationTarget
// ---------------------------------------------------------------------------

/// A selected route for one navigation attempt.
#[derive(Debug, Clone)]
pub struct NavigationTarget {
    pub href: Url,
    pub route: Arc<Route>,
    pub page: Page,
}

impl PartialEq for NavigationTarget {
    fn eq(&self, other: &Self) -> bool {
        self.href == other.href && Arc::ptr_eq(&self.route, &other.route) && self.page == other.page
    }
}

/// How a navigation touches history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Push,
    Replace,
    /// Fresh navigation that leaves history alone.
    Keep,
    /// Back/forward or initial load to an existing entry.
    Restore(u64),
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    config: RouterConfig,
    table: RouteTable,
    host: Arc<dyn Host>,
    renderer: Arc<Renderer>,
    scroll: ScrollHistory,
    /// Highest id minted so far.
    uid: AtomicU64,
    /// Id of the entry currently shown.
    cid: AtomicU64,
}

impl Router {
    /// The renderer mounts into `config.target`, hydrating per `config.hydrate`.
    pub fn new(config: RouterConfig, table: RouteTable, host: Arc<dyn Host>, renderer: Renderer) -> Self {
        let renderer = renderer
            .with_target(config.target.clone())
            .with_hydrate(config.hydrate);
        Self {
            config,
            table,
            host,
            renderer: Arc::new(renderer),
            scroll: ScrollHistory::new(),
            uid: AtomicU64::new(0),
            cid: AtomicU64::new(0),
        }
    }

    pub fn renderer(&self) -> &Arc<Renderer> {
        &self.renderer
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn scroll_history(&self) -> &ScrollHistory {
        &self.scroll
    }

    /// Id of the history entry currently shown.
    pub fn current_id(&self) -> u64 {
        self.cid.load(Ordering::SeqCst)
    }

    fn mint_id(&self) -> u64 {
        let id = self.uid.fetch_add(1, Ordering::SeqCst) + 1;
        self.cid.store(id, Ordering::SeqCst);
        id
    }

    /// Take over scroll restoration and render the current location.
    ///
    /// An existing history id is kept so a reload still restores; otherwise
    /// one is minted and written into the current entry. Locations outside
    /// the app leave the server-rendered page alone.
    pub async fn start(&self) -> Result<(), NavigationError> {
        self.host.set_scroll_restoration(ScrollRestoration::Manual);

        let location = self.host.location();
        let id = match self.host.history_state() {
            Some(state) => {
                self.uid.fetch_max(state.id, Ordering::SeqCst);
                self.cid.store(state.id, Ordering::SeqCst);
                state.id
            }
            None => self.mint_id(),
        };
        self.host.replace_state(HistoryState { id }, &location);

        let Some(target) = self.select(&location) else {
            info!(href = %location, "initial location is not routable");
            return Ok(());
        };
        info!(href = %location, route = %target.route.file, "starting router");
        let hash = location.fragment().map(str::to_string);
        self.run(target, Entry::Restore(id), true, false, hash).await
    }

    /// Resolve `url` to a target, or `None` when it must be left to the
    /// browser: another origin, outside the base path, a server endpoint or
    /// no matching route.
    pub fn select(&self, url: &Url) -> Option<NavigationTarget> {
        let location = self.host.location();
        if !utils::same_origin(url, &location) {
            debug!(href = %url, "not selected: cross-origin");
            return None;
        }
        let Some(path) = utils::strip_base(url.path(), &self.config.base) else {
            debug!(href = %url, base = %self.config.base, "not selected: outside base path");
            return None;
        };
        if self.table.is_ignored(&path) {
            debug!(href = %url, "not selected: server endpoint");
            return None;
        }
        let Some((route, params)) = self.table.find(&path) else {
            debug!(href = %url, "not selected: no matching route");
            return None;
        };

        let page = Page {
            host: utils::host_with_port(url),
            path,
            query: Query::parse(url.query().unwrap_or("")),
            params,
        };
        Some(NavigationTarget {
            href: url.clone(),
            route,
            page,
        })
    }

    /// Render `target`.
    ///
    /// With `history_id` this replays an existing entry and restores its
    /// recorded scroll. Without one it is a fresh navigation: the current
    /// scroll is recorded under the outgoing id and a new id is minted.
    /// History itself is left untouched.
    pub async fn navigate(
        &self,
        target: NavigationTarget,
        history_id: Option<u64>,
        noscroll: bool,
        hash: Option<&str>,
    ) -> Result<(), NavigationError> {
        let entry = history_id.map_or(Entry::Keep, Entry::Restore);
        self.run(target, entry, noscroll, false, hash.map(str::to_string))
            .await
    }

    /// Document-level click listener. Marks the event as prevented when the
    /// router takes the navigation over.
    pub async fn on_click(&self, event: &mut ClickEvent) -> Result<(), NavigationError> {
        let location = self.host.location();
        let url = match classify_click(event, &location) {
            ClickAction::Ignore => return Ok(()),
            ClickAction::Prevent => {
                event.default_prevented = true;
                return Ok(());
            }
            ClickAction::Follow(url) => url,
        };
        let Some(target) = self.select(&url) else {
            return Ok(());
        };

        event.default_prevented = true;
        let noscroll = event.anchor.as_ref().is_some_and(|a| a.noscroll);
        let hash = url.fragment().map(str::to_string);
        debug!(href = %url, "intercepted link click");
        self.run(target, Entry::Push, noscroll, false, hash).await
    }

    /// Hover or touch on an anchor; prefetches when it opted in.
    pub async fn on_pointer_over(&self, anchor: &Anchor) -> Result<(), NavigationError> {
        if !anchor.prefetch {
            return Ok(());
        }
        self.prefetch(&anchor.href).await
    }

    /// Programmatic navigation. An href outside the app triggers a full
    /// browser navigation and the returned future never resolves.
    pub async fn goto(&self, href: &str, opts: GotoOptions) -> Result<(), NavigationError> {
        let url = utils::resolve(&self.host.location(), href)?;
        let Some(target) = self.select(&url) else {
            info!(href = %url, "goto target is not routable, leaving the app");
            self.host.assign(&url);
            return std::future::pending().await;
        };

        let entry = if opts.replace_state {
            Entry::Replace
        } else {
            Entry::Push
        };
        let hash = url.fragment().map(str::to_string);
        self.run(target, entry, opts.noscroll, opts.keepfocus, hash)
            .await
    }

    /// Run the load phase for `href` ahead of a navigation.
    pub async fn prefetch(&self, href: &str) -> Result<(), NavigationError> {
        let url = utils::resolve(&self.host.location(), href)?;
        let Some(target) = self.select(&url) else {
            return Ok(());
        };
        debug!(href = %url, "prefetching");
        self.renderer.prefetch(&target).await?;
        Ok(())
    }

    /// `popstate` listener. `state` is the state of the entry being
    /// activated; `None` means a fragment navigation created the entry.
    pub async fn on_popstate(&self, state: Option<HistoryState>) -> Result<(), NavigationError> {
        let location = self.host.location();
        let Some(state) = state else {
            let id = self.mint_id();
            self.host.replace_state(HistoryState { id }, &location);
            return Ok(());
        };

        self.scroll
            .record(self.current_id(), self.host.scroll_position());

        match self.select(&location) {
            Some(target) => {
                debug!(href = %location, id = state.id, "history traversal");
                self.run(target, Entry::Restore(state.id), false, false, None)
                    .await
            }
            None => {
                warn!(href = %location, "history entry no longer routable, reloading");
                self.host.reload();
                Ok(())
            }
        }
    }

    /// `beforeunload` listener.
    pub fn on_before_unload(&self) {
        self.scroll
            .record(self.current_id(), self.host.scroll_position());
        self.host.set_scroll_restoration(ScrollRestoration::Auto);
    }

    /// `load` listener, fired again when the page is restored.
    pub fn on_load(&self) {
        self.host.set_scroll_restoration(ScrollRestoration::Manual);
    }

    async fn run(
        &self,
        mut target: NavigationTarget,
        mut entry: Entry,
        noscroll: bool,
        keepfocus: bool,
        mut hash: Option<String>,
    ) -> Result<(), NavigationError> {
        let mut redirects = 0;

        loop {
            let id = self.begin(&target, entry, noscroll);

            let from = self.renderer.current_target().map(|t| t.href);
            self.renderer.stores().set_navigating(Some(Navigating {
                from,
                to: target.href.clone(),
            }));

            let outcome = self.renderer.render(&target).await;
            if !matches!(outcome, Ok(RenderOutcome::Superseded)) {
                self.renderer.stores().set_navigating(None);
            }

            match outcome? {
                RenderOutcome::Superseded => return Ok(()),
                RenderOutcome::Committed => {
                    self.finish(id, noscroll, keepfocus, hash.as_deref());
                    return Ok(());
                }
                RenderOutcome::Redirect(redirect) => {
                    redirects += 1;
                    if redirects > self.config.max_redirects {
                        return Err(NavigationError::TooManyRedirects {
                            location: redirect.location,
                        });
                    }
                    let url = utils::resolve(&target.href, &redirect.location)?;
                    let Some(next) = self.select(&url) else {
                        info!(href = %url, "redirect target is not routable, leaving the app");
                        self.host.assign(&url);
                        return Ok(());
                    };
                    debug!(from = %target.href, to = %url, status = redirect.status, "following redirect");
                    hash = url.fragment().map(str::to_string);
                    target = next;
                    entry = Entry::Replace;
                }
            }
        }
    }

    /// Scroll bookkeeping and the history write that happen before the
    /// render is awaited. Returns the id of the entry being rendered.
    fn begin(&self, target: &NavigationTarget, entry: Entry, noscroll: bool) -> u64 {
        if let Entry::Restore(id) = entry {
            self.cid.store(id, Ordering::SeqCst);
            return id;
        }

        let current = self.host.scroll_position();
        self.scroll.record(self.current_id(), current);
        let id = self.mint_id();
        self.scroll
            .record(id, if noscroll { current } else { ScrollPosition::TOP });

        let state = HistoryState { id };
        match entry {
            Entry::Push => self.host.push_state(state, &target.href),
            Entry::Replace => self.host.replace_state(state, &target.href),
            Entry::Keep | Entry::Restore(_) => {}
        }
        id
    }

    fn finish(&self, id: u64, noscroll: bool, keepfocus: bool, hash: Option<&str>) {
        if !keepfocus {
            self.host.blur_active_element();
        }
        if noscroll {
            return;
        }

        let fragment_position = hash
            .filter(|h| !h.is_empty())
            .and_then(|h| self.host.element_position(h));
        let position = scroll::scroll_target(self.scroll.get(id), fragment_position);
        self.scroll.record(id, position);
        self.host.scroll_to(position);
    }
}
