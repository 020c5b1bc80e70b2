//! Renderer.
//!
//! Given a [`NavigationTarget`], works out which view nodes must run their
//! load step again, runs them root-to-leaf, assembles [`RootProps`] and
//! commits them to the mounted tree.
//!
//! A node is reused verbatim when its component is unchanged and nothing it
//! read (a param, the query, the session, the inherited context) changed.
//! Every pass mints a token; only the pass holding the latest token may
//! commit, so the last navigation always wins.

pub mod cache;
mod load;
mod session;
mod stores;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arcstr::ArcStr;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::host::{Fetch, Mount, NoFetch};
use crate::manifest::{DEFAULT_ERROR, DEFAULT_LAYOUT};
use crate::router::NavigationTarget;
use crate::routes::RouteNode;
use crate::{ComponentId, Page, RenderError};

use cache::{CacheKey, NodeCache};
use load::{normalize, Changed, Normalized};

pub use load::{Context, LoadInput, LoadOutput, Loader, PageError, Redirect, Uses};
pub use session::Session;
pub use stores::{Navigating, Stores};

/// Props handed to the root component on every commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootProps {
    pub status: u16,
    pub error: Option<PageError>,
    /// Components of the branch, root layout first.
    pub components: Vec<ComponentId>,
    /// Props for each entry in `components`.
    pub props: Vec<Map<String, Value>>,
    pub page: Page,
}

/// A node's runtime record for one branch.
#[derive(Debug, Clone)]
pub(crate) struct LoadedNode {
    pub component: ComponentId,
    pub uses: Uses,
    pub props: Map<String, Value>,
    /// Context this node contributes to its descendants.
    pub context: Option<Context>,
    /// Stands in for a node whose load never completed. Never reused.
    pub placeholder: bool,
}

impl LoadedNode {
    pub(crate) fn empty(component: ComponentId) -> Self {
        Self {
            component,
            uses: Uses::default(),
            props: Map::new(),
            context: None,
            placeholder: false,
        }
    }

    /// An unloaded node shown in an error branch.
    pub(crate) fn placeholder(component: ComponentId) -> Self {
        Self {
            placeholder: true,
            ..Self::empty(component)
        }
    }
}

/// What happened to a render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Committed,
    /// A newer pass started before this one finished; nothing was committed.
    Superseded,
    /// A load step asked to go elsewhere; nothing was committed.
    Redirect(Redirect),
}

#[derive(Debug, Clone)]
struct Prepared {
    page: Page,
    branch: Vec<LoadedNode>,
    status: u16,
    error: Option<PageError>,
    session_version: u64,
}

#[derive(Debug, Clone)]
enum Pass {
    Ready(Prepared),
    Redirect(Redirect),
}

enum NodeResult {
    Loaded {
        node: LoadedNode,
        maxage: Option<Duration>,
    },
    Failed {
        status: u16,
        error: PageError,
    },
    Redirect(Redirect),
}

/// A prepared pass waiting for the navigation that asked for it.
#[derive(Debug)]
struct Prefetched {
    href: String,
    session_version: u64,
    pass: Pass,
}

#[derive(Debug, Default)]
struct Current {
    target: Option<NavigationTarget>,
    page: Option<Page>,
    branch: Vec<LoadedNode>,
    session_version: u64,
}

pub struct Renderer {
    mount: Arc<dyn Mount>,
    fetcher: Arc<dyn Fetch>,
    session: Session,
    stores: Stores,
    cache: NodeCache,
    target: String,
    hydrate: bool,
    token: AtomicU64,
    mounted: AtomicBool,
    current: Mutex<Current>,
    prefetched: Mutex<Option<Prefetched>>,
}

impl Renderer {
    pub fn new(mount: Arc<dyn Mount>, session: Session) -> Self {
        Self {
            mount,
            fetcher: Arc::new(NoFetch),
            session,
            stores: Stores::new(),
            cache: NodeCache::new(),
            target: "body".to_string(),
            hydrate: true,
            token: AtomicU64::new(0),
            mounted: AtomicBool::new(false),
            current: Mutex::new(Current::default()),
            prefetched: Mutex::new(None),
        }
    }

    pub fn with_fetch(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Selector of the DOM node the root component mounts into.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Whether the first mount reconciles with server-rendered markup.
    pub fn with_hydrate(mut self, hydrate: bool) -> Self {
        self.hydrate = hydrate;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    /// Target of the last committed pass.
    pub fn current_target(&self) -> Option<NavigationTarget> {
        self.current.lock().target.clone()
    }

    /// Run a full pass for `target` and commit it if it is still the latest.
    pub async fn render(&self, target: &NavigationTarget) -> Result<RenderOutcome, RenderError> {
        let token = self.token.fetch_add(1, Ordering::SeqCst) + 1;

        let pass = match self.take_prefetched(target) {
            Some(pass) => Ok(pass),
            None => self.prepare(target).await,
        };

        if self.token.load(Ordering::SeqCst) != token {
            debug!(href = %target.href, token, "discarding superseded render pass");
            return Ok(RenderOutcome::Superseded);
        }

        match pass? {
            Pass::Redirect(redirect) => {
                info!(href = %target.href, location = %redirect.location, "load redirected");
                Ok(RenderOutcome::Redirect(redirect))
            }
            Pass::Ready(prepared) => {
                self.commit(target, prepared);
                Ok(RenderOutcome::Committed)
            }
        }
    }

    /// Run the load phase for `target` without committing. The next
    /// [`render`](Self::render) of the same href uses the result.
    pub async fn prefetch(&self, target: &NavigationTarget) -> Result<(), RenderError> {
        let session_version = self.session.version();
        let pass = self.prepare(target).await?;
        *self.prefetched.lock() = Some(Prefetched {
            href: target.href.to_string(),
            session_version,
            pass,
        });
        Ok(())
    }

    /// Hand over the stashed pass for `target`. A stash computed against an
    /// older session is dropped.
    fn take_prefetched(&self, target: &NavigationTarget) -> Option<Pass> {
        let mut slot = self.prefetched.lock();
        if slot.as_ref()?.href != target.href.as_str() {
            return None;
        }
        let stashed = slot.take()?;
        if stashed.session_version != self.session.version() {
            debug!(href = %target.href, "session changed since prefetch, loading again");
            return None;
        }
        debug!(href = %target.href, "using prefetched result");
        Some(stashed.pass)
    }

    async fn prepare(&self, target: &NavigationTarget) -> Result<Pass, RenderError> {
        let page = &target.page;
        let route = &target.route;
        let session_version = self.session.version();

        let (previous_page, previous_branch, previous_session) = {
            let current = self.current.lock();
            (
                current.page.clone(),
                current.branch.clone(),
                current.session_version,
            )
        };
        let changed = Changed::between(
            previous_page.as_ref(),
            page,
            session_version != previous_session,
        );
        let path_and_query = page.path_and_query();

        let mut context = Context::new();
        let mut context_changed = false;
        let mut branch: Vec<LoadedNode> = Vec::with_capacity(route.nodes.len());
        let mut redirect: Option<Redirect> = None;
        let mut failure: Option<(usize, u16, PageError)> = None;

        for (index, node) in route.nodes.iter().enumerate() {
            // what the node at this depth handed down last time
            let previous_context = previous_branch.get(index).and_then(|p| p.context.as_ref());
            let previous = previous_branch
                .get(index)
                .filter(|p| p.component == node.component && !p.placeholder);
            if let Some(previous) = previous {
                if !previous.uses.invalidated_by(&changed, context_changed) {
                    debug!(component = %node.component, "node unchanged, reusing");
                    if let Some(own) = &previous.context {
                        context.extend(own.clone());
                    }
                    branch.push(previous.clone());
                    continue;
                }
            }

            let key = CacheKey {
                component: node.component.clone(),
                path_and_query: path_and_query.clone(),
            };
            let hit = self
                .cache
                .get(&key, session_version)
                .filter(|hit| !hit.uses.context || !context_changed);
            if let Some(hit) = hit {
                debug!(component = %node.component, path = %path_and_query, "cache hit");
                context_changed |= hit.context.as_ref() != previous_context;
                if let Some(own) = &hit.context {
                    context.extend(own.clone());
                }
                branch.push(hit);
                continue;
            }

            match self.load_node(node, target, &context).await {
                NodeResult::Loaded { node: loaded, maxage } => {
                    if let Some(maxage) = maxage {
                        self.cache
                            .insert(key, loaded.clone(), maxage, &self.session);
                    }
                    context_changed |= loaded.context.as_ref() != previous_context;
                    if let Some(own) = &loaded.context {
                        context.extend(own.clone());
                    }
                    branch.push(loaded);
                }
                NodeResult::Failed { status, error } => {
                    failure = Some((index, status, error));
                    break;
                }
                NodeResult::Redirect(next) => {
                    // Loads run in order and stop at the first redirect, so
                    // RedirectConflict cannot be raised from this loop.
                    record_redirect(&mut redirect, next)?;
                    break;
                }
            }
        }

        if let Some(redirect) = redirect {
            return Ok(Pass::Redirect(redirect));
        }

        let prepared = match failure {
            None => Prepared {
                page: page.clone(),
                branch,
                status: 200,
                error: None,
                session_version,
            },
            Some((failed_at, status, error)) => {
                warn!(href = %target.href, status, error = %error.message, "load failed");
                Prepared {
                    page: page.clone(),
                    branch: error_branch(target, branch, failed_at, status, &error),
                    status,
                    error: Some(error),
                    session_version,
                }
            }
        };

        Ok(Pass::Ready(prepared))
    }

    async fn load_node(
        &self,
        node: &RouteNode,
        target: &NavigationTarget,
        context: &Context,
    ) -> NodeResult {
        let Some(loader) = &node.loader else {
            return NodeResult::Loaded {
                node: LoadedNode::empty(node.component.clone()),
                maxage: None,
            };
        };

        debug!(component = %node.component, "running load");
        let input = LoadInput::new(
            target.page.clone(),
            target.href.clone(),
            self.session.get(),
            context.clone(),
            Arc::clone(&self.fetcher),
        );
        let result = loader.load(&input).await;
        let uses = input.into_uses();

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                return NodeResult::Failed {
                    status: 500,
                    error: PageError::from(err),
                }
            }
        };

        match normalize(output) {
            Normalized::Data {
                props,
                context,
                maxage,
            } => NodeResult::Loaded {
                node: LoadedNode {
                    component: node.component.clone(),
                    uses,
                    props,
                    context,
                    placeholder: false,
                },
                maxage,
            },
            Normalized::Error { status, error } => NodeResult::Failed { status, error },
            Normalized::Redirect(redirect) => NodeResult::Redirect(redirect),
        }
    }

    fn commit(&self, target: &NavigationTarget, prepared: Prepared) {
        let props = RootProps {
            status: prepared.status,
            error: prepared.error,
            components: prepared
                .branch
                .iter()
                .map(|n| n.component.clone())
                .collect(),
            props: prepared.branch.iter().map(|n| n.props.clone()).collect(),
            page: prepared.page.clone(),
        };

        {
            let mut current = self.current.lock();
            *current = Current {
                target: Some(target.clone()),
                page: Some(prepared.page.clone()),
                branch: prepared.branch,
                session_version: prepared.session_version,
            };
        }

        if self.mounted.swap(true, Ordering::SeqCst) {
            self.mount.update(&props);
        } else {
            info!(target = %self.target, hydrate = self.hydrate, "mounting root component");
            self.mount.construct(&self.target, &props, self.hydrate);
        }
        self.stores.set_page(prepared.page);
        debug!(href = %target.href, status = props.status, "render committed");
    }
}

/// Two nodes of one pass asking for different destinations is a hard error.
fn record_redirect(slot: &mut Option<Redirect>, next: Redirect) -> Result<(), RenderError> {
    match slot {
        Some(first) if first.location != next.location => Err(RenderError::RedirectConflict {
            first: first.location.clone(),
            second: next.location,
        }),
        Some(_) => Ok(()),
        None => {
            *slot = Some(next);
            Ok(())
        }
    }
}

/// Truncate `branch` to the deepest loaded layout owning an error boundary
/// and append that boundary with `{ status, error }` props. A failing root
/// layout falls back to an unloaded root layout plus the root boundary.
fn error_branch(
    target: &NavigationTarget,
    branch: Vec<LoadedNode>,
    failed_at: usize,
    status: u16,
    error: &PageError,
) -> Vec<LoadedNode> {
    let route = &target.route;
    let owner = (0..failed_at)
        .rev()
        .find(|&k| route.errors.get(k).is_some_and(Option::is_some));

    let (mut kept, boundary) = match owner {
        Some(k) => (
            branch.into_iter().take(k + 1).collect::<Vec<_>>(),
            route.errors[k].as_ref().map(|b| b.component.clone()),
        ),
        None => {
            let root = route
                .nodes
                .first()
                .map(|n| n.component.clone())
                .unwrap_or_else(|| ArcStr::from(DEFAULT_LAYOUT));
            (
                vec![LoadedNode::placeholder(root)],
                route.errors.first().cloned().flatten().map(|b| b.component),
            )
        }
    };

    let mut boundary =
        LoadedNode::placeholder(boundary.unwrap_or_else(|| ArcStr::from(DEFAULT_ERROR)));
    boundary.props.insert("status".into(), json!(status));
    boundary
        .props
        .insert("error".into(), json!({ "message": error.message }));
    kept.push(boundary);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_redirects_are_not_a_conflict() {
        let mut slot = None;
        record_redirect(&mut slot, Redirect { status: 302, location: "/a".into() }).unwrap();
        record_redirect(&mut slot, Redirect { status: 301, location: "/a".into() }).unwrap();
        assert_eq!(slot.unwrap().location, "/a");
    }

    #[test]
    fn different_redirects_conflict() {
        let mut slot = None;
        record_redirect(&mut slot, Redirect { status: 302, location: "/a".into() }).unwrap();
        let err = record_redirect(&mut slot, Redirect { status: 302, location: "/b".into() }).unwrap_err();
        assert_eq!(
            err,
            RenderError::RedirectConflict {
                first: "/a".into(),
                second: "/b".into()
            }
        );
    }
}
