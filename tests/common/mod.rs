//! Shared fixtures: an in-memory browser host, a recording mount and
//! scriptable load steps.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use zenith_router::host::{HistoryState, Host, Mount, ScrollPosition, ScrollRestoration};
use zenith_router::{
    compile_files, LoadInput, LoadOutput, Loader, ManifestConfig, NodeRegistry, Renderer, RootProps,
    RouteTable, Router, RouterConfig, Session,
};

pub const ORIGIN: &str = "https://example.com";

pub fn page_url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

// ============================================================================
// Host
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Push(u64, String),
    Replace(u64, String),
    ScrollTo(ScrollPosition),
    Blur,
    Assign(String),
    Reload,
    Restoration(ScrollRestoration),
}

#[derive(Debug)]
struct Browser {
    entries: Vec<(Option<HistoryState>, Url)>,
    index: usize,
    scroll: ScrollPosition,
    elements: HashMap<String, ScrollPosition>,
    calls: Vec<HostCall>,
}

/// A single browser tab kept in memory.
#[derive(Debug)]
pub struct MockHost {
    inner: Mutex<Browser>,
}

impl MockHost {
    pub fn new(start: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Browser {
                entries: vec![(None, page_url(start))],
                index: 0,
                scroll: ScrollPosition::TOP,
                elements: HashMap::new(),
                calls: Vec::new(),
            }),
        })
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// User scrolled the page.
    pub fn scroll_by_user(&self, y: f64) {
        self.inner.lock().scroll = ScrollPosition::new(0.0, y);
    }

    pub fn scroll(&self) -> ScrollPosition {
        self.inner.lock().scroll
    }

    pub fn add_element(&self, id: &str, position: ScrollPosition) {
        self.inner.lock().elements.insert(id.to_string(), position);
    }

    /// Browser back button. Returns the state to hand to `on_popstate`.
    pub fn back(&self) -> Option<HistoryState> {
        let mut inner = self.inner.lock();
        inner.index = inner.index.saturating_sub(1);
        inner.entries[inner.index].0
    }

    pub fn forward(&self) -> Option<HistoryState> {
        let mut inner = self.inner.lock();
        if inner.index + 1 < inner.entries.len() {
            inner.index += 1;
        }
        inner.entries[inner.index].0
    }

    /// Overwrite the current entry's URL, as a stale history entry would.
    pub fn set_location(&self, path: &str) {
        let mut inner = self.inner.lock();
        let index = inner.index;
        inner.entries[index].1 = page_url(path);
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

impl Host for MockHost {
    fn location(&self) -> Url {
        let inner = self.inner.lock();
        inner.entries[inner.index].1.clone()
    }

    fn history_state(&self) -> Option<HistoryState> {
        let inner = self.inner.lock();
        inner.entries[inner.index].0
    }

    fn push_state(&self, state: HistoryState, url: &Url) {
        let mut inner = self.inner.lock();
        let keep = inner.index + 1;
        inner.entries.truncate(keep);
        inner.entries.push((Some(state), url.clone()));
        inner.index = keep;
        inner.calls.push(HostCall::Push(state.id, url.path().to_string()));
    }

    fn replace_state(&self, state: HistoryState, url: &Url) {
        let mut inner = self.inner.lock();
        let index = inner.index;
        inner.entries[index] = (Some(state), url.clone());
        inner.calls.push(HostCall::Replace(state.id, url.path().to_string()));
    }

    fn scroll_position(&self) -> ScrollPosition {
        self.inner.lock().scroll
    }

    fn scroll_to(&self, position: ScrollPosition) {
        let mut inner = self.inner.lock();
        inner.scroll = position;
        inner.calls.push(HostCall::ScrollTo(position));
    }

    fn element_position(&self, fragment: &str) -> Option<ScrollPosition> {
        self.inner.lock().elements.get(fragment).copied()
    }

    fn blur_active_element(&self) {
        self.inner.lock().calls.push(HostCall::Blur);
    }

    fn assign(&self, url: &Url) {
        self.inner.lock().calls.push(HostCall::Assign(url.to_string()));
    }

    fn reload(&self) {
        self.inner.lock().calls.push(HostCall::Reload);
    }

    fn set_scroll_restoration(&self, mode: ScrollRestoration) {
        self.inner.lock().calls.push(HostCall::Restoration(mode));
    }
}

// ============================================================================
// Mount
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MountCall {
    Construct {
        target: String,
        props: RootProps,
        hydrate: bool,
    },
    Update(RootProps),
}

impl MountCall {
    pub fn props(&self) -> &RootProps {
        match self {
            MountCall::Construct { props, .. } => props,
            MountCall::Update(props) => props,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockMount {
    calls: Mutex<Vec<MountCall>>,
}

impl MockMount {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<MountCall> {
        self.calls.lock().clone()
    }

    pub fn last(&self) -> RootProps {
        self.calls
            .lock()
            .last()
            .map(|call| call.props().clone())
            .expect("nothing was mounted")
    }

    /// Paths of every committed page, in commit order.
    pub fn committed_paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|call| call.props().page.path.clone())
            .collect()
    }
}

impl Mount for MockMount {
    fn construct(&self, target: &str, props: &RootProps, hydrate: bool) {
        self.calls.lock().push(MountCall::Construct {
            target: target.to_string(),
            props: props.clone(),
            hydrate,
        });
    }

    fn update(&self, props: &RootProps) {
        self.calls.lock().push(MountCall::Update(props.clone()));
    }
}

// ============================================================================
// Loaders
// ============================================================================

type LoadFn = dyn Fn(&LoadInput) -> anyhow::Result<LoadOutput> + Send + Sync;

/// A load step backed by a closure, counting its invocations.
pub struct TestLoader {
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
    body: Box<LoadFn>,
}

#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl TestLoader {
    pub fn new<F>(body: F) -> (Self, Calls)
    where
        F: Fn(&LoadInput) -> anyhow::Result<LoadOutput> + Send + Sync + 'static,
    {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: Arc::clone(&calls),
                delay: None,
                body: Box::new(body),
            },
            Calls(calls),
        )
    }

    /// Sleep before producing the result.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Loader for TestLoader {
    async fn load(&self, input: &LoadInput) -> anyhow::Result<LoadOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.body)(input)
    }
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    pub router: Router,
    pub host: Arc<MockHost>,
    pub mount: Arc<MockMount>,
    pub session: Session,
}

pub fn table(files: &[&str], registry: &NodeRegistry) -> RouteTable {
    let compiled = compile_files(files.iter().copied(), &ManifestConfig::default()).unwrap();
    RouteTable::from_manifest(&compiled.data, registry).unwrap()
}

pub fn app(files: &[&str], registry: NodeRegistry, start: &str) -> App {
    app_with(files, registry, start, RouterConfig::default())
}

pub fn app_with(files: &[&str], registry: NodeRegistry, start: &str, config: RouterConfig) -> App {
    let host = MockHost::new(start);
    let mount = MockMount::new();
    let session = Session::default();
    let renderer = Renderer::new(mount.clone(), session.clone());
    let router = Router::new(config, table(files, &registry), host.clone(), renderer);
    App {
        router,
        host,
        mount,
        session,
    }
}
