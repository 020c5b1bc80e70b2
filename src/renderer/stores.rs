//! Observable `page` and `navigating` stores.

use tokio::sync::watch;
use url::Url;

use crate::Page;

/// An in-flight navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigating {
    pub from: Option<Url>,
    pub to: Url,
}

#[derive(Debug)]
pub struct Stores {
    page: watch::Sender<Option<Page>>,
    navigating: watch::Sender<Option<Navigating>>,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            page: watch::channel(None).0,
            navigating: watch::channel(None).0,
        }
    }

    /// Last committed page.
    pub fn page(&self) -> watch::Receiver<Option<Page>> {
        self.page.subscribe()
    }

    pub fn navigating(&self) -> watch::Receiver<Option<Navigating>> {
        self.navigating.subscribe()
    }

    pub(crate) fn set_page(&self, page: Page) {
        self.page.send_replace(Some(page));
    }

    pub(crate) fn set_navigating(&self, navigating: Option<Navigating>) {
        self.navigating.send_replace(navigating);
    }
}

impl Default for Stores {
    fn default() -> Self {
        Self::new()
    }
}
