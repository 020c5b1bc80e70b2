//! DOM events the router listens to, reduced to plain data.

use url::Url;

use crate::utils;

/// The enclosing `<a>` of a click or hover target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    /// Raw `href` attribute.
    pub href: String,
    /// `target` attribute.
    pub target: Option<String>,
    pub download: bool,
    pub rel: Option<String>,
    /// `zenith:noscroll`
    pub noscroll: bool,
    /// `zenith:prefetch`
    pub prefetch: bool,
}

impl Anchor {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Default::default()
        }
    }

    fn is_external(&self) -> bool {
        self.rel
            .as_deref()
            .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t == "external"))
    }

    fn has_target(&self) -> bool {
        self.target.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// A document-level click.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickEvent {
    /// `MouseEvent.button`; `0` is the primary button.
    pub button: u16,
    pub meta_key: bool,
    pub ctrl_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    /// Set by an earlier listener, or by the router once it takes over.
    pub default_prevented: bool,
    pub anchor: Option<Anchor>,
}

impl ClickEvent {
    /// Plain primary-button click on `anchor`.
    pub fn on(anchor: Anchor) -> Self {
        Self {
            anchor: Some(anchor),
            ..Default::default()
        }
    }

    fn is_modified(&self) -> bool {
        self.meta_key || self.ctrl_key || self.shift_key || self.alt_key
    }
}

/// What the router does with a click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClickAction {
    /// Leave it to the browser.
    Ignore,
    /// A link to the exact current URL: swallow it rather than reload.
    Prevent,
    /// A candidate for client-side navigation.
    Follow(Url),
}

pub(crate) fn classify_click(event: &ClickEvent, location: &Url) -> ClickAction {
    if event.button != 0 || event.is_modified() || event.default_prevented {
        return ClickAction::Ignore;
    }
    let Some(anchor) = &event.anchor else {
        return ClickAction::Ignore;
    };
    if anchor.href.is_empty() {
        return ClickAction::Ignore;
    }
    let Ok(url) = location.join(&anchor.href) else {
        return ClickAction::Ignore;
    };

    if url == *location {
        return if location.fragment().is_none() {
            ClickAction::Prevent
        } else {
            ClickAction::Ignore
        };
    }
    if anchor.download || anchor.is_external() || anchor.has_target() {
        return ClickAction::Ignore;
    }
    if utils::same_document(&url, location) {
        return ClickAction::Ignore;
    }

    ClickAction::Follow(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> Url {
        Url::parse("https://example.com/blog").unwrap()
    }

    #[test]
    fn follows_plain_links() {
        let event = ClickEvent::on(Anchor::new("/about?x=1"));
        assert_eq!(
            classify_click(&event, &location()),
            ClickAction::Follow(Url::parse("https://example.com/about?x=1").unwrap())
        );
    }

    #[test]
    fn ignores_modified_and_secondary_clicks() {
        let mut event = ClickEvent::on(Anchor::new("/about"));
        event.meta_key = true;
        assert_eq!(classify_click(&event, &location()), ClickAction::Ignore);

        let mut event = ClickEvent::on(Anchor::new("/about"));
        event.button = 1;
        assert_eq!(classify_click(&event, &location()), ClickAction::Ignore);

        let mut event = ClickEvent::on(Anchor::new("/about"));
        event.default_prevented = true;
        assert_eq!(classify_click(&event, &location()), ClickAction::Ignore);
    }

    #[test]
    fn ignores_download_external_and_targeted_links() {
        let mut anchor = Anchor::new("/file.pdf");
        anchor.download = true;
        assert_eq!(classify_click(&ClickEvent::on(anchor), &location()), ClickAction::Ignore);

        let mut anchor = Anchor::new("/legacy");
        anchor.rel = Some("noopener external".into());
        assert_eq!(classify_click(&ClickEvent::on(anchor), &location()), ClickAction::Ignore);

        let mut anchor = Anchor::new("/about");
        anchor.target = Some("_blank".into());
        assert_eq!(classify_click(&ClickEvent::on(anchor), &location()), ClickAction::Ignore);
    }

    #[test]
    fn hash_links_stay_with_the_browser() {
        let event = ClickEvent::on(Anchor::new("#comments"));
        assert_eq!(classify_click(&event, &location()), ClickAction::Ignore);
    }

    #[test]
    fn link_to_current_url_is_swallowed() {
        let event = ClickEvent::on(Anchor::new("/blog"));
        assert_eq!(classify_click(&event, &location()), ClickAction::Prevent);
    }
}
