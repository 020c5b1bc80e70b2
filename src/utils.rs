//! URL helpers shared by the router and the renderer.
//!
//! - Base-path stripping
//! - Origin and same-document checks
//! - Href resolution

use url::Url;

use crate::NavigationError;

// ---------------------------------------------------------------------------
// Base path
// ---------------------------------------------------------------------------

/// Normalize a configured base path: no trailing slash, leading slash unless
/// empty. `"/"`, `""` and `"app/"` become `""`, `""` and `"/app"`.
pub fn normalize_base(base: &str) -> String {
    let trimmed = base.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Strip `base` from `path`. Returns `None` when the path lies outside the
/// base; an empty remainder becomes `/`.
pub fn strip_base(path: &str, base: &str) -> Option<String> {
    let base = normalize_base(base);
    if base.is_empty() {
        return Some(if path.is_empty() { "/".to_string() } else { path.to_string() });
    }

    let rest = path.strip_prefix(base.as_str())?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        // `/application` is not inside `/app`
        None
    }
}

// ---------------------------------------------------------------------------
// Origin / document
// ---------------------------------------------------------------------------

pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

/// `host[:port]`, as `location.host` reports it.
pub fn host_with_port(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

pub fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// True when `a` and `b` address the same document and differ at most in
/// their fragment.
pub fn same_document(a: &Url, b: &Url) -> bool {
    without_fragment(a) == without_fragment(b)
}

/// Resolve `href` against `base`, as an anchor's `href` property would.
pub fn resolve(base: &Url, href: &str) -> Result<Url, NavigationError> {
    base.join(href).map_err(|err| NavigationError::InvalidHref {
        href: href.to_string(),
        reason: err.to_string(),
    })
}
