//! File-name tokenizer.
//!
//! A route segment such as `foo-[bar]` or `[id([0-9]+)]` is split into an
//! ordered list of [`Part`]s, alternating static text and parameters.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ManifestError;

/// One token of a route segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Literal text for static parts, parameter name for dynamic ones
    /// (without the `...` spread prefix).
    pub content: String,
    pub dynamic: bool,
    pub spread: bool,
    /// `[[name]]`: the whole segment may be absent.
    pub optional: bool,
    /// User-supplied capture group, e.g. `([0-9]+)`.
    pub qualifier: Option<String>,
}

impl Part {
    fn literal(content: &str) -> Self {
        Self {
            content: content.to_string(),
            dynamic: false,
            spread: false,
            optional: false,
            qualifier: None,
        }
    }
}

fn param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\[([^\]]+)\]\]|\[(.+?\(.+?\)|.+?)\]").expect("static regex is valid")
    })
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_$]+$").expect("static regex is valid"))
}

/// Split one segment into parts. `file` is only used for error messages.
pub fn get_parts(segment: &str, file: &str) -> Result<Vec<Part>, ManifestError> {
    let mut parts = Vec::new();
    let mut last_end = 0;
    let mut last_dynamic_end: Option<usize> = None;

    for caps in param_re().captures_iter(segment) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };

        if whole.start() > last_end {
            parts.push(Part::literal(&segment[last_end..whole.start()]));
        } else if last_dynamic_end == Some(whole.start()) {
            return Err(ManifestError::Malformed {
                file: file.to_string(),
                reason: "parameters must be separated".into(),
            });
        }

        let part = if let Some(optional) = caps.get(1) {
            let name = optional.as_str();
            validate_name(name, file)?;
            Part {
                content: name.to_string(),
                dynamic: true,
                spread: false,
                optional: true,
                qualifier: None,
            }
        } else {
            let inner = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            parse_dynamic(inner, file)?
        };

        parts.push(part);
        last_end = whole.end();
        last_dynamic_end = Some(whole.end());
    }

    if last_end < segment.len() {
        parts.push(Part::literal(&segment[last_end..]));
    }

    if parts.len() > 1 && parts.iter().any(|p| p.optional) {
        return Err(ManifestError::Malformed {
            file: file.to_string(),
            reason: "an optional parameter must be a standalone segment".into(),
        });
    }

    Ok(parts)
}

fn parse_dynamic(inner: &str, file: &str) -> Result<Part, ManifestError> {
    let (content, qualifier) = match inner.find('(') {
        Some(idx) if inner.ends_with(')') && idx > 0 => (&inner[..idx], Some(&inner[idx..])),
        _ => (inner, None),
    };

    let (name, spread) = match content.strip_prefix("...") {
        Some(rest) => (rest, true),
        None => (content, false),
    };
    validate_name(name, file)?;

    if let Some(qualifier) = qualifier {
        let body = &qualifier[1..qualifier.len() - 1];
        if body.is_empty() || body.contains(['(', ')', '?', ':']) {
            return Err(ManifestError::InvalidQualifier {
                file: file.to_string(),
                qualifier: qualifier.to_string(),
            });
        }
    }

    Ok(Part {
        content: name.to_string(),
        dynamic: true,
        spread,
        optional: false,
        qualifier: qualifier.map(str::to_string),
    })
}

fn validate_name(name: &str, file: &str) -> Result<(), ManifestError> {
    if name_re().is_match(name) {
        Ok(())
    } else {
        Err(ManifestError::InvalidParamName {
            file: file.to_string(),
            name: name.to_string(),
        })
    }
}
