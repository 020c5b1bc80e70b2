//! Pattern compilation and the specificity comparator.

use std::cmp::Ordering;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use super::parts::Part;

/// Controls, space, double quote, backtick and `%<>\^{|}`, plus `?` and `#`
/// which would otherwise start a query or fragment. Everything else, `[` and
/// `]` included, is left as is.
const STATIC_PART: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b'?')
    .add(b'#');

const PARAM: &str = "([^/]+?)";
const SPREAD: &str = "(.+)";

/// Percent-encode then regex-escape a static part.
pub fn encode_static(content: &str) -> String {
    let encoded = utf8_percent_encode(content, STATIC_PART).to_string();
    regex::escape(&encoded)
}

/// Build the anchored pattern source for a route.
///
/// Pages get an optional trailing slash (`\/?$`); endpoints match exactly.
pub fn get_pattern(segments: &[Vec<Part>], add_trailing_slash: bool) -> String {
    let mut path = String::new();

    for segment in segments {
        if let [part] = segment.as_slice() {
            if part.optional {
                let capture = part.qualifier.as_deref().unwrap_or(PARAM);
                path.push_str(&format!(r"(?:\/{capture})?"));
                continue;
            }
        }

        path.push_str(r"\/");
        for part in segment {
            if part.dynamic {
                let capture = match &part.qualifier {
                    Some(qualifier) => qualifier.as_str(),
                    None if part.spread => SPREAD,
                    None => PARAM,
                };
                path.push_str(capture);
            } else {
                path.push_str(&encode_static(&part.content));
            }
        }
    }

    if segments.is_empty() {
        return r"^\/$".to_string();
    }

    let all_optional = segments
        .iter()
        .all(|s| matches!(s.as_slice(), [p] if p.optional));
    let trailing = if add_trailing_slash || all_optional {
        r"\/?$"
    } else {
        "$"
    };

    format!("^{path}{trailing}")
}

/// A sibling entry (file or directory) within one routes directory.
#[derive(Debug, Clone)]
pub struct Item {
    pub basename: String,
    pub parts: Vec<Part>,
    pub is_dir: bool,
    pub is_index: bool,
    /// True when the item, or any directory above it, is a spread segment.
    pub under_spread: bool,
}

/// Specificity order between siblings. `Less` means `a` is tried first.
pub fn compare_items(a: &Item, b: &Item) -> Ordering {
    if a.is_index != b.is_index {
        return if a.is_index {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if a.is_index && a.under_spread != b.under_spread {
        return if a.under_spread {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    let max = a.parts.len().max(b.parts.len());
    for i in 0..max {
        match (a.parts.get(i), b.parts.get(i)) {
            (None, Some(_)) => return shorter_first(&a.parts, &b.parts[i..]),
            (Some(_), None) => return shorter_first(&b.parts, &a.parts[i..]).reverse(),
            (Some(pa), Some(pb)) => {
                let ord = compare_parts(pa, pb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (None, None) => break,
        }
    }

    a.is_dir
        .cmp(&b.is_dir)
        .then_with(|| a.basename.cmp(&b.basename))
}

/// `short` ran out of parts while the other item still has `remaining`.
/// The shorter item is more specific unless both end in catch-alls, in which
/// case the longer one demands more text and goes first.
fn shorter_first(short: &[Part], remaining: &[Part]) -> Ordering {
    let short_ends_in_spread = short.last().is_some_and(|p| p.spread);
    if short_ends_in_spread && remaining.iter().any(|p| p.spread) {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

fn compare_parts(a: &Part, b: &Part) -> Ordering {
    if a.spread != b.spread {
        return if a.spread {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if a.dynamic != b.dynamic {
        return if a.dynamic {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    if !a.dynamic {
        if a.content != b.content {
            return b
                .content
                .len()
                .cmp(&a.content.len())
                .then_with(|| a.content.cmp(&b.content));
        }
        return Ordering::Equal;
    }

    if a.optional != b.optional {
        return if a.optional {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    match (&a.qualifier, &b.qualifier) {
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(qa), Some(qb)) if qa != qb => qb.len().cmp(&qa.len()),
        _ => Ordering::Equal,
    }
}
