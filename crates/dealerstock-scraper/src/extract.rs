//! Markup primitives shared by the per-origin parsers: text cleanup, bounded
//! windows, attribute lookup, and embedded JSON discovery.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<!--.*?-->").expect("valid regex")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static JSONLD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:src|data-src|data-lazy-src|data-original|srcset|content|href)\s*=\s*["']([^"'\s,]+?\.(?:jpe?g|png|webp|avif)(?:\?[^"'\s,]*)?)"#,
    )
    .expect("valid regex")
});

/// Removes `<script>`/`<style>` bodies, comments and tags. Tags become a
/// single space so adjacent cells do not run together.
#[must_use]
pub fn strip_tags(markup: &str) -> String {
    let without_blocks = SCRIPT_STYLE_RE.replace_all(markup, " ");
    TAG_RE.replace_all(&without_blocks, " ").into_owned()
}

/// Decodes the named entities listed below plus decimal and hex numeric
/// references. Unknown entities are left as-is.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let semi = candidate
            .char_indices()
            .take(12)
            .find(|(_, c)| *c == ';')
            .map(|(i, _)| i);
        let Some(semi) = semi else {
            out.push('&');
            rest = &candidate[1..];
            continue;
        };
        let entity = &candidate[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" | "#39" => Some('\''),
            "nbsp" => Some(' '),
            "euro" => Some('€'),
            "auml" => Some('ä'),
            "ouml" => Some('ö'),
            "uuml" => Some('ü'),
            "Auml" => Some('Ä'),
            "Ouml" => Some('Ö'),
            "Uuml" => Some('Ü'),
            "szlig" => Some('ß'),
            _ => decode_numeric(entity),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_numeric(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}

/// Strips markup, decodes entities, drops control characters, collapses
/// whitespace and trims. Applying it twice yields the same string.
#[must_use]
pub fn clean_text(raw: &str) -> String {
    let stripped = strip_tags(raw);
    let decoded = decode_entities(&stripped);
    // A second pass catches markup that was entity-encoded (`&lt;b&gt;`).
    let decoded = if decoded.contains('<') {
        strip_tags(&decoded)
    } else {
        decoded
    };
    decoded
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the slice `[at - before, at + after)` of `s`, with both bounds
/// snapped outward to UTF-8 char boundaries.
#[must_use]
pub fn bounded_window(s: &str, at: usize, before: usize, after: usize) -> &str {
    let at = at.min(s.len());
    let candidate_start = at.saturating_sub(before);
    let start = (0..=candidate_start)
        .rev()
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(0);
    let candidate_end = at.saturating_add(after).min(s.len());
    let end = (candidate_end..=s.len())
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(s.len());
    &s[start..end]
}

/// Text of the first capture group of `re` in `s`, cleaned; `None` when it
/// is absent or empty after cleaning.
#[must_use]
pub fn first_capture(re: &Regex, s: &str) -> Option<String> {
    re.captures(s)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_text(m.as_str()))
        .filter(|t| !t.is_empty())
}

/// One listing block located by its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct IdWindow<'a> {
    pub id: String,
    pub window: &'a str,
}

/// Finds every distinct id matched by capture group 1 of `id_re`, in order of
/// first appearance, and scopes a window around each. The window starts
/// `before` bytes ahead of the match but never before the end of the previous
/// different id's match; it ends at the next different id's match or `after`
/// bytes past it, whichever comes first.
#[must_use]
pub fn id_windows<'a>(markup: &'a str, id_re: &Regex, before: usize, after: usize) -> Vec<IdWindow<'a>> {
    let matches: Vec<(String, usize, usize)> = id_re
        .captures_iter(markup)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let id = caps.get(1)?.as_str().trim().to_string();
            (!id.is_empty()).then_some((id, whole.start(), whole.end()))
        })
        .collect();

    let mut seen = std::collections::HashSet::new();
    let mut windows = Vec::new();
    for (idx, (id, start, end)) in matches.iter().enumerate() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let next_other = matches[idx + 1..]
            .iter()
            .find(|(other, ..)| other != id)
            .map_or(markup.len(), |(_, s, _)| *s);
        let prev_other = matches[..idx]
            .iter()
            .rev()
            .find(|(other, ..)| other != id)
            .map_or(0, |(_, _, e)| *e);
        let limit = end.saturating_add(after).min(next_other).max(*end);
        let before = before.min(start.saturating_sub(prev_other));
        let window = bounded_window(markup, *start, before, limit - start);
        windows.push(IdWindow {
            id: id.clone(),
            window,
        });
    }
    windows
}

/// Value of attribute `name` in the first tag of `tag_markup`.
#[must_use]
pub fn attr(tag_markup: &str, name: &str) -> Option<String> {
    let lower = tag_markup.to_ascii_lowercase();
    let needle = format!("{}=", name.to_ascii_lowercase());
    let tag_end = lower.find('>').unwrap_or(lower.len());
    let mut search_from = 0usize;

    while let Some(rel) = lower[search_from..tag_end].find(&needle) {
        let pos = search_from + rel;
        search_from = pos + needle.len();
        // Reject suffix matches such as `data-src=` when looking for `src=`.
        let boundary_ok = pos == 0
            || lower.as_bytes()[pos - 1].is_ascii_whitespace()
            || lower.as_bytes()[pos - 1] == b'<';
        if !boundary_ok {
            continue;
        }
        let value_start = pos + needle.len();
        let quote = tag_markup[value_start..].chars().next()?;
        if quote != '"' && quote != '\'' {
            continue;
        }
        let body = &tag_markup[value_start + 1..];
        let close = body.find(quote)?;
        return Some(decode_entities(&body[..close]));
    }
    None
}

/// Returns the shortest prefix of `s` that is a complete JSON array or
/// object, tracking string literals and escapes. `s` must start with `[` or
/// `{`; a closing bracket of the wrong kind ends the scan with `None`.
#[must_use]
pub fn extract_balanced(s: &str) -> Option<&str> {
    let open = s.chars().next()?;
    if open != '[' && open != '{' {
        return None;
    }
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ']' | '}' => {
                if stack.pop() != Some(c) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the JSON body of the `<script id="{id}">` element.
///
/// Returns `None` when the element is absent and `Some(Err)` when it is
/// present but not valid JSON.
#[must_use]
pub fn script_json_by_id(markup: &str, id: &str) -> Option<Result<Value, serde_json::Error>> {
    let pattern = format!(
        r#"(?is)<script[^>]*\bid\s*=\s*["']{}["'][^>]*>(.*?)</script>"#,
        regex::escape(id)
    );
    let re = Regex::new(&pattern).ok()?;
    let body = re.captures(markup)?.get(1)?.as_str().trim();
    Some(serde_json::from_str(body))
}

/// Every JSON-LD node on the page. Top-level arrays and `@graph` containers
/// are flattened; blocks that fail to parse are skipped.
#[must_use]
pub fn jsonld_nodes(markup: &str) -> Vec<Value> {
    let mut nodes = Vec::new();
    for cap in JSONLD_RE.captures_iter(markup) {
        let Some(body) = cap.get(1) else { continue };
        let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) else {
            tracing::debug!("skipping unparseable JSON-LD block");
            continue;
        };
        let top = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        for item in top {
            if let Some(graph) = item.get("@graph").and_then(Value::as_array) {
                nodes.extend(graph.iter().cloned());
            }
            nodes.push(item);
        }
    }
    nodes
}

/// Returns `true` when a JSON-LD node's `@type` (string or array) matches
/// any of `types`, case-insensitively.
#[must_use]
pub fn jsonld_type_is(node: &Value, types: &[&str]) -> bool {
    match node.get("@type") {
        Some(Value::String(s)) => types.iter().any(|t| s.eq_ignore_ascii_case(t)),
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(Value::as_str)
            .any(|s| types.iter().any(|t| s.eq_ignore_ascii_case(t))),
        _ => false,
    }
}

/// Image URLs referenced by attributes in `markup`, in order, de-duplicated.
/// Only the first candidate of a `srcset` list is taken.
#[must_use]
pub fn image_urls(markup: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for cap in IMAGE_RE.captures_iter(markup) {
        let Some(m) = cap.get(1) else { continue };
        let url = decode_entities(m.as_str());
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Byte offsets and URLs of image references in `markup`.
pub(crate) fn image_positions(markup: &str) -> Vec<(usize, String)> {
    IMAGE_RE
        .captures_iter(markup)
        .filter_map(|cap| cap.get(1).map(|m| (m.start(), decode_entities(m.as_str()))))
        .collect()
}

/// Reads a JSON value as a string, accepting numbers too.
#[must_use]
pub fn json_str(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a JSON value as a float, accepting numeric strings.
#[must_use]
pub fn json_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => crate::parse::parse_number(s),
        _ => None,
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
