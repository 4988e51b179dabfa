//! URL origin, domain, and relative-link helpers.

/// Extracts the scheme+host origin from a page URL.
///
/// Given `"https://www.example-autoboerse.de/haendler/42"`, returns
/// `"https://www.example-autoboerse.de"`.
#[must_use]
pub fn extract_origin(page_url: &str) -> String {
    reqwest::Url::parse(page_url).map_or_else(
        |e| {
            tracing::warn!(
                page_url,
                error = %e,
                "could not parse page url, falling back to string split for origin extraction; check config/dealer.yaml"
            );
            page_url
                .trim_end_matches('/')
                .splitn(4, '/')
                .take(3)
                .collect::<Vec<_>>()
                .join("/")
        },
        |u| u.origin().ascii_serialization(),
    )
}

/// Extracts the hostname from a URL for use in error messages.
///
/// Falls back to the full URL string if parsing fails.
pub(super) fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

/// Resolves `href` (absolute, protocol-relative, or relative) against `base`.
///
/// Returns `None` for empty, `data:`, `javascript:` and unparseable links.
#[must_use]
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("data:") || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return reqwest::Url::parse(href).ok().map(String::from);
    }
    let base = reqwest::Url::parse(base).ok()?;
    base.join(href).ok().map(String::from)
}
