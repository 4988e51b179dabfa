use super::*;

#[test]
fn build_url_appends_query_pairs() {
    let url = build_url(
        "https://api.example.com/search-api/search",
        &[
            ("customerNumber", "481516".to_string()),
            ("page.number", "2".to_string()),
        ],
    )
    .unwrap();
    assert_eq!(
        url.as_str(),
        "https://api.example.com/search-api/search?customerNumber=481516&page.number=2"
    );
}

#[test]
fn build_url_rejects_invalid_base() {
    let result = build_url("not-a-url", &[]);
    assert!(
        matches!(result, Err(ScraperError::InvalidUrl { .. })),
        "expected InvalidUrl, got: {result:?}"
    );
}

#[test]
fn extract_origin_strips_path() {
    assert_eq!(
        extract_origin("https://www.example-autoboerse.de/haendler/42?page=2"),
        "https://www.example-autoboerse.de"
    );
}

#[test]
fn extract_origin_falls_back_for_unparseable_input() {
    assert_eq!(extract_origin("example.com/x/y"), "example.com/x/y");
}

#[test]
fn extract_domain_strips_scheme_and_path() {
    assert_eq!(
        extract_domain("https://listings.example.com/ad/1"),
        "listings.example.com"
    );
    assert_eq!(extract_domain("listings.example.com"), "listings.example.com");
}

#[test]
fn resolve_url_handles_relative_and_protocol_relative_links() {
    let base = "https://www.example-autoboerse.de/haendler/42";
    assert_eq!(
        resolve_url(base, "/angebote/golf-123").as_deref(),
        Some("https://www.example-autoboerse.de/angebote/golf-123")
    );
    assert_eq!(
        resolve_url(base, "//img.example.com/a.jpg").as_deref(),
        Some("https://img.example.com/a.jpg")
    );
    assert_eq!(
        resolve_url(base, "https://cdn.example.com/b.jpg").as_deref(),
        Some("https://cdn.example.com/b.jpg")
    );
}

#[test]
fn resolve_url_rejects_data_and_script_links() {
    let base = "https://www.example-autoboerse.de/";
    assert!(resolve_url(base, "data:image/gif;base64,R0lGOD").is_none());
    assert!(resolve_url(base, "javascript:void(0)").is_none());
    assert!(resolve_url(base, "   ").is_none());
}

#[test]
fn bot_challenge_detection() {
    assert!(looks_like_bot_challenge(
        "<title>Just a moment...</title><p>Please enable cookies.</p>"
    ));
    assert!(looks_like_bot_challenge(
        "<script src=\"/cdn-cgi/challenge-platform/h/b\"></script>"
    ));
    assert!(!looks_like_bot_challenge(
        "<article data-guid=\"abc\">VW Golf</article>"
    ));
}
