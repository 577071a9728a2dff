// Tests for response filtering and prioritisation

use burrow_core::filter::{FilterConfig, RejectReason, ResponseFilter, prioritize, priority_score};
use burrow_scanner::{DiscoveredUrl, PageSummary, UrlSource};
use std::time::Duration;

fn probed(u: &str, status: u16, content_type: &str) -> DiscoveredUrl {
    let mut d = DiscoveredUrl::new(u, UrlSource::InProcessProber).unwrap();
    d.status_code = Some(status);
    d.content_type = Some(content_type.to_string());
    d.content_length = Some(512);
    d.response_time = Some(Duration::from_millis(40));
    d
}

// ============================================================================
// Rejection Rule Tests
// ============================================================================

#[test]
fn test_not_found_is_rejected() {
    let filter = ResponseFilter::default();
    let url = probed("http://example.test/missing", 404, "text/html");

    assert!(!filter.is_meaningful(&url));
    assert_eq!(filter.rejection(&url), Some(RejectReason::Status));
}

#[test]
fn test_ok_html_is_accepted() {
    let filter = ResponseFilter::default();
    assert!(filter.is_meaningful(&probed("http://example.test/", 200, "text/html; charset=utf-8")));
}

#[test]
fn test_auth_gated_is_accepted() {
    let filter = ResponseFilter::default();
    assert!(filter.is_meaningful(&probed("http://example.test/admin/", 401, "text/html")));
    assert!(filter.is_meaningful(&probed("http://example.test/private/", 403, "text/html")));
}

#[test]
fn test_untested_url_passes() {
    let filter = ResponseFilter::default();
    let url = DiscoveredUrl::new("http://example.test/from-crawler", UrlSource::ExternalDelegate)
        .unwrap();
    assert!(filter.is_meaningful(&url));
}

#[test]
fn test_binary_content_types_rejected() {
    let filter = ResponseFilter::default();
    for content_type in ["image/png", "video/mp4", "font/woff2", "application/zip", "IMAGE/JPEG"] {
        let url = probed("http://example.test/blob", 200, content_type);
        assert_eq!(
            filter.rejection(&url),
            Some(RejectReason::ContentType),
            "{} should be rejected",
            content_type
        );
    }
}

#[test]
fn test_content_length_bounds() {
    let filter = ResponseFilter::new(FilterConfig {
        min_content_length: 10,
        max_content_length: 1000,
        ..Default::default()
    });

    let mut small = probed("http://example.test/a", 200, "text/html");
    small.content_length = Some(5);
    let mut large = probed("http://example.test/b", 200, "text/html");
    large.content_length = Some(5000);
    let ok = probed("http://example.test/c", 200, "text/html");

    assert_eq!(filter.rejection(&small), Some(RejectReason::ContentLength));
    assert_eq!(filter.rejection(&large), Some(RejectReason::ContentLength));
    assert_eq!(filter.rejection(&ok), None);
}

#[test]
fn test_slow_response_rejected() {
    let filter = ResponseFilter::new(FilterConfig {
        max_response_time_ms: 1000,
        ..Default::default()
    });
    let mut slow = probed("http://example.test/slow", 200, "text/html");
    slow.response_time = Some(Duration::from_secs(3));

    assert_eq!(filter.rejection(&slow), Some(RejectReason::Latency));
}

#[test]
fn test_error_and_default_pages_rejected() {
    let filter = ResponseFilter::default();

    let mut soft_404 = probed("http://example.test/x", 200, "text/html");
    soft_404.page = Some(PageSummary {
        is_error_page: true,
        ..Default::default()
    });
    let mut welcome = probed("http://example.test/", 200, "text/html");
    welcome.page = Some(PageSummary {
        title: Some("Welcome to nginx!".to_string()),
        is_default_page: true,
        ..Default::default()
    });

    assert_eq!(filter.rejection(&soft_404), Some(RejectReason::ErrorPage));
    assert_eq!(filter.rejection(&welcome), Some(RejectReason::DefaultPage));

    let lenient = ResponseFilter::new(FilterConfig {
        content_analysis: false,
        ..Default::default()
    });
    assert!(lenient.is_meaningful(&soft_404));
    assert!(lenient.is_meaningful(&welcome));
}

#[test]
fn test_filter_counts_rejections() {
    let filter = ResponseFilter::default();
    let (kept, rejected) = filter.filter(vec![
        probed("http://example.test/", 200, "text/html"),
        probed("http://example.test/a", 404, "text/html"),
        probed("http://example.test/b", 404, "text/html"),
        probed("http://example.test/c", 502, "text/html"),
        probed("http://example.test/logo", 200, "image/png"),
        probed("http://example.test/admin/", 403, "text/html"),
    ]);

    let kept: Vec<&str> = kept.iter().map(|u| u.url.as_str()).collect();
    assert_eq!(kept, vec!["http://example.test/", "http://example.test/admin/"]);
    assert_eq!(rejected.get("status"), Some(&3));
    assert_eq!(rejected.get("content_type"), Some(&1));
}

#[test]
fn test_custom_status_list() {
    let filter = ResponseFilter::new(FilterConfig {
        excluded_status_codes: vec![403],
        ..Default::default()
    });
    assert!(filter.is_meaningful(&probed("http://example.test/a", 404, "text/html")));
    assert!(!filter.is_meaningful(&probed("http://example.test/b", 403, "text/html")));
}

// ============================================================================
// Prioritisation Tests
// ============================================================================

#[test]
fn test_prioritize_ranks_interesting_first() {
    let urls = vec![
        probed("http://example.test/static/app.css", 200, "text/css"),
        probed("http://example.test/api/v1/users", 200, "application/json"),
        probed("http://example.test/about", 200, "text/html"),
    ];

    let ranked = prioritize(&urls, 10);

    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].url, "http://example.test/api/v1/users");
    assert_eq!(ranked[2].url, "http://example.test/static/app.css");
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(ranked.iter().all(|r| r.score >= 0.0));
}

#[test]
fn test_priority_score_floor_is_zero() {
    let mut url = probed("http://example.test/static/blob.bin", 404, "application/octet-stream");
    url.content_length = Some(0);
    url.response_time = Some(Duration::from_secs(6));

    assert_eq!(priority_score(&url), 0.0);
    assert_eq!(
        priority_score(&probed("http://example.test/api/v1/users", 200, "application/json")),
        75.0
    );
}

#[test]
fn test_prioritize_respects_limit() {
    let urls: Vec<DiscoveredUrl> = (0..30)
        .map(|i| probed(&format!("http://example.test/page{}", i), 200, "text/html"))
        .collect();
    assert_eq!(prioritize(&urls, 20).len(), 20);
    assert!(prioritize(&urls, 0).is_empty());
}
