//! Body-level page analysis: soft-404 / default vendor page detection and
//! structural "meaningful content" signals.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::result::PageSummary;

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3").unwrap());
static FORM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("form").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static DYNAMIC_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script, noscript, [data-reactroot], [ng-app], [v-cloak]").unwrap());

pub const ERROR_PAGE_KEYWORDS: &[&str] = &[
    "404 not found",
    "page not found",
    "error 404",
    "not found",
    "does not exist",
    "no longer available",
    "internal server error",
    "bad gateway",
    "service unavailable",
    "an error occurred",
];

pub const DEFAULT_PAGE_KEYWORDS: &[&str] = &[
    "welcome to nginx",
    "apache2 ubuntu default page",
    "apache2 debian default page",
    "test page for the apache",
    "it works!",
    "iis windows server",
    "welcome to iis",
    "you've successfully installed tomcat",
    "welcome to centos",
    "default web site page",
    "congratulations! your website",
    "welcome to your new site",
];

const MIN_TITLE_LENGTH: usize = 4;
const MIN_LINKS: usize = 3;
const MIN_SIGNALS: usize = 2;
const HEAD_TEXT_CHARS: usize = 512;

/// Analyses an HTML body. Non-HTML bodies simply produce no structural
/// signals.
pub fn summarize_page(body: &str) -> PageSummary {
    let document = Html::parse_document(body);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let headings: Vec<String> = document
        .select(&HEADING_SELECTOR)
        .map(|h| h.text().collect::<String>().trim().to_lowercase())
        .collect();

    let mut head_text = title.clone().unwrap_or_default().to_lowercase();
    for heading in headings.iter().take(3) {
        head_text.push(' ');
        head_text.push_str(heading);
    }
    head_text.push(' ');
    head_text.extend(body.chars().take(HEAD_TEXT_CHARS).flat_map(char::to_lowercase));

    let is_error_page = ERROR_PAGE_KEYWORDS.iter().any(|k| head_text.contains(k));
    let is_default_page = DEFAULT_PAGE_KEYWORDS.iter().any(|k| head_text.contains(k));

    let mut signals = Vec::new();
    if title
        .as_ref()
        .is_some_and(|t| t.len() >= MIN_TITLE_LENGTH && !is_error_page)
    {
        signals.push("title".to_string());
    }
    if !headings.is_empty() {
        signals.push("headings".to_string());
    }
    if document.select(&FORM_SELECTOR).next().is_some() {
        signals.push("forms".to_string());
    }
    if document.select(&LINK_SELECTOR).count() >= MIN_LINKS {
        signals.push("links".to_string());
    }
    if document.select(&DYNAMIC_SELECTOR).next().is_some() {
        signals.push("dynamic_content".to_string());
    }

    let is_meaningful = signals.len() >= MIN_SIGNALS && !is_error_page && !is_default_page;

    PageSummary {
        title,
        is_error_page,
        is_default_page,
        is_meaningful,
        signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_404_detected() {
        let summary = summarize_page(
            "<html><head><title>Page Not Found</title></head><body><h1>Oops</h1></body></html>",
        );
        assert!(summary.is_error_page);
        assert!(!summary.is_meaningful);
    }

    #[test]
    fn test_default_vendor_page_detected() {
        let summary = summarize_page(
            "<html><head><title>Welcome to nginx!</title></head><body><h1>Welcome to nginx!</h1></body></html>",
        );
        assert!(summary.is_default_page);
        assert!(!summary.is_meaningful);
    }

    #[test]
    fn test_meaningful_page_needs_two_signals() {
        let rich = summarize_page(
            r#"<html><head><title>Customer Portal</title></head><body>
                <h1>Sign in</h1>
                <form action="/login"><input name="user"></form>
            </body></html>"#,
        );
        assert!(rich.is_meaningful);
        assert!(rich.signals.contains(&"forms".to_string()));

        let bare = summarize_page("<html><head><title>Portal</title></head><body>hi</body></html>");
        assert!(!bare.is_meaningful);
        assert_eq!(bare.signals, vec!["title".to_string()]);
    }

    #[test]
    fn test_plain_text_body() {
        let summary = summarize_page("User-agent: *\nDisallow: /private/\n");
        assert!(summary.title.is_none());
        assert!(!summary.is_error_page);
        assert!(!summary.is_meaningful);
    }
}
