use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;

use crate::normalize::{is_same_host, passes_url_filter, resolve_url};

static HREF_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("[href]").unwrap());
static SRC_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("[src]").unwrap());
static ACTION_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("form[action]").unwrap());

/// Pulls `href`, `src` and form `action` values out of an HTML page and
/// resolves them against `page_url`. Only same-host URLs that pass the
/// candidate filter are returned, in document order and without repeats.
pub fn extract_links(html: &str, page_url: &str, host: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links: Vec<String> = Vec::new();

    let attributes = [
        (&*HREF_SELECTOR, "href"),
        (&*SRC_SELECTOR, "src"),
        (&*ACTION_SELECTOR, "action"),
    ];

    for (selector, attr) in attributes {
        for element in document.select(selector) {
            let Some(value) = element.value().attr(attr) else {
                continue;
            };
            let Some(absolute) = resolve_url(page_url, value) else {
                continue;
            };
            if !is_same_host(&absolute, host) {
                debug!("Skipping cross-host link {}", absolute);
                continue;
            }
            if !passes_url_filter(&absolute) {
                continue;
            }
            if !links.contains(&absolute) {
                links.push(absolute);
            }
        }
    }

    links
}
