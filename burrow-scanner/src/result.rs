use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::normalize;

/// Where a URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlSource {
    Seed,
    PriorScanData,
    InProcessProber,
    ExternalDelegate,
    LinkExtraction,
    RedirectTarget,
}

impl UrlSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlSource::Seed => "seed",
            UrlSource::PriorScanData => "prior_scan_data",
            UrlSource::InProcessProber => "in_process_prober",
            UrlSource::ExternalDelegate => "external_delegate",
            UrlSource::LinkExtraction => "link_extraction",
            UrlSource::RedirectTarget => "redirect_target",
        }
    }
}

impl fmt::Display for UrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Functional bucket assigned after discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlCategory {
    Admin,
    Api,
    Config,
    Auth,
    Docs,
    Dev,
    Static,
    Application,
    Root,
    TopLevel,
    Other,
}

impl UrlCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlCategory::Admin => "admin",
            UrlCategory::Api => "api",
            UrlCategory::Config => "config",
            UrlCategory::Auth => "auth",
            UrlCategory::Docs => "docs",
            UrlCategory::Dev => "dev",
            UrlCategory::Static => "static",
            UrlCategory::Application => "application",
            UrlCategory::Root => "root",
            UrlCategory::TopLevel => "top_level",
            UrlCategory::Other => "other",
        }
    }
}

impl fmt::Display for UrlCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a fetched page body. Only present when the prober actually
/// downloaded the body (fingerprinting or link extraction).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub title: Option<String>,
    pub is_error_page: bool,
    pub is_default_page: bool,
    pub is_meaningful: bool,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredUrl {
    pub url: String,
    pub source: UrlSource,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub response_time: Option<Duration>,
    pub discovered_at: DateTime<Utc>,
    pub tested_at: Option<DateTime<Utc>>,
    pub redirect_target: Option<String>,
    pub category: Option<UrlCategory>,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page: Option<PageSummary>,
}

impl DiscoveredUrl {
    /// Builds an untested URL. Rejects anything that is not an absolute
    /// http(s) URL with a host.
    pub fn new(url: &str, source: UrlSource) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        if parsed.host_str().map(str::is_empty).unwrap_or(true) {
            return None;
        }

        Some(Self {
            url: parsed.to_string(),
            source,
            status_code: None,
            content_type: None,
            content_length: None,
            response_time: None,
            discovered_at: Utc::now(),
            tested_at: None,
            redirect_target: None,
            category: None,
            depth: normalize::path_depth(&parsed),
            page: None,
        })
    }

    pub fn is_tested(&self) -> bool {
        self.status_code.is_some()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status_code, Some(200..=299))
    }

    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }

    pub fn path(&self) -> String {
        Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string())
    }

    pub fn response_time_ms(&self) -> Option<u64> {
        self.response_time.map(|d| d.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_non_http_schemes() {
        assert!(DiscoveredUrl::new("ftp://example.com/", UrlSource::Seed).is_none());
        assert!(DiscoveredUrl::new("mailto:a@example.com", UrlSource::Seed).is_none());
        assert!(DiscoveredUrl::new("not a url", UrlSource::Seed).is_none());
    }

    #[test]
    fn test_new_sets_depth_and_leaves_untested() {
        let url = DiscoveredUrl::new("https://example.com/a/b/c.php", UrlSource::Seed).unwrap();
        assert_eq!(url.depth, 3);
        assert!(!url.is_tested());
        assert_eq!(url.path(), "/a/b/c.php");
        assert_eq!(url.host().as_deref(), Some("example.com"));
    }

    #[test]
    fn test_root_depth_is_zero() {
        let url = DiscoveredUrl::new("http://example.com", UrlSource::Seed).unwrap();
        assert_eq!(url.depth, 0);
        assert_eq!(url.url, "http://example.com/");
    }
}
