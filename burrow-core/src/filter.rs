//! Post-discovery response filtering and URL prioritisation.

use burrow_scanner::DiscoveredUrl;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

const MAX_CONTENT_LENGTH: u64 = 10 * 1024 * 1024;
const MAX_RESPONSE_TIME_MS: u64 = 30_000;

const HIGH_VALUE_KEYWORDS: &[&str] = &[
    "admin", "api", "config", "backup", ".git", ".env", "login", "auth", "debug", "console",
    "graphql", "swagger", "actuator", "internal", "private", "secret", "token",
];
const LOW_VALUE_KEYWORDS: &[&str] = &[
    "/static/", "/assets/", "/css/", "/js/", "/images/", "/img/", "/fonts/", "/media/", "/dist/",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub excluded_status_codes: Vec<u16>,
    /// Content-type prefixes or exact types that are never meaningful.
    pub excluded_content_types: Vec<String>,
    pub min_content_length: u64,
    pub max_content_length: u64,
    pub max_response_time_ms: u64,
    /// Reject error and default vendor pages when a page summary exists.
    pub content_analysis: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_status_codes: vec![400, 404, 500, 502, 503, 504],
            excluded_content_types: [
                "image/",
                "audio/",
                "video/",
                "font/",
                "application/zip",
                "application/gzip",
                "application/x-gzip",
                "application/x-tar",
                "application/x-bzip2",
                "application/x-7z-compressed",
                "application/x-rar-compressed",
                "application/vnd.rar",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_content_length: 0,
            max_content_length: MAX_CONTENT_LENGTH,
            max_response_time_ms: MAX_RESPONSE_TIME_MS,
            content_analysis: true,
        }
    }
}

impl FilterConfig {
    pub fn validated(mut self) -> Self {
        if self.max_content_length < self.min_content_length {
            std::mem::swap(&mut self.min_content_length, &mut self.max_content_length);
        }
        self.max_response_time_ms = self.max_response_time_ms.max(1);
        for content_type in &mut self.excluded_content_types {
            *content_type = content_type.trim().to_lowercase();
        }
        self.excluded_content_types.retain(|ct| !ct.is_empty());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Status,
    ContentType,
    ContentLength,
    Latency,
    ErrorPage,
    DefaultPage,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Status => "status",
            RejectReason::ContentType => "content_type",
            RejectReason::ContentLength => "content_length",
            RejectReason::Latency => "latency",
            RejectReason::ErrorPage => "error_page",
            RejectReason::DefaultPage => "default_page",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUrl {
    pub url: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseFilter {
    config: FilterConfig,
}

impl ResponseFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    /// The first rule that rejects `url`, or `None` when it is kept.
    /// Untested URLs pass every rule that needs a response.
    pub fn rejection(&self, url: &DiscoveredUrl) -> Option<RejectReason> {
        if let Some(status) = url.status_code
            && self.config.excluded_status_codes.contains(&status)
        {
            return Some(RejectReason::Status);
        }

        if let Some(ref content_type) = url.content_type {
            let content_type = content_type.to_lowercase();
            if self
                .config
                .excluded_content_types
                .iter()
                .any(|excluded| content_type.starts_with(excluded.as_str()))
            {
                return Some(RejectReason::ContentType);
            }
        }

        if let Some(length) = url.content_length
            && (length < self.config.min_content_length || length > self.config.max_content_length)
        {
            return Some(RejectReason::ContentLength);
        }

        if let Some(ms) = url.response_time_ms()
            && ms > self.config.max_response_time_ms
        {
            return Some(RejectReason::Latency);
        }

        if self.config.content_analysis
            && let Some(ref page) = url.page
        {
            if page.is_error_page {
                return Some(RejectReason::ErrorPage);
            }
            if page.is_default_page {
                return Some(RejectReason::DefaultPage);
            }
        }

        None
    }

    pub fn is_meaningful(&self, url: &DiscoveredUrl) -> bool {
        self.rejection(url).is_none()
    }

    /// Keeps meaningful URLs in order; returns rejection counts by reason.
    pub fn filter(&self, urls: Vec<DiscoveredUrl>) -> (Vec<DiscoveredUrl>, BTreeMap<String, usize>) {
        let mut rejected: BTreeMap<String, usize> = BTreeMap::new();
        let kept = urls
            .into_iter()
            .filter(|url| match self.rejection(url) {
                Some(reason) => {
                    debug!("Filtered {} ({})", url.url, reason);
                    *rejected.entry(reason.as_str().to_string()).or_default() += 1;
                    false
                }
                None => true,
            })
            .collect();
        (kept, rejected)
    }
}

/// Ranking score. Higher is more interesting; never negative.
pub fn priority_score(url: &DiscoveredUrl) -> f64 {
    let mut score: f64 = match url.status_code {
        Some(200..=299) => 30.0,
        Some(401) | Some(403) => 25.0,
        Some(300..=399) => 15.0,
        Some(500..=599) => 10.0,
        Some(_) => 0.0,
        None => 5.0,
    };

    if let Some(ref content_type) = url.content_type {
        let content_type = content_type.to_lowercase();
        if content_type.contains("json") || content_type.contains("xml") {
            score += 15.0;
        } else if content_type.contains("html") {
            score += 10.0;
        } else if content_type.starts_with("text/") {
            score += 5.0;
        }
    }

    let path = url.path().to_lowercase();
    if HIGH_VALUE_KEYWORDS.iter().any(|k| path.contains(k)) {
        score += 20.0;
    }
    if LOW_VALUE_KEYWORDS.iter().any(|k| path.contains(k)) {
        score -= 15.0;
    }

    match url.response_time_ms() {
        Some(ms) if ms < 500 => score += 5.0,
        Some(ms) if ms > 5_000 => score -= 5.0,
        _ => {}
    }

    match url.content_length {
        Some(0) => score -= 5.0,
        Some(len) if len <= 1024 * 1024 => score += 5.0,
        _ => {}
    }

    if url.page.as_ref().is_some_and(|p| p.is_meaningful) {
        score += 10.0;
    }

    score.max(0.0)
}

/// The `limit` highest-scoring URLs, ties kept in input order.
pub fn prioritize(urls: &[DiscoveredUrl], limit: usize) -> Vec<RankedUrl> {
    let mut ranked: Vec<RankedUrl> = urls
        .iter()
        .map(|u| RankedUrl {
            url: u.url.clone(),
            score: priority_score(u),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(limit);
    ranked
}
