//! Three-pass URL deduplication: exact signature, similarity clustering and
//! per-base parameter-shape capping.

use burrow_scanner::DiscoveredUrl;
use burrow_scanner::normalize::{jaccard, param_names, path_tokens, strip_query, url_signature};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use url::Url;

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|[0-9a-f]{32})$")
        .unwrap()
});

const LONG_VALUE_LENGTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub enable_clustering: bool,
    /// Minimum path-token Jaccard similarity for two URLs to cluster.
    pub path_similarity_threshold: f64,
    /// Minimum mean of path and parameter-name similarity.
    pub similarity_threshold: f64,
    pub max_per_pattern: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enable_clustering: true,
            path_similarity_threshold: 0.7,
            similarity_threshold: 0.8,
            max_per_pattern: 5,
        }
    }
}

impl DedupConfig {
    pub fn validated(mut self) -> Self {
        self.path_similarity_threshold = clamp_unit(self.path_similarity_threshold, 0.7);
        self.similarity_threshold = clamp_unit(self.similarity_threshold, 0.8);
        self.max_per_pattern = self.max_per_pattern.max(1);
        self
    }
}

fn clamp_unit(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupStats {
    pub input: usize,
    pub signature_duplicates: usize,
    pub clustered: usize,
    pub pattern_capped: usize,
    pub output: usize,
}

/// Coarse class of a query parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueClass {
    Empty,
    Int,
    Uuid,
    LongString,
    ShortString,
}

impl ValueClass {
    pub fn of(value: &str) -> Self {
        if value.is_empty() {
            ValueClass::Empty
        } else if value.chars().all(|c| c.is_ascii_digit()) {
            ValueClass::Int
        } else if UUID_PATTERN.is_match(value) {
            ValueClass::Uuid
        } else if value.chars().count() > LONG_VALUE_LENGTH {
            ValueClass::LongString
        } else {
            ValueClass::ShortString
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueClass::Empty => "empty",
            ValueClass::Int => "int",
            ValueClass::Uuid => "uuid",
            ValueClass::LongString => "long",
            ValueClass::ShortString => "short",
        }
    }
}

/// Parameter names with their value classes, sorted, e.g. `id=int&q=short`.
pub fn parameter_shape(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return String::new();
    };
    let mut parts: Vec<(String, ValueClass)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.to_lowercase(), ValueClass::of(&v)))
        .collect();
    parts.sort();
    parts.dedup();
    parts
        .iter()
        .map(|(name, class)| format!("{}={}", name, class.as_str()))
        .collect::<Vec<_>>()
        .join("&")
}

struct Profile {
    origin: String,
    path: HashSet<String>,
    params: HashSet<String>,
}

impl Profile {
    fn of(url: &DiscoveredUrl) -> Self {
        let origin = Url::parse(&url.url)
            .map(|u| format!("{}://{}", u.scheme(), u.host_str().unwrap_or("").to_lowercase()))
            .unwrap_or_default();
        Self {
            origin,
            path: path_tokens(&url.url),
            params: param_names(&url.url),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    /// Runs the three passes in order. Order of the survivors follows the
    /// input order. Applying it to its own output removes nothing more.
    pub fn deduplicate(&self, urls: Vec<DiscoveredUrl>) -> (Vec<DiscoveredUrl>, DedupStats) {
        let mut stats = DedupStats {
            input: urls.len(),
            ..Default::default()
        };

        let unique = self.signature_pass(urls);
        stats.signature_duplicates = stats.input - unique.len();

        let clustered = if self.config.enable_clustering {
            let before = unique.len();
            let survivors = self.cluster_pass(unique);
            stats.clustered = before - survivors.len();
            survivors
        } else {
            unique
        };

        let before = clustered.len();
        let capped = self.pattern_pass(clustered);
        stats.pattern_capped = before - capped.len();
        stats.output = capped.len();

        debug!(
            "Dedup: {} in, {} exact, {} clustered, {} capped, {} out",
            stats.input,
            stats.signature_duplicates,
            stats.clustered,
            stats.pattern_capped,
            stats.output
        );

        (capped, stats)
    }

    pub fn signature_pass(&self, urls: Vec<DiscoveredUrl>) -> Vec<DiscoveredUrl> {
        let mut seen = HashSet::new();
        urls.into_iter()
            .filter(|u| seen.insert(url_signature(&u.url)))
            .collect()
    }

    /// Greedy clustering against each cluster's first member. Only the
    /// representatives survive.
    pub fn cluster_pass(&self, urls: Vec<DiscoveredUrl>) -> Vec<DiscoveredUrl> {
        let mut representatives: Vec<Profile> = Vec::new();
        let mut survivors = Vec::new();

        for url in urls {
            let profile = Profile::of(&url);
            if representatives.iter().any(|rep| self.similar(rep, &profile)) {
                continue;
            }
            representatives.push(profile);
            survivors.push(url);
        }

        survivors
    }

    fn similar(&self, a: &Profile, b: &Profile) -> bool {
        if a.origin != b.origin {
            return false;
        }
        let path_similarity = jaccard(&a.path, &b.path);
        if path_similarity < self.config.path_similarity_threshold {
            return false;
        }
        let param_similarity = jaccard(&a.params, &b.params);
        (path_similarity + param_similarity) / 2.0 >= self.config.similarity_threshold
    }

    /// Caps each (base URL, parameter shape) group at `max_per_pattern`,
    /// preferring 2xx, then shorter URLs, then lexicographic order.
    pub fn pattern_pass(&self, urls: Vec<DiscoveredUrl>) -> Vec<DiscoveredUrl> {
        let mut groups: HashMap<(String, String), Vec<usize>> = HashMap::new();
        for (idx, url) in urls.iter().enumerate() {
            let key = (strip_query(&url.url), parameter_shape(&url.url));
            groups.entry(key).or_default().push(idx);
        }

        let mut keep = vec![false; urls.len()];
        for members in groups.values() {
            let mut ranked = members.clone();
            ranked.sort_by(|&a, &b| {
                let (ua, ub) = (&urls[a], &urls[b]);
                ub.is_success()
                    .cmp(&ua.is_success())
                    .then_with(|| ua.url.len().cmp(&ub.url.len()))
                    .then_with(|| ua.url.cmp(&ub.url))
            });
            for idx in ranked.into_iter().take(self.config.max_per_pattern) {
                keep[idx] = true;
            }
        }

        urls.into_iter()
            .zip(keep)
            .filter_map(|(url, kept)| kept.then_some(url))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_classes() {
        assert_eq!(ValueClass::of(""), ValueClass::Empty);
        assert_eq!(ValueClass::of("42"), ValueClass::Int);
        assert_eq!(
            ValueClass::of("550e8400-e29b-41d4-a716-446655440000"),
            ValueClass::Uuid
        );
        assert_eq!(ValueClass::of("0123456789abcdef0123456789abcdef"), ValueClass::Uuid);
        assert_eq!(ValueClass::of("abc"), ValueClass::ShortString);
        assert_eq!(ValueClass::of("a-very-long-search-term-value"), ValueClass::LongString);
    }

    #[test]
    fn test_parameter_shape_ignores_order_and_values() {
        assert_eq!(
            parameter_shape("http://h/x?page=2&id=7"),
            parameter_shape("http://h/x?id=9&page=31")
        );
        assert_ne!(parameter_shape("http://h/x?id=7"), parameter_shape("http://h/x?id=abc"));
        assert_eq!(parameter_shape("http://h/x"), "");
    }

    #[test]
    fn test_config_is_clamped() {
        let config = DedupConfig {
            similarity_threshold: 3.0,
            path_similarity_threshold: f64::NAN,
            max_per_pattern: 0,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.similarity_threshold, 1.0);
        assert_eq!(config.path_similarity_threshold, 0.7);
        assert_eq!(config.max_per_pattern, 1);
    }
}
