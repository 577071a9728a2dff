use crate::data::{Finding, sort_findings};
use crate::rules::CATEGORY_RULES;
use crate::security::{analyze_url, detect_path_technologies, technology_finding};
use burrow_scanner::normalize::base_url;
use burrow_scanner::{DiscoveredUrl, Fingerprint, Technology, UrlCategory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Output of the result processor: the categorised URLs, the category
/// buckets and the severity-sorted findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessedResults {
    pub urls: Vec<DiscoveredUrl>,
    pub categories: BTreeMap<UrlCategory, Vec<String>>,
    pub findings: Vec<Finding>,
}

pub fn categorize_url(url: &DiscoveredUrl) -> UrlCategory {
    let path = url.path();

    if let Some((category, _)) = CATEGORY_RULES.iter().find(|(_, re)| re.is_match(&path)) {
        return *category;
    }

    match url.depth {
        0 => UrlCategory::Root,
        1 => UrlCategory::TopLevel,
        _ => UrlCategory::Other,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultProcessor {
    /// Fingerprints gathered while probing, keyed by base URL.
    fingerprints: Vec<(String, Fingerprint)>,
}

impl ResultProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fingerprints(mut self, fingerprints: Vec<(String, Fingerprint)>) -> Self {
        self.fingerprints = fingerprints;
        self
    }

    /// Categorises copies of `urls` and extracts findings. Each technology
    /// is reported at most once per call.
    pub fn process(&self, urls: &[DiscoveredUrl]) -> ProcessedResults {
        let mut results = ProcessedResults::default();
        let mut reported: HashSet<Technology> = HashSet::new();

        for original in urls {
            let mut url = original.clone();
            let category = categorize_url(&url);
            url.category = Some(category);
            results
                .categories
                .entry(category)
                .or_default()
                .push(url.url.clone());

            results.findings.extend(analyze_url(&url));

            for tech in detect_path_technologies(&url) {
                if tech.is_application() && reported.insert(tech) {
                    results
                        .findings
                        .push(technology_finding(&url, tech, &format!("path:{}", url.path())));
                }
            }

            results.urls.push(url);
        }

        for (base, fingerprint) in &self.fingerprints {
            let Some(anchor) = results
                .urls
                .iter()
                .find(|u| base_url(&u.url).as_deref() == Some(base.as_str()))
            else {
                continue;
            };
            for tech in &fingerprint.technologies {
                if tech.is_application() && reported.insert(*tech) {
                    let evidence = match fingerprint.server {
                        Some(ref server) => format!("fingerprint:{}", server),
                        None => "fingerprint".to_string(),
                    };
                    results
                        .findings
                        .push(technology_finding(anchor, *tech, &evidence));
                }
            }
        }

        sort_findings(&mut results.findings);
        debug!(
            "Processed {} URL(s) into {} categories, {} finding(s)",
            results.urls.len(),
            results.categories.len(),
            results.findings.len()
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_scanner::UrlSource;

    fn url(u: &str) -> DiscoveredUrl {
        let mut d = DiscoveredUrl::new(u, UrlSource::InProcessProber).unwrap();
        d.status_code = Some(200);
        d
    }

    #[test]
    fn test_categories_first_match_wins() {
        assert_eq!(categorize_url(&url("http://h/admin/")), UrlCategory::Admin);
        assert_eq!(categorize_url(&url("http://h/api/v1/users")), UrlCategory::Api);
        assert_eq!(categorize_url(&url("http://h/.git/config")), UrlCategory::Config);
        assert_eq!(categorize_url(&url("http://h/login")), UrlCategory::Auth);
        assert_eq!(categorize_url(&url("http://h/api-docs")), UrlCategory::Docs);
        assert_eq!(categorize_url(&url("http://h/phpinfo.php")), UrlCategory::Dev);
        assert_eq!(categorize_url(&url("http://h/static/app.css")), UrlCategory::Static);
        assert_eq!(categorize_url(&url("http://h/index.php")), UrlCategory::Application);
        assert_eq!(categorize_url(&url("http://h/")), UrlCategory::Root);
        assert_eq!(categorize_url(&url("http://h/robots.txt")), UrlCategory::TopLevel);
        assert_eq!(categorize_url(&url("http://h/a/b/c.txt")), UrlCategory::Other);
    }

    #[test]
    fn test_technology_reported_once_per_run() {
        let processor = ResultProcessor::new().with_fingerprints(vec![(
            "http://h".to_string(),
            Fingerprint {
                server: Some("nginx".to_string()),
                technologies: vec![Technology::WordPress, Technology::Nginx],
            },
        )]);
        let results = processor.process(&[
            url("http://h/"),
            url("http://h/wp-login.php"),
            url("http://h/wp-content/uploads/"),
        ]);

        let tech: Vec<&Finding> = results
            .findings
            .iter()
            .filter(|f| f.finding_type == "technology_detected")
            .collect();
        assert_eq!(tech.len(), 1);
        assert_eq!(tech[0].metadata.get("technology").map(String::as_str), Some("wordpress"));
    }

    #[test]
    fn test_fingerprint_anchored_on_its_own_host() {
        let processor = ResultProcessor::new().with_fingerprints(vec![(
            "http://127.0.0.1".to_string(),
            Fingerprint {
                server: None,
                technologies: vec![Technology::Drupal],
            },
        )]);
        let results = processor.process(&[url("http://127.0.0.10/about"), url("http://127.0.0.1/")]);

        let tech: Vec<&Finding> = results
            .findings
            .iter()
            .filter(|f| f.finding_type == "technology_detected")
            .collect();
        assert_eq!(tech.len(), 1);
        assert_eq!(tech[0].url, "http://127.0.0.1/");
    }

    #[test]
    fn test_input_is_not_mutated() {
        let input = vec![url("http://h/admin/")];
        let results = ResultProcessor::new().process(&input);
        assert!(input[0].category.is_none());
        assert_eq!(results.urls[0].category, Some(UrlCategory::Admin));
    }
}
