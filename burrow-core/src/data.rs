use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Finding severity. The derived ordering sorts critical first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const MIN_CONFIDENCE: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub url: String,
    /// Tag such as `admin_panel` or `git_repository`.
    pub finding_type: String,
    pub severity: Severity,
    pub reason: String,
    pub pattern: String,
    pub confidence: f64,
    pub metadata: BTreeMap<String, String>,
}

impl Finding {
    pub fn new(
        url: impl Into<String>,
        finding_type: impl Into<String>,
        severity: Severity,
        reason: impl Into<String>,
        pattern: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            url: url.into(),
            finding_type: finding_type.into(),
            severity,
            reason: reason.into(),
            pattern: pattern.into(),
            confidence: clamp_confidence(confidence),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_CONFIDENCE;
    }
    value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Sorts by severity (critical first), then by URL for stable output.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.url.cmp(&b.url)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_critical_first() {
        let mut severities = vec![Severity::Info, Severity::Critical, Severity::Low, Severity::High];
        severities.sort();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::High, Severity::Low, Severity::Info]
        );
    }

    #[test]
    fn test_confidence_is_clamped() {
        let f = Finding::new("http://h/", "x", Severity::Low, "r", "p", 1.7);
        assert_eq!(f.confidence, 1.0);
        let f = Finding::new("http://h/", "x", Severity::Low, "r", "p", -3.0);
        assert_eq!(f.confidence, 0.1);
        assert_eq!(clamp_confidence(f64::NAN), 0.1);
    }

    #[test]
    fn test_sort_findings() {
        let mut findings = vec![
            Finding::new("http://h/b", "x", Severity::Low, "r", "p", 0.5),
            Finding::new("http://h/a", "x", Severity::Critical, "r", "p", 0.5),
            Finding::new("http://h/a", "x", Severity::Low, "r", "p", 0.5),
        ];
        sort_findings(&mut findings);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[1].url, "http://h/a");
        assert_eq!(findings[2].url, "http://h/b");
    }
}
