// Passive triage checks for discovered URLs

use crate::data::{Finding, Severity};
use crate::rules::{
    FINDING_CATALOG, LOW_VALUE_SEGMENTS, PARAMETER_RULES, SENSITIVE_DIRECTORIES,
    TECHNOLOGY_PATH_RULES, technology_severity,
};
use burrow_scanner::{DiscoveredUrl, Technology, UrlSource};
use std::collections::BTreeSet;
use url::Url;

const BASE_CONFIDENCE: f64 = 0.5;

/// Confidence for a finding on `url`. `high_value` marks an exact match on
/// one of the most valuable catalog entries.
pub fn confidence_for(url: &DiscoveredUrl, high_value: bool) -> f64 {
    let mut confidence = BASE_CONFIDENCE;

    match url.status_code {
        Some(200..=299) => confidence += 0.3,
        Some(401) | Some(403) => confidence += 0.2,
        _ => {}
    }
    if high_value {
        confidence += 0.2;
    }
    if matches!(url.source, UrlSource::PriorScanData | UrlSource::InProcessProber) {
        confidence += 0.1;
    }
    if is_low_value(url) {
        confidence -= 0.1;
    }

    crate::data::clamp_confidence(confidence)
}

fn is_low_value(url: &DiscoveredUrl) -> bool {
    url.path()
        .to_lowercase()
        .split('/')
        .any(|segment| LOW_VALUE_SEGMENTS.contains(&segment))
}

fn base_finding(
    url: &DiscoveredUrl,
    finding_type: &str,
    severity: Severity,
    reason: String,
    pattern: &str,
    confidence: f64,
) -> Finding {
    let mut finding = Finding::new(&url.url, finding_type, severity, reason, pattern, confidence)
        .with_metadata("depth", url.depth)
        .with_metadata("source", url.source);
    if let Some(status) = url.status_code {
        finding = finding.with_metadata("status_code", status);
    }
    if let Some(ref content_type) = url.content_type {
        finding = finding.with_metadata("content_type", content_type);
    }
    if let Some(host) = url.host() {
        finding = finding.with_metadata("domain", host);
    }
    finding
}

/// First catalog entry matching the URL's path, if any.
pub fn check_catalog(url: &DiscoveredUrl) -> Vec<Finding> {
    let path = url.path().to_lowercase();

    FINDING_CATALOG
        .iter()
        .find(|rule| rule.pattern.is_match(&path))
        .map(|rule| {
            vec![base_finding(
                url,
                rule.finding_type,
                rule.severity,
                rule.reason.to_string(),
                rule.pattern.as_str(),
                confidence_for(url, rule.high_value),
            )]
        })
        .unwrap_or_default()
}

/// One finding per parameter rule the query string triggers.
pub fn check_suspicious_parameters(url: &DiscoveredUrl) -> Vec<Finding> {
    let Ok(parsed) = Url::parse(&url.url) else {
        return Vec::new();
    };
    let names: BTreeSet<String> = parsed
        .query_pairs()
        .map(|(k, _)| k.to_lowercase())
        .collect();
    if names.is_empty() {
        return Vec::new();
    }

    let mut findings = Vec::new();
    for (finding_type, severity, rule_names, reason) in PARAMETER_RULES {
        let matched: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| rule_names.contains(name))
            .collect();
        if matched.is_empty() {
            continue;
        }
        findings.push(
            base_finding(
                url,
                finding_type,
                *severity,
                format!("{}: {}", reason, matched.join(", ")),
                &matched.join("|"),
                confidence_for(url, false),
            )
            .with_metadata("parameters", matched.join(",")),
        );
    }

    findings
}

/// Directory segments whose names suggest leftovers (backups, temp files,
/// logs, uploads). At most one finding per URL, the most severe match.
pub fn check_sensitive_directories(url: &DiscoveredUrl) -> Vec<Finding> {
    let path = url.path().to_lowercase();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let trailing_slash = path.ends_with('/');

    let directories = segments.iter().enumerate().filter(|(idx, segment)| {
        *idx + 1 < segments.len() || trailing_slash || !segment.contains('.')
    });

    let mut best: Option<(&str, Severity)> = None;
    for (_, segment) in directories {
        for (fragment, severity) in SENSITIVE_DIRECTORIES {
            let plural = format!("{}s", fragment);
            if (*segment == *fragment || *segment == plural)
                && best.is_none_or(|(_, current)| *severity < current)
            {
                best = Some((*fragment, *severity));
            }
        }
    }

    best.map(|(fragment, severity)| {
        vec![base_finding(
            url,
            "sensitive_directory",
            severity,
            format!("Sensitive directory name '{}'", fragment),
            fragment,
            confidence_for(url, false),
        )]
    })
    .unwrap_or_default()
}

/// Technologies evidenced by the URL's path alone.
pub fn detect_path_technologies(url: &DiscoveredUrl) -> Vec<Technology> {
    let path = url.path();
    let mut found = Vec::new();
    for (pattern, tech) in TECHNOLOGY_PATH_RULES.iter() {
        if pattern.is_match(&path) && !found.contains(tech) {
            found.push(*tech);
        }
    }
    found
}

pub fn technology_finding(url: &DiscoveredUrl, tech: Technology, evidence: &str) -> Finding {
    base_finding(
        url,
        "technology_detected",
        technology_severity(tech),
        format!("{} detected", tech),
        evidence,
        confidence_for(url, false),
    )
    .with_metadata("technology", tech)
}

/// Catalog plus context heuristics for one URL. Technology findings are
/// run-level and handled by the processor.
pub fn analyze_url(url: &DiscoveredUrl) -> Vec<Finding> {
    let mut findings = Vec::new();
    findings.extend(check_catalog(url));
    findings.extend(check_suspicious_parameters(url));
    findings.extend(check_sensitive_directories(url));
    findings
}
