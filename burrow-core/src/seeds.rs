// Seed extraction from prior scan data or a raw target

use crate::error::{DiscoveryError, Result};
use burrow_scanner::fingerprint::fingerprint_response;
use burrow_scanner::normalize::{base_url, url_signature};
use burrow_scanner::{DiscoveredUrl, Technology, UrlSource};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

/// Ports tried against a bare host, per scheme. The scheme's default port
/// is written implicitly and the other scheme's default is skipped.
pub const HTTP_SEED_PORTS: &[u16] = &[80, 8080, 8443, 8000, 3000, 5000];
pub const HTTPS_SEED_PORTS: &[u16] = &[443, 8080, 8443, 8000, 3000, 5000];

/// Results of an earlier scan, one record per network service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanData {
    #[serde(default)]
    pub services: Vec<ServiceRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub base_url: String,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ScanData {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Technologies known per base URL, from explicit labels and from the
    /// recorded response headers.
    pub fn technology_hints(&self) -> HashMap<String, Vec<Technology>> {
        let mut hints: HashMap<String, Vec<Technology>> = HashMap::new();

        for service in &self.services {
            let Some(base) = service_base(&service.base_url).and_then(|u| base_url(&u)) else {
                continue;
            };
            let entry = hints.entry(base).or_default();

            for label in &service.technologies {
                match Technology::from_label(label) {
                    Some(tech) if !entry.contains(&tech) => entry.push(tech),
                    Some(_) => {}
                    None => debug!("Ignoring unknown technology label '{}'", label),
                }
            }

            let headers: HashMap<String, String> = service
                .headers
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect();
            for tech in fingerprint_response(&headers, "").technologies {
                if !entry.contains(&tech) {
                    entry.push(tech);
                }
            }
        }

        hints.retain(|_, techs| !techs.is_empty());
        hints
    }
}

/// Checks the raw target without building seeds.
pub fn validate_target(target: &str) -> Result<()> {
    let target = target.trim();
    if target.is_empty() {
        return Err(DiscoveryError::InvalidTarget("target is empty".to_string()));
    }

    if target.contains("://") {
        let parsed = Url::parse(target)
            .map_err(|e| DiscoveryError::InvalidTarget(format!("{}: {}", target, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DiscoveryError::InvalidTarget(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        if parsed.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(DiscoveryError::InvalidTarget(format!("{} has no host", target)));
        }
        return Ok(());
    }

    let host = target_host(target);
    if host.is_empty() || Url::parse(&format!("http://{}/", host)).is_err() {
        return Err(DiscoveryError::InvalidTarget(format!(
            "'{}' is not a host or URL",
            target
        )));
    }

    Ok(())
}

/// Builds the ordered seed list. Prior scan data wins when it yields at
/// least one valid URL; otherwise seeds are synthesised from the target.
/// Returns an empty list only for an empty or unusable target.
pub fn extract_seeds(target: &str, scan_data: Option<&ScanData>) -> Vec<DiscoveredUrl> {
    let target = target.trim();
    if target.is_empty() {
        return Vec::new();
    }

    if let Some(data) = scan_data {
        let seeds = seeds_from_scan_data(data);
        if !seeds.is_empty() {
            debug!("{} seed(s) from prior scan data", seeds.len());
            return seeds;
        }
        warn!("Prior scan data produced no usable seeds, falling back to target");
    }

    synthesize_seeds(target)
}

fn seeds_from_scan_data(data: &ScanData) -> Vec<DiscoveredUrl> {
    let mut seen = HashSet::new();
    let mut seeds = Vec::new();

    for service in &data.services {
        let Some(base) = service_base(&service.base_url) else {
            warn!("Skipping service with invalid base URL '{}'", service.base_url);
            continue;
        };
        let root = base.trim_end_matches('/');

        let candidates = std::iter::once(format!("{}/", root)).chain(
            service
                .paths
                .iter()
                .map(|p| format!("{}/{}", root, p.trim().trim_start_matches('/'))),
        );

        for candidate in candidates {
            if let Some(seed) = DiscoveredUrl::new(&candidate, UrlSource::PriorScanData)
                && seen.insert(url_signature(&seed.url))
            {
                seeds.push(seed);
            }
        }
    }

    seeds
}

fn synthesize_seeds(target: &str) -> Vec<DiscoveredUrl> {
    if target.contains("://") {
        return DiscoveredUrl::new(target, UrlSource::Seed)
            .into_iter()
            .collect();
    }

    let host = target_host(target);
    if host.is_empty() {
        return Vec::new();
    }

    // An explicit port pins both schemes to it
    if let Ok(parsed) = Url::parse(&format!("http://{}/", host))
        && parsed.port().is_some()
    {
        return ["http", "https"]
            .iter()
            .filter_map(|scheme| DiscoveredUrl::new(&format!("{}://{}/", scheme, host), UrlSource::Seed))
            .collect();
    }

    let mut seeds = Vec::new();
    for (scheme, ports, default_port) in [
        ("http", HTTP_SEED_PORTS, 80u16),
        ("https", HTTPS_SEED_PORTS, 443u16),
    ] {
        for port in ports {
            let url = if *port == default_port {
                format!("{}://{}/", scheme, host)
            } else {
                format!("{}://{}:{}/", scheme, host, port)
            };
            if let Some(seed) = DiscoveredUrl::new(&url, UrlSource::Seed) {
                seeds.push(seed);
            }
        }
    }

    seeds
}

/// Host (and optional port) part of a bare target such as `example.com/x`.
fn target_host(target: &str) -> &str {
    target.split('/').next().unwrap_or("").trim()
}

/// Prior scan data sometimes omits the scheme.
fn service_base(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    let parsed = Url::parse(&candidate).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(candidate)
}
