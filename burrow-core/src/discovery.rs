use crate::data::{Finding, Severity};
use crate::dedup::{DedupConfig, DedupStats, Deduplicator};
use crate::error::{DiscoveryError, Result};
use crate::filter::{FilterConfig, RankedUrl, ResponseFilter, prioritize};
use crate::processor::ResultProcessor;
use crate::rules::RULESET_VERSION;
use crate::seeds::{ScanData, extract_seeds, validate_target};
use burrow_scanner::{
    CrawlerStatistics, DiscoveredUrl, ExternalCrawler, ExternalCrawlerConfig,
    ProbePhase, Prober, UrlCategory,
};
use chrono::{DateTime, Utc};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::info;
use url::Url;
use uuid::Uuid;

pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 50;
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 120;
pub const MIN_DURATION_SECS: u64 = 10;
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;
pub const MIN_URLS: usize = 1;
pub const MAX_URLS: usize = 100_000;

/// Callback for reporting orchestration progress
pub type DiscoveryProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Limits for one discovery run. Construct through `new` or call
/// `clamped` so every field is inside its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryBudget {
    pub max_urls: usize,
    pub max_duration_secs: u64,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for DiscoveryBudget {
    fn default() -> Self {
        Self {
            max_urls: 5_000,
            max_duration_secs: 30 * 60,
            concurrency: 10,
            timeout_secs: 10,
        }
    }
}

impl DiscoveryBudget {
    pub fn new(max_urls: usize, max_duration_secs: u64, concurrency: usize, timeout_secs: u64) -> Self {
        Self {
            max_urls,
            max_duration_secs,
            concurrency,
            timeout_secs,
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            max_urls: self.max_urls.clamp(MIN_URLS, MAX_URLS),
            max_duration_secs: self.max_duration_secs.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS),
            concurrency: self.concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
            timeout_secs: self.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS),
        }
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Options for configuring a discovery run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryOptions {
    pub budget: DiscoveryBudget,
    pub dedup: DedupConfig,
    pub filter: FilterConfig,
    pub external: ExternalCrawlerConfig,
    /// Length of the ranked URL list in the report.
    pub top_urls: usize,
    #[serde(skip)]
    pub show_progress: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            budget: DiscoveryBudget::default(),
            dedup: DedupConfig::default(),
            filter: FilterConfig::default(),
            external: ExternalCrawlerConfig::default(),
            top_urls: 20,
            show_progress: false,
        }
    }
}

impl DiscoveryOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        if options.external.enabled && options.external.binary.trim().is_empty() {
            return Err(DiscoveryError::Config(
                "external.binary must not be empty when the external crawler is enabled".to_string(),
            ));
        }
        Ok(options.validated())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Err(DiscoveryError::Config(format!(
                "options file {} is empty",
                path.display()
            )));
        }
        Self::from_json_str(&contents)
    }

    pub fn validated(mut self) -> Self {
        self.budget = self.budget.clamped();
        self.dedup = self.dedup.validated();
        self.filter = self.filter.validated();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCount {
    pub phase: ProbePhase,
    pub urls: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub crawler: CrawlerStatistics,
    pub seeds: usize,
    pub active_seeds: usize,
    pub phases: Vec<PhaseCount>,
    pub external_delegate_available: bool,
    pub external_urls: usize,
    pub external_failures: usize,
    pub dedup: DedupStats,
    pub filter_rejections: BTreeMap<String, usize>,
    pub budget_truncated: bool,
    pub duration_ms: u64,
}

/// The single structured result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub run_id: Uuid,
    pub target: String,
    pub ruleset_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub urls: Vec<DiscoveredUrl>,
    pub categories: BTreeMap<UrlCategory, Vec<String>>,
    pub findings: Vec<Finding>,
    pub statistics: RunStatistics,
    pub top_urls: Vec<RankedUrl>,
}

impl DiscoveryReport {
    pub fn findings_by_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs seed extraction, probing and external delegation in parallel, then
/// deduplication, filtering and triage. Only an unusable target is an
/// error; everything else is reflected in the statistics.
pub async fn run_discovery(
    target: &str,
    scan_data: Option<&ScanData>,
    options: DiscoveryOptions,
    progress_callback: Option<DiscoveryProgressCallback>,
) -> Result<DiscoveryReport> {
    let started_at = Utc::now();
    let clock = Instant::now();
    let run_id = Uuid::new_v4();
    let options = options.validated();
    let budget = options.budget;

    validate_target(target)?;
    let seeds = extract_seeds(target, scan_data);
    if seeds.is_empty() {
        return Err(DiscoveryError::InvalidTarget(format!(
            "no seeds could be built for '{}'",
            target.trim()
        )));
    }

    info!(
        "Discovery run {} against {} with {} seed(s)",
        run_id,
        target.trim(),
        seeds.len()
    );
    let notify = |message: String| {
        if let Some(ref callback) = progress_callback {
            callback(message);
        }
    };

    let progress_bar = if options.show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Validating seeds...");
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(Arc::new(pb))
    } else {
        None
    };

    // Progress callback for prober requests (only if progress bars enabled)
    let prober_progress: burrow_scanner::ProgressCallback = match progress_bar.clone() {
        Some(pb) => {
            let tested = Arc::new(AtomicUsize::new(0));
            Arc::new(move |phase: ProbePhase, _url: String| {
                let count = tested.fetch_add(1, Ordering::Relaxed) + 1;
                pb.set_message(format!("Probing ({})... {} requests", phase, count));
            })
        }
        None => Arc::new(|_phase: ProbePhase, _url: String| {}),
    };

    let deadline = clock + budget.max_duration();
    let mut prober = Prober::new(budget.timeout())?
        .with_concurrency(budget.concurrency)
        .with_deadline(deadline)
        .with_url_budget(budget.max_urls)
        .with_progress_callback(prober_progress);
    if let Some(data) = scan_data {
        prober = prober.with_technology_hints(data.technology_hints());
    }
    let external = ExternalCrawler::new(options.external.clone()).with_deadline(deadline);

    notify(format!("Probing {} seed(s)", seeds.len()));
    let (probe, external_outcome) =
        tokio::join!(prober.discover(seeds.clone()), external.crawl(&seeds));

    let mut statistics = RunStatistics {
        crawler: probe.statistics.clone(),
        seeds: seeds.len(),
        active_seeds: probe.active_seeds.len(),
        phases: probe
            .phase_counts
            .iter()
            .map(|(phase, urls)| PhaseCount {
                phase: *phase,
                urls: *urls,
            })
            .collect(),
        external_delegate_available: external_outcome.available,
        external_urls: external_outcome.urls.len(),
        external_failures: external_outcome.failures,
        budget_truncated: probe.truncated || external_outcome.truncated,
        ..Default::default()
    };

    let mut merged = probe.active_seeds;
    merged.extend(probe.discovered);
    merged.extend(external_outcome.urls);

    if let Some(ref pb) = progress_bar {
        pb.set_message(format!("Deduplicating {} URLs...", merged.len()));
    }
    notify(format!("Deduplicating {} URL(s)", merged.len()));
    let deduplicator = Deduplicator::new(options.dedup.clone());
    let (unique, dedup_stats) = deduplicator.deduplicate(merged);
    statistics.dedup = dedup_stats;

    let filter = ResponseFilter::new(options.filter.clone());
    let (mut kept, rejections) = filter.filter(unique);
    statistics.filter_rejections = rejections;

    if kept.len() > budget.max_urls {
        info!(
            "URL budget reached, truncating {} URLs to {}",
            kept.len(),
            budget.max_urls
        );
        kept.truncate(budget.max_urls);
        statistics.budget_truncated = true;
    }

    notify(format!("Triaging {} URL(s)", kept.len()));
    let processed = ResultProcessor::new()
        .with_fingerprints(probe.fingerprints)
        .process(&kept);
    let top_urls = prioritize(&processed.urls, options.top_urls);

    statistics.duration_ms = clock.elapsed().as_millis() as u64;

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Discovery complete! {} URLs, {} findings",
            processed.urls.len(),
            processed.findings.len()
        ));
    }
    info!(
        "Discovery run {} finished: {} URL(s), {} finding(s), {} ms",
        run_id,
        processed.urls.len(),
        processed.findings.len(),
        statistics.duration_ms
    );

    Ok(DiscoveryReport {
        run_id,
        target: target.trim().to_string(),
        ruleset_version: RULESET_VERSION.to_string(),
        started_at,
        finished_at: Utc::now(),
        urls: processed.urls,
        categories: processed.categories,
        findings: processed.findings,
        statistics,
        top_urls,
    })
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let mut path = u.path().to_string();
            if path.is_empty() {
                path.push('/');
            }
            if let Some(query) = u.query() {
                path.push('?');
                path.push_str(query);
            }
            path
        })
        .unwrap_or_else(|| url.to_string())
}

fn colored_status(status: Option<u16>) -> String {
    match status {
        Some(code @ 200..=299) => code.to_string().green().to_string(),
        Some(code @ 300..=399) => code.to_string().cyan().to_string(),
        Some(code @ 400..=499) => code.to_string().yellow().to_string(),
        Some(code @ 500..=599) => code.to_string().red().to_string(),
        Some(code) => code.to_string(),
        None => "---".dimmed().to_string(),
    }
}

fn colored_severity(severity: Severity) -> String {
    let label = format!("{:<8}", severity.as_str().to_uppercase());
    match severity {
        Severity::Critical => label.red().bold().to_string(),
        Severity::High => label.red().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.cyan().to_string(),
        Severity::Info => label.dimmed().to_string(),
    }
}

/// Generate a console summary of a discovery run
pub fn generate_discovery_report(report: &DiscoveryReport) -> String {
    let stats = &report.statistics;
    let rule = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n";

    let mut out = String::new();
    out.push_str(rule);
    out.push_str("# Summary:\n");
    out.push_str(&format!("  Target: {}\n", report.target));
    out.push_str(&format!("  Run: {}\n", report.run_id));
    out.push_str(&format!(
        "  Seeds: {} ({} active)\n",
        stats.seeds, stats.active_seeds
    ));
    out.push_str(&format!(
        "  Requests: {} ({} failed, avg {:.0} ms)\n",
        stats.crawler.urls_tested, stats.crawler.failed_requests, stats.crawler.avg_response_time_ms
    ));
    out.push_str(&format!(
        "  External crawler: {}\n",
        if stats.external_delegate_available {
            format!("{} URLs, {} failures", stats.external_urls, stats.external_failures)
        } else {
            "unavailable".to_string()
        }
    ));
    out.push_str(&format!(
        "  Deduplication: {} in, {} out\n",
        stats.dedup.input, stats.dedup.output
    ));
    out.push_str(&format!("  URLs reported: {}\n", report.urls.len()));
    out.push_str(&format!("  Findings: {}\n", report.findings.len()));
    if stats.budget_truncated {
        out.push_str(&format!("  {}\n", "Budget exhausted, results are partial".yellow()));
    }
    out.push('\n');
    out.push_str(rule);

    if !report.findings.is_empty() {
        out.push_str("# Findings:\n");
        for finding in &report.findings {
            out.push_str(&format!(
                "  {} {} {} {}\n",
                colored_severity(finding.severity),
                finding.finding_type,
                extract_url_path(&finding.url),
                format!("({:.1})", finding.confidence).dimmed()
            ));
        }
        out.push('\n');
        out.push_str(rule);
    }

    let mut by_host: BTreeMap<String, Vec<&DiscoveredUrl>> = BTreeMap::new();
    for url in &report.urls {
        if let Some(host) = url.host() {
            by_host.entry(host).or_default().push(url);
        }
    }

    for (host, urls) in &by_host {
        out.push_str(&format!("## {}\n", host));
        out.push_str(&format!("  {} URLs found\n\n", urls.len()));
        for url in urls {
            let mut line = format!("  {} {}", colored_status(url.status_code), extract_url_path(&url.url));
            if let Some(category) = url.category {
                line.push_str(&format!(" [{}]", category));
            }
            if let Some(ref content_type) = url.content_type
                && !content_type.starts_with("text/html")
            {
                line.push_str(&format!(" {}", content_type.as_str().dimmed()));
            }
            out.push_str(&line);
            out.push('\n');
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_clamped() {
        let budget = DiscoveryBudget::new(0, 1, 500, 0);
        assert_eq!(budget.max_urls, MIN_URLS);
        assert_eq!(budget.max_duration_secs, MIN_DURATION_SECS);
        assert_eq!(budget.concurrency, MAX_CONCURRENCY);
        assert_eq!(budget.timeout_secs, MIN_TIMEOUT_SECS);

        let budget = DiscoveryBudget::new(1_000_000, 10 * 24 * 60 * 60, 0, 600);
        assert_eq!(budget.max_urls, MAX_URLS);
        assert_eq!(budget.max_duration_secs, MAX_DURATION_SECS);
        assert_eq!(budget.concurrency, MIN_CONCURRENCY);
        assert_eq!(budget.timeout_secs, MAX_TIMEOUT_SECS);
    }

    #[test]
    fn test_options_from_partial_json() {
        let options = DiscoveryOptions::from_json_str(
            r#"{ "budget": { "concurrency": 99 }, "dedup": { "enable_clustering": false } }"#,
        )
        .unwrap();
        assert_eq!(options.budget.concurrency, MAX_CONCURRENCY);
        assert_eq!(options.budget.timeout_secs, 10);
        assert!(!options.dedup.enable_clustering);
        assert_eq!(options.filter, FilterConfig::default());
    }

    #[test]
    fn test_options_reject_empty_external_binary() {
        let result = DiscoveryOptions::from_json_str(r#"{ "external": { "binary": " " } }"#);
        assert!(matches!(result, Err(DiscoveryError::Config(_))));

        let options =
            DiscoveryOptions::from_json_str(r#"{ "external": { "enabled": false, "binary": "" } }"#)
                .unwrap();
        assert!(!options.external.enabled);
    }

    #[test]
    fn test_extract_url_path() {
        assert_eq!(extract_url_path("http://example.com"), "/");
        assert_eq!(extract_url_path("http://example.com/api?x=1#f"), "/api?x=1");
        assert_eq!(extract_url_path("not a url"), "not a url");
    }
}
