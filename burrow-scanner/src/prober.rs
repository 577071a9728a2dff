use crate::content::summarize_page;
use crate::error::{Result, ScanError};
use crate::fingerprint::{Fingerprint, Technology, fingerprint_response};
use crate::links::extract_links;
use crate::normalize::{base_url, is_same_host, passes_url_filter, resolve_url, url_signature};
use crate::paths::{COMMON_PATHS, DIRECTORY_FILES, smart_paths};
use crate::result::{DiscoveredUrl, PageSummary, UrlSource};
use crate::stats::CrawlerStatistics;
use chrono::Utc;
use futures::future::join_all;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};
use url::Url;

/// Statuses that make a probed path worth keeping. Finer filtering happens
/// downstream.
pub const INFORMATIVE_STATUS_CODES: &[u16] = &[
    200, 201, 202, 204, 301, 302, 307, 308, 401, 403, 405, 500, 502, 503,
];

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const MAX_CONCURRENCY: usize = 50;
const DEFAULT_EXTENSION_SOURCES: usize = 20;
const DEFAULT_LINK_PAGES: usize = 5;
const DEFAULT_LINKS_PER_PAGE: usize = 50;
/// Bodies fetched for fingerprinting and link mining are cut off here.
const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

pub type ProgressCallback = Arc<dyn Fn(ProbePhase, String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbePhase {
    SeedValidation,
    CommonPaths,
    SmartPaths,
    PathExtension,
    LinkExtraction,
}

impl fmt::Display for ProbePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbePhase::SeedValidation => "seed validation",
            ProbePhase::CommonPaths => "common paths",
            ProbePhase::SmartPaths => "smart paths",
            ProbePhase::PathExtension => "path extension",
            ProbePhase::LinkExtraction => "link extraction",
        };
        f.write_str(name)
    }
}

/// Everything a prober run produced. Partial when `truncated` is set.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    /// Seeds that answered with a status below 400.
    pub active_seeds: Vec<DiscoveredUrl>,
    pub active_bases: Vec<String>,
    /// Seeds answering 401, 403 or 5xx, then URLs found by phases 2-5, in
    /// phase order.
    pub discovered: Vec<DiscoveredUrl>,
    pub fingerprints: Vec<(String, Fingerprint)>,
    pub phase_counts: Vec<(ProbePhase, usize)>,
    pub statistics: CrawlerStatistics,
    pub truncated: bool,
}

struct ProbeResponse {
    status: u16,
    content_type: Option<String>,
    content_length: Option<u64>,
    location: Option<String>,
    elapsed: Duration,
}

impl ProbeResponse {
    fn from_response(url: &str, response: &reqwest::Response, elapsed: Duration) -> Self {
        let headers = response.headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        Self {
            status: response.status().as_u16(),
            content_type: header("content-type"),
            content_length: header("content-length").and_then(|v| v.parse().ok()),
            location: header("location").and_then(|loc| resolve_url(url, &loc)),
            elapsed,
        }
    }

    fn apply_to(&self, discovered: &mut DiscoveredUrl) {
        discovered.status_code = Some(self.status);
        discovered.content_type = self.content_type.clone();
        discovered.content_length = self.content_length;
        discovered.response_time = Some(self.elapsed);
        discovered.redirect_target = self.location.clone();
        discovered.tested_at = Some(Utc::now());
    }
}

struct FetchedPage {
    response: ProbeResponse,
    headers: HashMap<String, String>,
    body: String,
}

/// The in-process prober: five sequential discovery phases, each issuing
/// its requests concurrently through one bounded gate.
pub struct Prober {
    client: Client,
    gate: Semaphore,
    concurrency: usize,
    seen: Mutex<HashSet<String>>,
    stats: Mutex<CrawlerStatistics>,
    discovered_count: AtomicUsize,
    truncated: AtomicBool,
    deadline: Option<Instant>,
    url_budget: Option<usize>,
    extension_sources: usize,
    max_link_pages: usize,
    max_links_per_page: usize,
    technology_hints: HashMap<String, Vec<Technology>>,
    progress_callback: Option<ProgressCallback>,
}

impl Prober {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("Burrow/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(MAX_CONCURRENCY)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            gate: Semaphore::new(DEFAULT_CONCURRENCY),
            concurrency: DEFAULT_CONCURRENCY,
            seen: Mutex::new(HashSet::new()),
            stats: Mutex::new(CrawlerStatistics::default()),
            discovered_count: AtomicUsize::new(0),
            truncated: AtomicBool::new(false),
            deadline: None,
            url_budget: None,
            extension_sources: DEFAULT_EXTENSION_SOURCES,
            max_link_pages: DEFAULT_LINK_PAGES,
            max_links_per_page: DEFAULT_LINKS_PER_PAGE,
            technology_hints: HashMap::new(),
            progress_callback: None,
        })
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        let concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self.concurrency = concurrency;
        self.gate = Semaphore::new(concurrency);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_url_budget(mut self, budget: usize) -> Self {
        self.url_budget = Some(budget.max(1));
        self
    }

    /// Technology labels known ahead of time (e.g. from prior scan data),
    /// keyed by base URL. Merged into the smart-path fingerprint.
    pub fn with_technology_hints(mut self, hints: HashMap<String, Vec<Technology>>) -> Self {
        self.technology_hints = hints
            .into_iter()
            .map(|(key, techs)| (base_url(&key).unwrap_or(key), techs))
            .collect();
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs all five phases against `seeds`. Never fails: network errors are
    /// counted in the statistics and budget exhaustion only skips work.
    pub async fn discover(&self, seeds: Vec<DiscoveredUrl>) -> ProbeOutcome {
        self.reset().await;
        let mut outcome = ProbeOutcome::default();

        info!(
            "Validating {} seed(s) with {} concurrent requests",
            seeds.len(),
            self.concurrency
        );
        let (active_seeds, gated_seeds, bases) = self.validate_seeds(seeds).await;
        outcome
            .phase_counts
            .push((ProbePhase::SeedValidation, active_seeds.len()));
        outcome.active_seeds = active_seeds;
        outcome.discovered = gated_seeds;
        outcome.active_bases = bases.clone();

        if bases.is_empty() {
            warn!("No seed responded; skipping discovery phases");
            return self.finish(outcome).await;
        }
        info!("{} active base URL(s): {}", bases.len(), bases.join(", "));

        if self.should_continue(ProbePhase::CommonPaths) {
            let candidates = bases
                .iter()
                .flat_map(|base| COMMON_PATHS.iter().map(move |p| format!("{}{}", base, p)))
                .map(|url| (url, UrlSource::InProcessProber))
                .collect();
            let found = self.probe_batch(candidates, ProbePhase::CommonPaths).await;
            record_phase(&mut outcome, ProbePhase::CommonPaths, found);
        }

        if self.should_continue(ProbePhase::SmartPaths) {
            let fingerprints = join_all(bases.iter().map(|base| self.fingerprint_base(base))).await;
            let candidates = fingerprints
                .iter()
                .flat_map(|(base, fp)| {
                    smart_paths(fp)
                        .into_iter()
                        .map(move |p| (format!("{}{}", base, p), UrlSource::InProcessProber))
                })
                .collect();
            outcome.fingerprints = fingerprints;
            let found = self.probe_batch(candidates, ProbePhase::SmartPaths).await;
            record_phase(&mut outcome, ProbePhase::SmartPaths, found);
        }

        if self.should_continue(ProbePhase::PathExtension) {
            let sources: Vec<&DiscoveredUrl> = outcome
                .active_seeds
                .iter()
                .chain(outcome.discovered.iter())
                .collect();
            let candidates = self.extension_candidates(&sources);
            let found = self.probe_batch(candidates, ProbePhase::PathExtension).await;
            record_phase(&mut outcome, ProbePhase::PathExtension, found);
        }

        if self.should_continue(ProbePhase::LinkExtraction) {
            let pages: Vec<String> = outcome
                .active_seeds
                .iter()
                .chain(outcome.discovered.iter())
                .filter(|d| d.status_code == Some(200))
                .take(self.max_link_pages)
                .map(|d| d.url.clone())
                .collect();
            let (found, summaries) = self.extract_page_links(pages).await;
            for (page_url, summary) in summaries {
                for d in outcome
                    .active_seeds
                    .iter_mut()
                    .chain(outcome.discovered.iter_mut())
                    .filter(|d| d.url == page_url)
                {
                    d.page = Some(summary.clone());
                }
            }
            record_phase(&mut outcome, ProbePhase::LinkExtraction, found);
        }

        self.finish(outcome).await
    }

    async fn reset(&self) {
        self.seen.lock().await.clear();
        *self.stats.lock().await = CrawlerStatistics::default();
        self.discovered_count.store(0, Ordering::Relaxed);
        self.truncated.store(false, Ordering::Relaxed);
    }

    async fn finish(&self, mut outcome: ProbeOutcome) -> ProbeOutcome {
        outcome.statistics = self.stats.lock().await.clone();
        outcome.truncated = self.truncated.load(Ordering::Relaxed);
        info!(
            "Probing complete: {} URL(s) discovered, {} request(s) ({} failed)",
            outcome.discovered.len(),
            outcome.statistics.urls_tested,
            outcome.statistics.failed_requests
        );
        outcome
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn out_of_budget(&self) -> bool {
        self.deadline_passed()
            || self
                .url_budget
                .is_some_and(|b| self.discovered_count.load(Ordering::Relaxed) >= b)
    }

    fn should_continue(&self, phase: ProbePhase) -> bool {
        if self.out_of_budget() {
            self.truncated.store(true, Ordering::Relaxed);
            info!("Discovery budget exhausted, skipping {} phase", phase);
            return false;
        }
        true
    }

    /// Returns false when the URL was already tested this run.
    async fn mark_seen(&self, url: &str) -> bool {
        self.seen.lock().await.insert(url_signature(url))
    }

    fn report_progress(&self, phase: ProbePhase, url: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(phase, url.to_string());
        }
    }

    /// Splits answering seeds into active ones (below 400) and the rest
    /// that still carry an informative status such as 401 or 403.
    async fn validate_seeds(
        &self,
        seeds: Vec<DiscoveredUrl>,
    ) -> (Vec<DiscoveredUrl>, Vec<DiscoveredUrl>, Vec<String>) {
        let checks = seeds.into_iter().map(|seed| self.validate_seed(seed));
        let mut active = Vec::new();
        let mut gated = Vec::new();
        let mut bases: Vec<String> = Vec::new();

        for seed in join_all(checks).await.into_iter().flatten() {
            if !seed.status_code.is_some_and(|s| s < 400) {
                gated.push(seed);
                continue;
            }
            if let Some(base) = base_url(&seed.url)
                && !bases.contains(&base)
            {
                bases.push(base);
            }
            active.push(seed);
        }

        (active, gated, bases)
    }

    async fn validate_seed(&self, mut seed: DiscoveredUrl) -> Option<DiscoveredUrl> {
        if !self.mark_seen(&seed.url).await {
            return None;
        }
        let _permit = self.gate.acquire().await.ok()?;
        if self.deadline_passed() {
            self.truncated.store(true, Ordering::Relaxed);
            return None;
        }
        self.report_progress(ProbePhase::SeedValidation, &seed.url);

        match self.send_probe(&seed.url).await {
            Ok(response) => {
                self.stats
                    .lock()
                    .await
                    .record_success(response.elapsed, response.content_length);
                response.apply_to(&mut seed);
                if response.status < 400 {
                    debug!("Seed {} is active ({})", seed.url, response.status);
                    Some(seed)
                } else if INFORMATIVE_STATUS_CODES.contains(&response.status) {
                    debug!("Seed {} answered {}, keeping it", seed.url, response.status);
                    self.discovered_count.fetch_add(1, Ordering::Relaxed);
                    Some(seed)
                } else {
                    debug!("Seed {} answered {}, ignoring", seed.url, response.status);
                    None
                }
            }
            Err(e) => {
                self.stats.lock().await.record_failure();
                warn!("Seed {} unreachable: {}", seed.url, e);
                None
            }
        }
    }

    /// Tests every candidate, then follows same-host redirect targets one
    /// level deep within the same phase.
    async fn probe_batch(
        &self,
        candidates: Vec<(String, UrlSource)>,
        phase: ProbePhase,
    ) -> Vec<DiscoveredUrl> {
        debug!("{}: testing {} candidate(s)", phase, candidates.len());
        let probes = candidates
            .into_iter()
            .map(|(url, source)| self.test_path(url, source, phase));
        let mut found: Vec<DiscoveredUrl> = join_all(probes).await.into_iter().flatten().collect();

        let redirects = redirect_candidates(&found);
        if !redirects.is_empty() {
            let probes = redirects
                .into_iter()
                .map(|url| self.test_path(url, UrlSource::RedirectTarget, phase));
            found.extend(join_all(probes).await.into_iter().flatten());
        }

        found
    }

    /// A single path test. `None` means filtered, already seen, over budget,
    /// unreachable or answered with a non-informative status.
    async fn test_path(&self, url: String, source: UrlSource, phase: ProbePhase) -> Option<DiscoveredUrl> {
        if !passes_url_filter(&url) || !self.mark_seen(&url).await {
            return None;
        }

        let _permit = self.gate.acquire().await.ok()?;
        if self.out_of_budget() {
            self.truncated.store(true, Ordering::Relaxed);
            return None;
        }
        self.report_progress(phase, &url);

        let response = match self.send_probe(&url).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Probe failed for {}: {}", url, e);
                self.stats.lock().await.record_failure();
                return None;
            }
        };
        self.stats
            .lock()
            .await
            .record_success(response.elapsed, response.content_length);

        if !INFORMATIVE_STATUS_CODES.contains(&response.status) {
            return None;
        }

        let mut discovered = DiscoveredUrl::new(&url, source)?;
        response.apply_to(&mut discovered);
        self.discovered_count.fetch_add(1, Ordering::Relaxed);
        debug!("[{}] {} ({})", phase, discovered.url, response.status);
        Some(discovered)
    }

    /// HEAD first; GET when the server rejects HEAD. Callers hold a gate
    /// permit.
    async fn send_probe(&self, url: &str) -> Result<ProbeResponse> {
        let start = Instant::now();
        let response = self.client.request(Method::HEAD, url).send().await?;
        let status = response.status();

        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            debug!("HEAD rejected by {} ({}), retrying with GET", url, status);
            let start = Instant::now();
            let response = self.client.get(url).send().await?;
            return Ok(ProbeResponse::from_response(url, &response, start.elapsed()));
        }

        Ok(ProbeResponse::from_response(url, &response, start.elapsed()))
    }

    async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ScanError::Other(format!("Request gate closed: {}", e)))?;

        let start = Instant::now();
        let mut response = self.client.get(url).send().await?;
        let mut probe = ProbeResponse::from_response(url, &response, start.elapsed());

        let mut headers: HashMap<String, String> = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers
                    .entry(name.as_str().to_lowercase())
                    .and_modify(|existing| {
                        existing.push_str("; ");
                        existing.push_str(value);
                    })
                    .or_insert_with(|| value.to_string());
            }
        }

        let mut raw: Vec<u8> = Vec::new();
        let mut total: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            total += chunk.len() as u64;
            let room = MAX_PAGE_BYTES - raw.len();
            raw.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if raw.len() >= MAX_PAGE_BYTES {
                debug!("Body of {} exceeds {} bytes, truncating", url, MAX_PAGE_BYTES);
                break;
            }
        }
        let body = String::from_utf8_lossy(&raw).into_owned();
        probe.content_length = probe.content_length.or(Some(total));

        Ok(FetchedPage {
            response: probe,
            headers,
            body,
        })
    }

    async fn fingerprint_base(&self, base: &str) -> (String, Fingerprint) {
        let mut fingerprint = Fingerprint::default();
        let root = format!("{}/", base);

        if !self.deadline_passed() {
            self.report_progress(ProbePhase::SmartPaths, &root);
            match self.fetch_page(&root).await {
                Ok(page) => {
                    self.stats
                        .lock()
                        .await
                        .record_success(page.response.elapsed, page.response.content_length);
                    fingerprint = fingerprint_response(&page.headers, &page.body);
                }
                Err(e) => {
                    self.stats.lock().await.record_failure();
                    debug!("Fingerprint request failed for {}: {}", root, e);
                }
            }
        }

        if let Some(hints) = self.technology_hints.get(base) {
            for tech in hints {
                fingerprint.add(*tech);
            }
        }

        info!(
            "Fingerprint {}: server={} technologies=[{}]",
            base,
            fingerprint.server.as_deref().unwrap_or("unknown"),
            fingerprint
                .technologies
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        (base.to_string(), fingerprint)
    }

    fn extension_candidates(&self, sources: &[&DiscoveredUrl]) -> Vec<(String, UrlSource)> {
        let mut directories: Vec<String> = Vec::new();

        for source in sources.iter().take(self.extension_sources) {
            let interesting = matches!(source.status_code, Some(s) if s < 400 || s == 401 || s == 403);
            if !interesting {
                continue;
            }
            if let Some(dir) = parent_directory(&source.url)
                && !directories.contains(&dir)
            {
                directories.push(dir);
            }
        }

        directories
            .iter()
            .flat_map(|dir| {
                DIRECTORY_FILES
                    .iter()
                    .map(move |file| (format!("{}{}", dir, file), UrlSource::InProcessProber))
            })
            .collect()
    }

    async fn extract_page_links(
        &self,
        pages: Vec<String>,
    ) -> (Vec<DiscoveredUrl>, Vec<(String, PageSummary)>) {
        let mined = join_all(pages.iter().map(|page| self.mine_page(page))).await;

        let mut summaries = Vec::new();
        let mut candidates: Vec<(String, UrlSource)> = Vec::new();
        for (page_url, summary, links) in mined.into_iter().flatten() {
            summaries.push((page_url, summary));
            for link in links {
                if !candidates.iter().any(|(existing, _)| *existing == link) {
                    candidates.push((link, UrlSource::LinkExtraction));
                }
            }
        }

        let found = self.probe_batch(candidates, ProbePhase::LinkExtraction).await;
        (found, summaries)
    }

    async fn mine_page(&self, page_url: &str) -> Option<(String, PageSummary, Vec<String>)> {
        if self.deadline_passed() {
            return None;
        }
        self.report_progress(ProbePhase::LinkExtraction, page_url);

        let page = match self.fetch_page(page_url).await {
            Ok(page) => {
                self.stats
                    .lock()
                    .await
                    .record_success(page.response.elapsed, page.response.content_length);
                page
            }
            Err(e) => {
                self.stats.lock().await.record_failure();
                debug!("Could not fetch {} for link extraction: {}", page_url, e);
                return None;
            }
        };

        let is_html = page
            .response
            .content_type
            .as_ref()
            .is_some_and(|ct| ct.contains("html"));
        if !is_html {
            return None;
        }

        let host = Url::parse(page_url).ok()?.host_str()?.to_string();
        let summary = summarize_page(&page.body);
        let mut links = extract_links(&page.body, page_url, &host);
        links.truncate(self.max_links_per_page);
        debug!("{} link(s) extracted from {}", links.len(), page_url);

        Some((page_url.to_string(), summary, links))
    }
}

fn record_phase(outcome: &mut ProbeOutcome, phase: ProbePhase, found: Vec<DiscoveredUrl>) {
    info!("Phase {} found {} URL(s)", phase, found.len());
    outcome.phase_counts.push((phase, found.len()));
    outcome.discovered.extend(found);
}

fn redirect_candidates(found: &[DiscoveredUrl]) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for d in found {
        let (Some(target), Some(host)) = (d.redirect_target.as_ref(), d.host()) else {
            continue;
        };
        if is_same_host(target, &host) && !targets.contains(target) {
            targets.push(target.clone());
        }
    }
    targets
}

/// Directory containing `url` (the URL itself when it already ends in `/`),
/// always with a trailing slash and without query or fragment.
pub fn parent_directory(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_query(None);
    parsed.set_fragment(None);

    let path = parsed.path().to_string();
    let dir = match path.rfind('/') {
        Some(idx) => path[..=idx].to_string(),
        None => "/".to_string(),
    };
    parsed.set_path(&dir);

    Some(parsed.to_string())
}
