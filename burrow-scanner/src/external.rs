//! Delegation to an external crawler binary. The binary receives one URL
//! on stdin and prints discovered URLs (plain or JSON lines) on stdout.

use crate::error::{Result, ScanError};
use crate::normalize::{is_same_host, passes_url_filter, url_signature};
use crate::result::{DiscoveredUrl, UrlSource};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;
use which::which;

pub const DEFAULT_EXTERNAL_BINARY: &str = "katana";
const MAX_EXTERNAL_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalCrawlerConfig {
    pub enabled: bool,
    /// Binary name looked up on PATH, or a path to the binary.
    pub binary: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub concurrency: usize,
}

impl Default for ExternalCrawlerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: DEFAULT_EXTERNAL_BINARY.to_string(),
            args: vec![
                "-silent".to_string(),
                "-jsonl".to_string(),
                "-d".to_string(),
                "2".to_string(),
            ],
            timeout_secs: 300,
            concurrency: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExternalOutcome {
    pub urls: Vec<DiscoveredUrl>,
    /// Whether the binary was found and enabled.
    pub available: bool,
    pub hosts_attempted: usize,
    pub failures: usize,
    /// Set when the run deadline cut a host short or skipped it.
    pub truncated: bool,
}

/// Output of a single process run. `timed_out` runs still carry whatever
/// lines were read before the kill.
struct HostRun {
    lines: Vec<String>,
    timed_out: bool,
    deadline_hit: bool,
    skipped: bool,
}

impl HostRun {
    fn skipped() -> Self {
        Self {
            lines: Vec::new(),
            timed_out: false,
            deadline_hit: true,
            skipped: true,
        }
    }
}

pub struct ExternalCrawler {
    config: ExternalCrawlerConfig,
    binary: Option<PathBuf>,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl ExternalCrawler {
    pub fn new(config: ExternalCrawlerConfig) -> Self {
        let binary = if config.enabled {
            get_binary_path(&config.binary)
        } else {
            None
        };
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        Self {
            config,
            binary,
            timeout,
            deadline: None,
        }
    }

    /// Hosts not started by `deadline` are skipped and running ones are
    /// killed when it passes. Output read before the kill is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    /// Time allowed for the next host and whether the run deadline is what
    /// bounds it. `None` once the deadline has passed.
    fn host_timeout(&self) -> Option<(Duration, bool)> {
        let Some(deadline) = self.deadline else {
            return Some((self.timeout, false));
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            None
        } else if remaining < self.timeout {
            Some((remaining, true))
        } else {
            Some((self.timeout, false))
        }
    }

    /// Runs the binary once per seed host. Never fails: a missing binary is
    /// a no-op and per-host errors are counted in `failures`.
    pub async fn crawl(&self, seeds: &[DiscoveredUrl]) -> ExternalOutcome {
        let Some(binary) = self.binary.as_ref() else {
            if self.config.enabled {
                info!(
                    "External crawler '{}' not found, skipping delegated discovery",
                    self.config.binary
                );
            } else {
                debug!("External crawler disabled");
            }
            return ExternalOutcome::default();
        };

        let representatives = select_representatives(seeds);
        info!(
            "Running {} against {} host(s)",
            binary.display(),
            representatives.len()
        );

        let concurrency = self.config.concurrency.clamp(1, MAX_EXTERNAL_CONCURRENCY);
        let mut runs: Vec<(usize, String, Result<HostRun>)> = stream::iter(representatives.into_iter().enumerate())
            .map(|(idx, url)| async move {
                let run = match self.host_timeout() {
                    Some((timeout, bounded)) => {
                        self.run_for_host(binary, &url, timeout)
                            .await
                            .map(|mut run| {
                                run.deadline_hit = run.timed_out && bounded;
                                run
                            })
                    }
                    None => Ok(HostRun::skipped()),
                };
                (idx, url, run)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        runs.sort_by_key(|(idx, _, _)| *idx);

        let mut outcome = ExternalOutcome {
            available: true,
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();

        for (_, target, run) in runs {
            let run = match run {
                Ok(run) => run,
                Err(e) => {
                    warn!("External crawler failed for {}: {}", target, e);
                    outcome.hosts_attempted += 1;
                    outcome.failures += 1;
                    continue;
                }
            };
            if run.deadline_hit {
                outcome.truncated = true;
            }
            if run.skipped {
                info!("Run deadline passed, skipping external crawl of {}", target);
                continue;
            }
            outcome.hosts_attempted += 1;

            if run.deadline_hit {
                warn!(
                    "External crawler for {} stopped at the run deadline, keeping {} partial line(s)",
                    target,
                    run.lines.len()
                );
                outcome.failures += 1;
            } else if run.timed_out {
                warn!(
                    "External crawler failed for {}: {}, keeping {} partial line(s)",
                    target,
                    ScanError::Timeout(self.timeout),
                    run.lines.len()
                );
                outcome.failures += 1;
            }

            let Some(host) = Url::parse(&target)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
            else {
                continue;
            };

            let before = outcome.urls.len();
            for line in &run.lines {
                let Some(found) = parse_output_line(line) else {
                    continue;
                };
                if !is_same_host(&found, &host) || !passes_url_filter(&found) {
                    continue;
                }
                if !seen.insert(url_signature(&found)) {
                    continue;
                }
                if let Some(url) = DiscoveredUrl::new(&found, UrlSource::ExternalDelegate) {
                    outcome.urls.push(url);
                }
            }
            debug!(
                "External crawler returned {} URL(s) for {}",
                outcome.urls.len() - before,
                host
            );
        }

        outcome
    }

    async fn run_for_host(&self, binary: &Path, url: &str, timeout: Duration) -> Result<HostRun> {
        let mut child = Command::new(binary)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScanError::ToolUnavailable("stdout was not captured".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();
        let mut collected = Vec::new();

        // The exit wait shares the timeout: a binary may close stdout and
        // keep running.
        let result = tokio::time::timeout(timeout, async {
            if let Some(mut stdin) = stdin {
                stdin.write_all(format!("{}\n", url).as_bytes()).await?;
                stdin.shutdown().await?;
            }
            while let Some(line) = lines.next_line().await? {
                collected.push(line);
            }
            child.wait().await
        })
        .await;

        match result {
            Ok(status) => {
                let status = status?;
                if !status.success() {
                    debug!("External crawler exited with {} for {}", status, url);
                }
                Ok(HostRun {
                    lines: collected,
                    timed_out: false,
                    deadline_hit: false,
                    skipped: false,
                })
            }
            Err(_) => {
                child.kill().await.ok();
                Ok(HostRun {
                    lines: collected,
                    timed_out: true,
                    deadline_hit: false,
                    skipped: false,
                })
            }
        }
    }
}

/// Resolves a tool binary.
/// Search order: explicit path → ./tools/{name} → PATH
pub fn get_binary_path(tool: &str) -> Option<PathBuf> {
    let tool = tool.trim();
    let explicit = PathBuf::from(tool);
    if explicit.components().count() > 1 && explicit.is_file() {
        return Some(explicit);
    }

    let binary_name = if cfg!(target_os = "windows") && !tool.ends_with(".exe") {
        format!("{}.exe", tool)
    } else {
        tool.to_string()
    };

    let tools_path = PathBuf::from("./tools").join(&binary_name);
    if tools_path.is_file() {
        return Some(tools_path);
    }

    which(&binary_name).ok()
}

/// One URL per host, preferring the root path, then https, then seeds
/// that already answered below 400. Hosts keep first-seen order.
pub fn select_representatives(seeds: &[DiscoveredUrl]) -> Vec<String> {
    let mut hosts: Vec<(String, &DiscoveredUrl, u8)> = Vec::new();

    for seed in seeds {
        let Some(host) = seed.host() else {
            continue;
        };
        let score = representative_score(seed);
        match hosts.iter_mut().find(|(h, _, _)| *h == host) {
            Some(entry) if score > entry.2 => {
                entry.1 = seed;
                entry.2 = score;
            }
            Some(_) => {}
            None => hosts.push((host, seed, score)),
        }
    }

    hosts.into_iter().map(|(_, seed, _)| seed.url.clone()).collect()
}

fn representative_score(seed: &DiscoveredUrl) -> u8 {
    let mut score = 0;
    if seed.path() == "/" {
        score += 3;
    }
    if seed.url.starts_with("https://") {
        score += 2;
    }
    if seed.status_code.is_some_and(|s| s < 400) {
        score += 2;
    }
    score
}

/// Extracts a URL from one line of crawler output. Accepts bare URLs and
/// JSON objects carrying `endpoint`/`url`, at the top level or under
/// `request`.
pub fn parse_output_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if line.starts_with('{') {
        let parsed: Value = serde_json::from_str(line).ok()?;
        let found = parsed
            .get("endpoint")
            .or_else(|| parsed.get("url"))
            .and_then(|v| v.as_str())
            .or_else(|| {
                parsed
                    .get("request")
                    .and_then(|req| req.get("endpoint").or_else(|| req.get("url")))
                    .and_then(|v| v.as_str())
            })?;
        return Some(found.trim().to_string());
    }

    if line.starts_with("http://") || line.starts_with("https://") {
        return line.split_whitespace().next().map(|s| s.to_string());
    }

    None
}
