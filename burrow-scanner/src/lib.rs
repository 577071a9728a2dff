pub mod content;
pub mod error;
pub mod external;
pub mod fingerprint;
pub mod links;
pub mod normalize;
pub mod paths;
pub mod prober;
pub mod result;
pub mod stats;

pub use error::ScanError;
pub use external::{ExternalCrawler, ExternalCrawlerConfig, ExternalOutcome};
pub use fingerprint::{Fingerprint, Technology};
pub use prober::{ProbeOutcome, ProbePhase, Prober, ProgressCallback};
pub use result::{DiscoveredUrl, PageSummary, UrlCategory, UrlSource};
pub use stats::CrawlerStatistics;
