pub mod data;
pub mod dedup;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod processor;
pub mod rules;
pub mod security;
pub mod seeds;

pub use data::{Finding, Severity};
pub use discovery::{
    DiscoveryBudget, DiscoveryOptions, DiscoveryProgressCallback, DiscoveryReport, RunStatistics,
    generate_discovery_report, run_discovery,
};
pub use error::DiscoveryError;
pub use seeds::{ScanData, ServiceRecord};
