use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Running counters for a prober run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlerStatistics {
    pub urls_tested: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub avg_response_time_ms: f64,
    pub total_bytes: u64,
}

impl CrawlerStatistics {
    pub fn record_success(&mut self, response_time: Duration, bytes: Option<u64>) {
        self.urls_tested += 1;
        self.successful_requests += 1;
        let sample = response_time.as_secs_f64() * 1000.0;
        let n = self.successful_requests as f64;
        self.avg_response_time_ms += (sample - self.avg_response_time_ms) / n;
        self.total_bytes += bytes.unwrap_or(0);
    }

    pub fn record_failure(&mut self) {
        self.urls_tested += 1;
        self.failed_requests += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.urls_tested == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.urls_tested as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average() {
        let mut stats = CrawlerStatistics::default();
        stats.record_success(Duration::from_millis(100), Some(10));
        stats.record_success(Duration::from_millis(300), None);
        stats.record_failure();

        assert_eq!(stats.urls_tested, 3);
        assert_eq!(stats.successful_requests, 2);
        assert_eq!(stats.failed_requests, 1);
        assert!((stats.avg_response_time_ms - 200.0).abs() < 1e-6);
        assert_eq!(stats.total_bytes, 10);
        assert!((stats.success_rate() - 2.0 / 3.0).abs() < 1e-9);
    }
}
