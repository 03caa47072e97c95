use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one harvest run.
///
/// Replaces the usual pile of global constants with an explicit structure
/// passed into the pipeline entry point. `Default` carries the values for the
/// primary-education vacancy board; builders allow overriding them per run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Index page listing the vacancy detail URLs. Only this single page is
    /// consulted; no pagination.
    pub index_url: String,

    /// Path of the persisted record table (CSV).
    pub table_path: PathBuf,

    /// When set, the fetched URL set is truncated to at most `sample_limit`
    /// members before deduplication. A throttle for manual testing, not a
    /// production feature.
    pub dev_mode: bool,

    /// Maximum sample size in dev mode.
    pub sample_limit: usize,

    /// Per-request timeout for the HTTP client.
    pub request_timeout: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            index_url: "https://www.meesterbaan.nl/vacatures/basisonderwijs/onderwijzend/p-99"
                .to_string(),
            table_path: PathBuf::from("vacatures_basisonderwijs.csv"),
            dev_mode: false,
            sample_limit: 10,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl HarvestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = url.into();
        self
    }

    pub fn with_table_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.table_path = path.into();
        self
    }

    pub fn with_dev_mode(mut self, enabled: bool) -> Self {
        self.dev_mode = enabled;
        self
    }

    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
