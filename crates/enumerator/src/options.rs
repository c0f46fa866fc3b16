use crate::modules;
use std::time::Duration;

// region:        --- Defaults

// timeouts
pub const DEFAULT_DNS_TIMEOUT_MS: u64 = 4000;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 7500;
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 15000;

// concurrency numbers
pub const DEFAULT_RESOLVER_WORKERS: usize = 100;
pub const DEFAULT_PROBER_WORKERS: usize = 50;

pub const DEFAULT_DNS_RETRIES: usize = 2;
pub const DEFAULT_WILDCARD_PROBE_COUNT: usize = 3;

// endregion:     --- Defaults

/// Tuning knobs for a single `enumerate` run. `Default` is good for most
/// targets; worker counts only bound concurrency, they never spawn threads.
#[derive(Debug, Clone)]
pub struct EnumerateOptions {
    pub resolver_workers: usize,
    pub prober_workers: usize,
    pub dns_timeout: Duration,
    pub http_timeout: Duration,
    pub source_timeout: Duration,
    pub dns_retries: usize,
    /// Source names to query, matched against the registry (`crtsh`,
    /// `sources/crtsh` both work).
    pub enabled_sources: Vec<String>,
    pub wildcard_probe_count: usize,
    /// Retry a host over plain HTTP when the HTTPS attempt fails.
    pub http_fallback: bool,
}

impl Default for EnumerateOptions {
    fn default() -> Self {
        Self {
            resolver_workers: DEFAULT_RESOLVER_WORKERS,
            prober_workers: DEFAULT_PROBER_WORKERS,
            dns_timeout: Duration::from_millis(DEFAULT_DNS_TIMEOUT_MS),
            http_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
            source_timeout: Duration::from_millis(DEFAULT_SOURCE_TIMEOUT_MS),
            dns_retries: DEFAULT_DNS_RETRIES,
            enabled_sources: modules::source_names(),
            wildcard_probe_count: DEFAULT_WILDCARD_PROBE_COUNT,
            http_fallback: true,
        }
    }
}
