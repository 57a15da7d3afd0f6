//! Builder for test configurations.

use std::path::Path;
use std::time::Duration;

use crate::config::Configuration;

/// Fluent builder for configurations suited to tests.
///
/// # Example
///
/// ```rust,ignore
/// use common::testing::TestConfigBuilder;
///
/// let config = TestConfigBuilder::new()
///     .fast()
///     .with_grace_period(Duration::from_secs(10))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: Configuration,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Configuration::default(),
        }
    }

    /// Short intervals so reclaimer tests finish quickly.
    pub fn fast(mut self) -> Self {
        let dropped = &mut self.config.dropped_tables;
        dropped.grace_period = Duration::from_secs(10);
        dropped.reclaim_tick_interval = Duration::from_millis(100);
        dropped.delete_timeout = Duration::from_secs(1);
        dropped.retry_backoff = Duration::from_secs(5);
        dropped.max_retry_backoff = Duration::from_secs(60);
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.config.dropped_tables.grace_period = grace;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.config.dropped_tables.reclaim_tick_interval = interval;
        self
    }

    pub fn with_delete_timeout(mut self, timeout: Duration) -> Self {
        self.config.dropped_tables.delete_timeout = timeout;
        self
    }

    pub fn with_retry_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config.dropped_tables.retry_backoff = base;
        self.config.dropped_tables.max_retry_backoff = max;
        self
    }

    /// Point the metadata_dropped directory and data root at a temp dir.
    pub fn with_data_dir(mut self, dir: &Path) -> Self {
        self.config.dropped_tables.metadata_dropped_dir = dir.join("metadata_dropped");
        self.config.dropped_tables.data_root = Some(dir.to_path_buf());
        self
    }

    pub fn build(self) -> Configuration {
        self.config
    }
}
