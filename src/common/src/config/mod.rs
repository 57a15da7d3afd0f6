use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

pub const DEFAULT_CONFIG_FILE: &str = "tombstone.toml";
pub const ENV_PREFIX: &str = "TOMBSTONE__";

/// Settings for the dropped-table registry and its reclaimer.
///
/// Env: TOMBSTONE__DROPPED_TABLES__<FIELD>
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DroppedTablesConfig {
    /// Time between a table being dropped and its data becoming eligible for
    /// physical deletion. Fixed per entry at drop time.
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,
    /// Interval between reclaimer sweeps.
    #[serde(with = "humantime_serde")]
    pub reclaim_tick_interval: Duration,
    /// Upper bound on a single physical delete. Exceeding it counts as a failure.
    #[serde(with = "humantime_serde")]
    pub delete_timeout: Duration,
    /// Delay before the first retry of a failed delete. Doubles per failure.
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
    /// Cap for the retry delay.
    #[serde(with = "humantime_serde")]
    pub max_retry_backoff: Duration,
    /// Maximum number of physical deletes running at once within a sweep.
    pub max_concurrent_deletes: usize,
    /// Directory holding metadata of dropped tables, scanned at startup.
    pub metadata_dropped_dir: PathBuf,
    /// Root that relative metadata paths are resolved against on delete.
    #[serde(default)]
    pub data_root: Option<PathBuf>,
}

impl Default for DroppedTablesConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(480),
            reclaim_tick_interval: Duration::from_secs(30),
            delete_timeout: Duration::from_secs(60),
            retry_backoff: Duration::from_secs(60),
            max_retry_backoff: Duration::from_secs(3600),
            max_concurrent_deletes: 16,
            metadata_dropped_dir: PathBuf::from(".data/metadata_dropped"),
            data_root: None,
        }
    }
}

impl DroppedTablesConfig {
    /// Validate the dropped-tables configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.reclaim_tick_interval.is_zero() {
            anyhow::bail!("reclaim_tick_interval must be positive");
        }

        if self.delete_timeout.is_zero() {
            anyhow::bail!("delete_timeout must be positive");
        }

        if self.retry_backoff.is_zero() {
            anyhow::bail!("retry_backoff must be positive");
        }

        if self.max_retry_backoff < self.retry_backoff {
            anyhow::bail!(
                "max_retry_backoff ({:?}) must not be shorter than retry_backoff ({:?})",
                self.max_retry_backoff,
                self.retry_backoff
            );
        }

        if self.max_concurrent_deletes == 0 {
            anyhow::bail!("max_concurrent_deletes must be positive");
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Deferred drop and reclamation settings
    pub dropped_tables: DroppedTablesConfig,
}

impl Configuration {
    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
    }

    /// Load from `tombstone.toml` in the working directory, then `TOMBSTONE__*` env vars.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        let config = Self::figment()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}
