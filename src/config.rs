//! Environment-variable configuration, `BOTCREW_`-prefixed.

use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,

    /// Namespace/label scope the worker-runtime adapter filters pods by.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Path to an explicit kubeconfig, tried only after the ambient
    /// in-cluster credential fails to load.
    pub kubeconfig_path: Option<String>,

    #[serde(default = "default_reconciler_period_secs")]
    pub reconciler_period_secs: u64,

    #[serde(default = "default_delivery_queue_workers")]
    pub delivery_queue_workers: usize,

    #[serde(default = "default_delivery_queue_poll_interval_ms")]
    pub delivery_queue_poll_interval_ms: u64,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_background_max_connections")]
    pub db_background_max_connections: u32,
}

fn default_namespace() -> String {
    "botcrew".to_string()
}

fn default_reconciler_period_secs() -> u64 {
    60
}

fn default_delivery_queue_workers() -> usize {
    4
}

fn default_delivery_queue_poll_interval_ms() -> u64 {
    500
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_background_max_connections() -> u32 {
    20
}

impl Config {
    /// Loads configuration from `BOTCREW_*` environment variables.
    ///
    /// `database_url` and `redis_url` have no default -- a missing value is
    /// a startup error, not a silently-wrong local default, since both name
    /// shared infrastructure the process cannot safely guess at.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("port", 8080)?
            .add_source(config::Environment::with_prefix("BOTCREW").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn reconciler_period(&self) -> Duration {
        Duration::from_secs(self.reconciler_period_secs)
    }

    pub fn delivery_queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.delivery_queue_poll_interval_ms)
    }
}
