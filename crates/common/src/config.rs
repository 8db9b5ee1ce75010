//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration.
    pub redis: RedisConfig,
    /// Voting configuration.
    pub voting: VotingConfig,
    /// Feed ranking configuration.
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Vote-ingestion configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VotingConfig {
    /// Server-side pepper mixed into device and network fingerprints.
    /// Fingerprints are unforgeable without it; rotate with care, as rotating
    /// invalidates all stored channel hashes.
    pub pepper: String,
    /// Votes allowed per identity channel per window.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_window: u32,
    /// Rate-limit window length in seconds.
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,
    /// Interval between aggregate reconciliation passes, in seconds.
    #[serde(default = "default_reconcile_secs")]
    pub reconcile_interval_secs: u64,
}

/// Feed ranking weights and paging.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Weight of the `ln(1 + total_votes)` trend term.
    #[serde(default = "default_w_trend")]
    pub w_trend: f64,
    /// Weight of the `exp(-age_hours / 24)` freshness term.
    #[serde(default = "default_w_fresh")]
    pub w_fresh: f64,
    /// Weight of the follow-graph interest term.
    #[serde(default = "default_w_interest")]
    pub w_interest: f64,
    /// Default page size.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            w_trend: default_w_trend(),
            w_fresh: default_w_fresh(),
            w_interest: default_w_interest(),
            page_size: default_page_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "pollwave".to_string()
}

const fn default_rate_limit() -> u32 {
    60
}

const fn default_rate_window_secs() -> u64 {
    60
}

const fn default_reconcile_secs() -> u64 {
    300
}

const fn default_w_trend() -> f64 {
    0.6
}

const fn default_w_fresh() -> f64 {
    0.4
}

const fn default_w_interest() -> f64 {
    0.5
}

const fn default_page_size() -> u64 {
    10
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `POLLWAVE_ENV`)
    /// 3. Environment variables with `POLLWAVE_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("POLLWAVE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("POLLWAVE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("POLLWAVE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_defaults_match_ranking_weights() {
        let feed = FeedConfig::default();
        assert_eq!(feed.w_trend, 0.6);
        assert_eq!(feed.w_fresh, 0.4);
        assert_eq!(feed.w_interest, 0.5);
        assert_eq!(feed.page_size, 10);
    }

    #[test]
    fn test_voting_defaults() {
        assert_eq!(default_rate_limit(), 60);
        assert_eq!(default_rate_window_secs(), 60);
    }
}
