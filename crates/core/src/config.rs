use serde::Deserialize;

use crate::error::{AnalyticsError, AnalyticsResult};

/// Lowest retention horizon accepted for any raw-event category.
pub const RETENTION_FLOOR_DAYS: u32 = 7;

/// Root application configuration. Loaded from environment variables
/// with the prefix `LOTPULSE__` and TOML config files.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Session tracking and raw-event ingestion knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Sliding idle window after which an open session is considered ended.
    #[serde(default = "default_idle_timeout_mins")]
    pub idle_timeout_mins: u32,
    /// Fraction of page views / generic interactions recorded. Business
    /// events are never sampled away.
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    /// Upper bound for any single analytics write before it is abandoned.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
    /// Maximum events accepted in one ingestion batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Truncation bound for captured error messages.
    #[serde(default = "default_error_message_max_len")]
    pub error_message_max_len: usize,
}

/// Per-category retention horizons, in days.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_session_days")]
    pub session_days: u32,
    #[serde(default = "default_page_view_days")]
    pub page_view_days: u32,
    #[serde(default = "default_interaction_days")]
    pub interaction_days: u32,
    /// Conversion/business-category interactions outlive generic ones.
    #[serde(default = "default_conversion_interaction_days")]
    pub conversion_interaction_days: u32,
    #[serde(default = "default_business_event_days")]
    pub business_event_days: u32,
    #[serde(default = "default_performance_days")]
    pub performance_days: u32,
    /// Daily rollups are the durable historical record.
    #[serde(default = "default_daily_metrics_days")]
    pub daily_metrics_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_rollup_interval_secs")]
    pub rollup_interval_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Error interactions per hour before `/health` reports degraded.
    #[serde(default = "default_error_events_per_hour")]
    pub error_events_per_hour: u64,
}

// Default functions
fn default_node_id() -> String {
    "lotpulse-01".to_string()
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_idle_timeout_mins() -> u32 {
    30
}
fn default_sampling_rate() -> f64 {
    1.0
}
fn default_op_timeout_ms() -> u64 {
    250
}
fn default_batch_size() -> usize {
    500
}
fn default_error_message_max_len() -> usize {
    512
}
fn default_session_days() -> u32 {
    90
}
fn default_page_view_days() -> u32 {
    90
}
fn default_interaction_days() -> u32 {
    180
}
fn default_conversion_interaction_days() -> u32 {
    365
}
fn default_business_event_days() -> u32 {
    365
}
fn default_performance_days() -> u32 {
    30
}
fn default_daily_metrics_days() -> u32 {
    1095
}
fn default_rollup_interval_secs() -> u64 {
    3600
}
fn default_cleanup_interval_secs() -> u64 {
    3600
}
fn default_cache_enabled() -> bool {
    true
}
fn default_cache_ttl_secs() -> u64 {
    60
}
fn default_error_events_per_hour() -> u64 {
    100
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            idle_timeout_mins: default_idle_timeout_mins(),
            sampling_rate: default_sampling_rate(),
            op_timeout_ms: default_op_timeout_ms(),
            batch_size: default_batch_size(),
            error_message_max_len: default_error_message_max_len(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            page_view_days: default_page_view_days(),
            interaction_days: default_interaction_days(),
            conversion_interaction_days: default_conversion_interaction_days(),
            business_event_days: default_business_event_days(),
            performance_days: default_performance_days(),
            daily_metrics_days: default_daily_metrics_days(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rollup_interval_secs: default_rollup_interval_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            error_events_per_hour: default_error_events_per_hour(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            environment: default_environment(),
            api: ApiConfig::default(),
            tracking: TrackingConfig::default(),
            retention: RetentionConfig::default(),
            scheduler: SchedulerConfig::default(),
            cache: CacheConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("LOTPULSE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Whether the service runs with production hardening (secure cookies,
    /// no stack traces in captured errors).
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Validate externally supplied values at startup.
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.tracking.batch_size == 0 || self.tracking.batch_size > 100_000 {
            return Err(AnalyticsError::Config(format!(
                "batch_size {} outside [1, 100000]",
                self.tracking.batch_size
            )));
        }
        if !(0.0..=1.0).contains(&self.tracking.sampling_rate) {
            return Err(AnalyticsError::Config(format!(
                "sampling_rate {} outside [0, 1]",
                self.tracking.sampling_rate
            )));
        }
        if self.tracking.idle_timeout_mins == 0 {
            return Err(AnalyticsError::Config(
                "idle_timeout_mins must be at least 1".to_string(),
            ));
        }
        let horizons = [
            ("session_days", self.retention.session_days),
            ("page_view_days", self.retention.page_view_days),
            ("interaction_days", self.retention.interaction_days),
            (
                "conversion_interaction_days",
                self.retention.conversion_interaction_days,
            ),
            ("business_event_days", self.retention.business_event_days),
            ("performance_days", self.retention.performance_days),
            ("daily_metrics_days", self.retention.daily_metrics_days),
        ];
        for (name, days) in horizons {
            if days < RETENTION_FLOOR_DAYS {
                return Err(AnalyticsError::Config(format!(
                    "{} = {} below retention floor of {} days",
                    name, days, RETENTION_FLOOR_DAYS
                )));
            }
        }
        if self.retention.conversion_interaction_days < self.retention.interaction_days {
            return Err(AnalyticsError::Config(
                "conversion_interaction_days must not be shorter than interaction_days"
                    .to_string(),
            ));
        }
        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(AnalyticsError::Config(
                "cache.ttl_secs must be at least 1 when caching is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_production());
    }

    #[test]
    fn test_sampling_rate_bounds() {
        let mut config = AppConfig::default();
        config.tracking.sampling_rate = 1.5;
        assert!(config.validate().is_err());
        config.tracking.sampling_rate = -0.1;
        assert!(config.validate().is_err());
        config.tracking.sampling_rate = 0.25;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retention_floor() {
        let mut config = AppConfig::default();
        config.retention.performance_days = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_conversion_horizon_ordering() {
        let mut config = AppConfig::default();
        config.retention.conversion_interaction_days = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_size_bounds() {
        let mut config = AppConfig::default();
        config.tracking.batch_size = 0;
        assert!(config.validate().is_err());
        config.tracking.batch_size = 200_000;
        assert!(config.validate().is_err());
    }
}
