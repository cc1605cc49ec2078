//! Configuration management for the gateway
//!
//! Configuration is read once at process start (TOML file, then environment
//! overrides) and handed to the engine and stores as an explicit value.
//! Nothing below reads the environment at request time.

use crate::query::engine::QueryMode;
use crate::services::parse_schedule;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApplicationConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Time-series backend (InfluxDB v2)
    #[serde(default)]
    pub influx: InfluxConfig,

    /// Daily summary store (PostgREST)
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Query engine behaviour
    #[serde(default)]
    pub query: QueryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    /// Listen address (`host:port`)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// CORS allowed origins (empty = allow all)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// InfluxDB connection and schema
///
/// Identifiers here are the only names that reach rendered queries, so they
/// must come from trusted configuration.
#[derive(Clone, Deserialize, Serialize)]
pub struct InfluxConfig {
    /// Base URL, e.g. `https://eu-central-1-1.aws.cloud2.influxdata.com`
    #[serde(default)]
    pub url: Option<String>,

    /// Organization name
    #[serde(default)]
    pub org: Option<String>,

    /// Bucket name
    #[serde(default)]
    pub bucket: Option<String>,

    /// API token
    #[serde(default)]
    pub token: Option<String>,

    /// Measurement holding the readings
    #[serde(default = "default_measurement")]
    pub measurement: String,

    /// Temperature field name
    #[serde(default = "default_temperature_field")]
    pub temperature_field: String,

    /// Humidity field name
    #[serde(default = "default_humidity_field")]
    pub humidity_field: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Daily summary store settings
#[derive(Clone, Deserialize, Serialize)]
pub struct SummaryConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: Option<String>,

    /// Service role key
    #[serde(default)]
    pub service_key: Option<String>,

    /// Table holding one row per day
    #[serde(default = "default_summary_table")]
    pub table: String,

    /// UTC time of day (`HH:MM`) at which the previous day is recomputed;
    /// no scheduler runs when unset
    #[serde(default)]
    pub schedule_utc: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Query engine settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueryConfig {
    /// `pushdown` (aggregate in the backend) or `local`
    #[serde(default)]
    pub mode: QueryMode,
}

// Default value functions
fn default_listen_addr() -> String { "0.0.0.0:8080".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_measurement() -> String { "readings".to_string() }
fn default_temperature_field() -> String { "temperatura".to_string() }
fn default_humidity_field() -> String { "humedad".to_string() }
fn default_summary_table() -> String { "resumen_dia".to_string() }
fn default_timeout_secs() -> u64 { 30 }

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: None,
            org: None,
            bucket: None,
            token: None,
            measurement: default_measurement(),
            temperature_field: default_temperature_field(),
            humidity_field: default_humidity_field(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_key: None,
            table: default_summary_table(),
            schedule_utc: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Treat blank strings the same as unset values
fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl InfluxConfig {
    /// Environment names of the required settings that are absent
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !present(&self.url) {
            missing.push("INFLUX_URL");
        }
        if !present(&self.org) {
            missing.push("INFLUX_ORG");
        }
        if !present(&self.bucket) {
            missing.push("INFLUX_BUCKET");
        }
        if !present(&self.token) {
            missing.push("INFLUX_TOKEN");
        }
        missing
    }

    /// Whether every required setting is present
    pub fn is_complete(&self) -> bool {
        self.missing_keys().is_empty()
    }

    /// Whether no required setting is present at all
    pub fn is_unset(&self) -> bool {
        [&self.url, &self.org, &self.bucket, &self.token]
            .iter()
            .all(|v| !present(v))
    }
}

impl SummaryConfig {
    /// Environment names of the required settings that are absent
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !present(&self.url) {
            missing.push("SUPABASE_URL");
        }
        if !present(&self.service_key) {
            missing.push("SUPABASE_SERVICE_ROLE_KEY");
        }
        missing
    }

    /// Whether every required setting is present
    pub fn is_complete(&self) -> bool {
        self.missing_keys().is_empty()
    }

    /// Whether no required setting is present at all
    pub fn is_unset(&self) -> bool {
        !present(&self.url) && !present(&self.service_key)
    }
}

// Secrets never reach logs through Debug
impl std::fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("url", &self.url)
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("measurement", &self.measurement)
            .field("temperature_field", &self.temperature_field)
            .field("humidity_field", &self.humidity_field)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for SummaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryConfig")
            .field("url", &self.url)
            .field("service_key", &self.service_key.as_ref().map(|_| "***"))
            .field("table", &self.table)
            .field("schedule_utc", &self.schedule_utc)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ApplicationConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        Self::from_toml(&contents).map_err(|e| format!("{} ({})", e, path))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Load configuration with environment variable overrides
    pub fn load(path: &str) -> Result<Self, String> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), String> {
        // Server
        if let Some(addr) = env_value("CLIMA_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(level) = env_value("RUST_LOG") {
            self.server.log_level = level;
        }

        // Time-series backend
        if let Some(url) = env_value("INFLUX_URL") {
            self.influx.url = Some(url);
        }
        if let Some(org) = env_value("INFLUX_ORG") {
            self.influx.org = Some(org);
        }
        if let Some(bucket) = env_value("INFLUX_BUCKET") {
            self.influx.bucket = Some(bucket);
        }
        if let Some(token) = env_value("INFLUX_TOKEN") {
            self.influx.token = Some(token);
        }

        // Summary store
        if let Some(url) = env_value("SUPABASE_URL") {
            self.summary.url = Some(url);
        }
        if let Some(key) = env_value("SUPABASE_SERVICE_ROLE_KEY") {
            self.summary.service_key = Some(key);
        }
        if let Some(schedule) = env_value("CLIMA_SUMMARY_SCHEDULE") {
            self.summary.schedule_utc = Some(schedule);
        }

        // Query engine
        if let Some(mode) = env_value("CLIMA_QUERY_MODE") {
            self.query.mode = mode.parse()?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid listen address: {}",
                self.server.listen_addr
            ));
        }

        for (name, value) in [
            ("measurement", &self.influx.measurement),
            ("temperature_field", &self.influx.temperature_field),
            ("humidity_field", &self.influx.humidity_field),
            ("summary table", &self.summary.table),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} cannot be empty", name));
            }
        }

        if let Some(schedule) = &self.summary.schedule_utc {
            if parse_schedule(schedule).is_none() {
                return Err(format!(
                    "Invalid summary schedule '{}', expected HH:MM",
                    schedule
                ));
            }
        }

        if self.influx.timeout_secs == 0 || self.summary.timeout_secs == 0 {
            return Err("Request timeouts must be > 0".to_string());
        }

        Ok(())
    }
}
