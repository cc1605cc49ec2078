//! Server Configuration
//!
//! This module handles locating and loading the configuration file.

use clima_gateway::config::ApplicationConfig;
use std::path::Path;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "CLIMA_CONFIG";

/// Default configuration file in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "application.toml";

/// Load configuration from file or environment
///
/// Priority:
/// 1. `--config` path, then the CLIMA_CONFIG environment variable
/// 2. application.toml
/// 3. Default configuration
///
/// Environment overrides apply on top of whichever source was used. Progress
/// is reported on stderr because logging is not initialised yet.
pub fn load_config(explicit: Option<&Path>) -> Result<ApplicationConfig, String> {
    let from_env = std::env::var(CONFIG_ENV).ok();
    let path = explicit
        .map(|p| p.to_string_lossy().into_owned())
        .or(from_env);

    if let Some(path) = path {
        let config = ApplicationConfig::load(&path)?;
        eprintln!("[config] Loaded configuration from: {}", path);
        return Ok(config);
    }

    if Path::new(DEFAULT_CONFIG_FILE).exists() {
        let config = ApplicationConfig::load(DEFAULT_CONFIG_FILE)?;
        eprintln!("[config] Loaded configuration from {}", DEFAULT_CONFIG_FILE);
        return Ok(config);
    }

    eprintln!("[config] Using default configuration");
    ApplicationConfig::from_env()
}
