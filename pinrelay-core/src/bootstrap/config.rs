//! Configuration loading

use anyhow::Result;
use tracing::info;

use crate::Config;

/// Load configuration from a config file or environment variables
///
/// Config file search order:
/// 1. explicit path (`--config` / `PINRELAY_CONFIG_PATH`)
/// 2. ./config.yaml (current working directory)
/// 3. /config/config.yaml (container mount path)
/// 4. Fall back to environment variables only
pub fn load_config(explicit: Option<&str>) -> Result<Config> {
    let config_path = explicit
        .map(ToString::to_string)
        .or_else(|| std::env::var("PINRELAY_CONFIG_PATH").ok())
        .filter(|p| std::path::Path::new(p).exists())
        .or_else(|| {
            ["config.yaml", "/config/config.yaml"]
                .into_iter()
                .find(|p| std::path::Path::new(p).exists())
                .map(ToString::to_string)
        });

    let config = if let Some(path) = config_path {
        eprintln!("Loading config from {path}");
        Config::from_file(&path).map_err(|e| anyhow::anyhow!("Failed to load {path}: {e}"))?
    } else {
        eprintln!("No config file found, using environment variables");
        Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config from environment: {e}"))?
    };

    // fail fast on misconfigurations
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    info!("Configuration loaded and validated successfully");
    Ok(config)
}
