use ferrous_doh_domain::{CliOverrides, Config};
use tracing::{error, info};

/// Loads and validates the configuration. Called at startup and again on
/// every reload.
pub fn load_config(path: Option<&str>, overrides: CliOverrides) -> anyhow::Result<Config> {
    let config = Config::load(path, overrides).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!(e)
    })?;

    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        anyhow::anyhow!(e)
    })?;

    match path.map(str::to_string).or_else(Config::get_config_path) {
        Some(source) => info!(path = %source, "Configuration loaded"),
        None => info!("No configuration file found, using defaults"),
    }

    Ok(config)
}
