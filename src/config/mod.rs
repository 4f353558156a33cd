//! Layered configuration for the realtime client.
//!
//! Values come from an optional `config/default.*` file, then from
//! `POPSUB_`-prefixed environment variables (`POPSUB_RECONNECT__MAX_ATTEMPTS`),
//! and are merged over [`Settings::default`].

mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    AuthSettings, HeartbeatSettings, LoggingSettings, PartialSettings, QueueSettings,
    ReconnectSettings, ServerSettings, Settings,
};

const DEFAULT_CONFIG_FILE: &str = "config/default";
const ENV_PREFIX: &str = "POPSUB";

/// Loads the configuration from the default file and environment variables,
/// merged with default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_FILE)
}

/// Same as [`load_config`], reading the file at `path` (extension optional).
/// A missing file is not an error.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let settings = Settings::merged(partial);
    settings.validate()?;
    Ok(settings)
}
