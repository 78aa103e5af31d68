mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, Environment, File};

use crate::utils::Result;

pub use settings::{BrokerSettings, LogSettings, PersistenceSettings, ServerSettings, Settings};

/// Prefix for environment overrides, e.g. `RELAYMQ_BROKER__MAX_CONNECTIONS=8`.
pub const ENV_PREFIX: &str = "RELAYMQ";

/// Loads the configuration from `config/default` and environment variables,
/// merged over `Settings::default()`.
pub fn load_config() -> Result<Settings> {
    load_config_from("config/default")
}

/// Same as [`load_config`] with an explicit base path for the optional file
/// source (any extension the `config` crate understands).
pub fn load_config_from(path: &str) -> Result<Settings> {
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

    Ok(partial.merge(Settings::default()))
}
