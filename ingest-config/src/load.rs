use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Base configuration file loaded for all environments.
const BASE_CONFIG_FILE: &str = "base.yaml";

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
///
/// Example: `APP_BATCH__MAX_FILES` sets the `batch.max_files` field.
const ENV_SEPARATOR: &str = "__";

/// Errors raised while assembling the application configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("failed to parse APP_ENVIRONMENT: {0}")]
    Environment(#[source] std::io::Error),

    #[error("failed to build configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Loads hierarchical configuration from `./configuration`.
///
/// Sources are layered in this order:
/// 1. `configuration/base.yaml`
/// 2. `configuration/{environment}.yaml` (optional)
/// 3. environment variables prefixed with `APP`, nested with `__`
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    load_config_from(&base_path.join(CONFIGURATION_DIR), environment)
}

/// Loads configuration from an explicit directory for a given environment.
pub fn load_config_from<T>(
    configuration_directory: &Path,
    environment: Environment,
) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let environment_filename = format!("{environment}.yaml");

    let environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join(BASE_CONFIG_FILE),
        ))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename))
                .required(false),
        )
        // E.g. `APP_LEDGER__TABLE=ops.ingestion_stats` overrides `ledger.table`.
        .add_source(environment_source)
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}
