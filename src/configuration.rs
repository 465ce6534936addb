use crate::connection::BackoffPolicy;
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_USER: &str = "subuser";
pub const DEFAULT_DB_PASSWORD: &str = "subpass";
pub const DEFAULT_DB_NAME: &str = "subscribers";

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub connection_retry: RetrySettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let ssl_mode = if self.require_ssl {
            MySqlSslMode::Required
        } else {
            // Try an encrypted connection, fallback to unencrypted if it fails
            MySqlSslMode::Preferred
        };
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(self.password.expose_secret())
            .database(&self.database_name)
            .ssl_mode(ssl_mode)
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct RetrySettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_attempts: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub base_delay_millis: u64,
}

impl RetrySettings {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_millis),
        )
    }
}

/// The possible runtime environment for our application.
#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. \
                Use either `local` or `production`.",
                other
            )),
        }
    }
}

/// Reads settings from defaults, `configuration/*.yaml`, `APP_*` variables
/// and finally the `DB_HOST`/`DB_USER`/`DB_PASSWORD`/`DB_NAME` variables.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;
    get_configuration_from(&base_path.join("configuration"), std::env::vars().collect())
}

/// Same as [`get_configuration`], reading the YAML files from
/// `configuration_directory` and the variables from `env` instead of the
/// process environment.
pub fn get_configuration_from(
    configuration_directory: &Path,
    env: HashMap<String, String>,
) -> Result<Settings, config::ConfigError> {
    // Detect the running environment.
    // Default to `local` if unspecified.
    let environment: Environment = env
        .get("APP_ENVIRONMENT")
        .cloned()
        .unwrap_or_else(|| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .set_default("database.host", DEFAULT_DB_HOST)?
        .set_default("database.port", 3306)?
        .set_default("database.username", DEFAULT_DB_USER)?
        .set_default("database.password", DEFAULT_DB_PASSWORD)?
        .set_default("database.database_name", DEFAULT_DB_NAME)?
        .set_default("database.require_ssl", false)?
        .set_default("connection_retry.max_attempts", 5)?
        .set_default("connection_retry.base_delay_millis", 1000)?
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(false))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename)).required(false),
        )
        // Add in settings from environment variables (with a prefix of APP and '__' as separator)
        // E.g. `APP_DATABASE__PORT=3307` would set `Settings.database.port`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .source(Some(env.clone())),
        )
        .set_override_option("database.host", env.get("DB_HOST").cloned())?
        .set_override_option("database.username", env.get("DB_USER").cloned())?
        .set_override_option("database.password", env.get("DB_PASSWORD").cloned())?
        .set_override_option("database.database_name", env.get("DB_NAME").cloned())?
        .build()?;

    settings.try_deserialize::<Settings>()
}
