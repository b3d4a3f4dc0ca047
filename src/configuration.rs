use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::ConnectOptions;

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_ref() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!("{} is not supported env", other)),
        }
    }
}

#[derive(Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub application: ApplicationConfig,
    pub mirror: MirrorConfig,
}

#[derive(Deserialize)]
pub struct ApplicationConfig {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    /// Deployment identifier stamped on every row and mirror object.
    pub job_id: String,
    /// Comma-separated allow-list, `*` allows any origin.
    pub cors_origins: String,
}

impl ApplicationConfig {
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Deserialize)]
pub struct DatabaseConfig {
    /// Full connection string, takes precedence over the discrete fields below.
    #[serde(default)]
    pub url: Option<Secret<String>>,
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub pool_size: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_overflow: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub recycle_seconds: u64,
}

impl DatabaseConfig {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> Result<PgConnectOptions, sqlx::Error> {
        let options = match &self.url {
            Some(url) => PgConnectOptions::from_str(url.expose_secret())?,
            None => self.without_db().database(&self.database_name),
        };
        Ok(options.log_statements(tracing::log::LevelFilter::Trace))
    }

    pub fn recycle_after(&self) -> Duration {
        Duration::from_secs(self.recycle_seconds)
    }
}

#[derive(Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bucket: Option<String>,
    pub base_url: String,
    /// Metadata endpoint handing out bearer tokens; requests are anonymous without it.
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl MirrorConfig {
    /// The bucket to mirror into, `None` when mirroring is switched off.
    pub fn bucket(&self) -> Result<Option<&str>, config::ConfigError> {
        if !self.enabled {
            return Ok(None);
        }
        match self.bucket.as_deref().map(str::trim) {
            Some(bucket) if !bucket.is_empty() => Ok(Some(bucket)),
            _ => Err(config::ConfigError::Message(
                "mirror.bucket is required when mirror.enabled is set".into(),
            )),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

pub fn get_config() -> Result<Config, config::ConfigError> {
    let mut configuration = config::Config::default();
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("failed to determine the current directory: {}", e))
    })?;
    let configuration_directory = base_path.join("configuration");
    // read the default config file
    configuration.merge(config::File::from(configuration_directory.join("base")).required(true))?;
    // detect the running environment
    let environment = Environment::try_from(
        std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".to_string()),
    )
    .map_err(config::ConfigError::Message)?;
    // layer on the environment specific values
    configuration.merge(
        config::File::from(configuration_directory.join(environment.as_str())).required(true),
    )?;
    configuration.merge(config::Environment::with_prefix("app").separator("__"))?;
    configuration.try_into()
}
