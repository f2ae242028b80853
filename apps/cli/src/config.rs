//! Layered application configuration
//!
//! Values are resolved in this order, later sources winning:
//! 1. defaults of the selected [`Environment`] profile
//! 2. an optional configuration file (TOML, JSON or YAML by extension)
//! 3. `DSTU2_*` environment variables, `__` separating nested keys
//!    (`DSTU2_LOG__LEVEL=trace`)
//!
//! `.env` files are loaded into the process environment by the binary before
//! any of this runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use dstu2_store::Dialect;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "DSTU2";

/// Variable selecting the profile when `--env` is not given
pub const ENVIRONMENT_VAR: &str = "DSTU2_ENVIRONMENT";

/// Deployment profile selecting the configuration defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Debug,
    Testing,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Debug => "debug",
            Environment::Testing => "testing",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" | "development" => Some(Environment::Debug),
            "testing" | "test" => Some(Environment::Testing),
            "staging" => Some(Environment::Staging),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }
}

// `DSTU2_ENVIRONMENT` reaches the config builder as the `environment` key, so
// deserialization accepts the same aliases as the variable itself.
impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Environment::parse(&value).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown environment profile '{value}'"))
        })
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level applied to this workspace's targets unless `RUST_LOG` is set
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    /// Database the generated migrations target; selects the SQL dialect
    pub database_url: String,
    pub log: LogConfig,
    /// Catalog document merged over the builtin catalog
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    /// Treat validation warnings as errors
    pub strict: bool,
}

impl AppConfig {
    /// Defaults of one profile
    pub fn for_environment(environment: Environment) -> Self {
        let (database_url, level, json, strict) = match environment {
            Environment::Debug => ("postgres://localhost/dstu2", "debug", false, false),
            Environment::Testing => ("sqlite::memory:", "warn", false, true),
            Environment::Staging => ("postgres://localhost/dstu2", "info", true, false),
            Environment::Production => ("postgres://localhost/dstu2", "info", true, false),
        };
        Self {
            environment,
            database_url: database_url.to_string(),
            log: LogConfig {
                level: level.to_string(),
                json,
            },
            catalog_path: None,
            strict,
        }
    }

    /// Load configuration from the defaults, `file` and the process environment
    pub fn load(environment: Option<Environment>, file: Option<&Path>) -> Result<Self> {
        let environment = match environment {
            Some(environment) => environment,
            None => environment_from_var(std::env::var(ENVIRONMENT_VAR).ok())?,
        };
        Self::load_with(environment, file, env_source())
    }

    /// Load with an explicit environment variable source
    pub fn load_with(
        environment: Environment,
        file: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self> {
        let defaults = Self::for_environment(environment);

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&defaults).context("encoding defaults")?);

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }

        builder = builder.add_source(env);

        let mut config: AppConfig = builder
            .build()
            .context("reading configuration sources")?
            .try_deserialize()
            .context("invalid configuration")?;
        // the profile picks the defaults, it is not itself overridable
        config.environment = environment;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.dialect()?;
        if self.log.level.trim().is_empty() {
            anyhow::bail!("log.level must not be empty");
        }
        Ok(())
    }

    /// SQL dialect derived from the database URL scheme
    pub fn dialect(&self) -> Result<Dialect> {
        Dialect::from_url(&self.database_url)
            .with_context(|| format!("database_url '{}'", self.database_url))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

fn environment_from_var(value: Option<String>) -> Result<Environment> {
    match value {
        None => Ok(Environment::default()),
        Some(value) => Environment::parse(&value)
            .with_context(|| format!("{ENVIRONMENT_VAR} has unknown profile '{value}'")),
    }
}

/// `DSTU2_*` variables of the process environment
pub fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
