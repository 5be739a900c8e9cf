//! Configuration management
//!
//! Configuration is loaded from `config.yml` and then overridden by
//! `FOOTBALL_NEWS_*` environment variables. Every section and field has a
//! default, so a missing or empty file yields a runnable configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "FOOTBALL_NEWS_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Site-wide presentation settings
    #[serde(default)]
    pub site: SiteConfig,
    /// Template override configuration
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL or SQLite file path
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/football_news.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// In-process cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    1_000
}

/// Site presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site name shown in page titles and headers
    #[serde(default = "default_site_name")]
    pub name: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
        }
    }
}

fn default_site_name() -> String {
    "Football News".to_string()
}

/// Template configuration
///
/// Templates are embedded in the binary. When `path` points at a directory,
/// any `.html` file found there replaces the embedded template of the same name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Optional override directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in days
    #[serde(default = "default_expiration_days")]
    pub expiration_days: i64,
    /// Whether to mark cookies as `Secure`
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_expiration_days(),
            secure_cookie: false,
        }
    }
}

fn default_expiration_days() -> i64 {
    14
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration. A file with
    /// invalid YAML is an error carrying the line and column of the problem.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Recognised variables:
    /// - FOOTBALL_NEWS_SERVER_HOST
    /// - FOOTBALL_NEWS_SERVER_PORT
    /// - FOOTBALL_NEWS_DATABASE_DRIVER
    /// - FOOTBALL_NEWS_DATABASE_URL
    /// - FOOTBALL_NEWS_CACHE_TTL_SECONDS
    /// - FOOTBALL_NEWS_SITE_NAME
    /// - FOOTBALL_NEWS_TEMPLATES_PATH
    /// - FOOTBALL_NEWS_SESSION_EXPIRATION_DAYS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(host) = env_var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_var("SERVER_PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }

        if let Some(driver) = env_var("DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                other => tracing::warn!("Ignoring unknown database driver '{}'", other),
            }
        }
        if let Some(url) = env_var("DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(ttl) = env_var("CACHE_TTL_SECONDS").and_then(|t| t.parse::<u64>().ok()) {
            self.cache.ttl_seconds = ttl;
        }

        if let Some(name) = env_var("SITE_NAME") {
            self.site.name = name;
        }

        if let Some(path) = env_var("TEMPLATES_PATH") {
            self.templates.path = Some(PathBuf::from(path));
        }

        if let Some(days) = env_var("SESSION_EXPIRATION_DAYS").and_then(|d| d.parse::<i64>().ok()) {
            self.session.expiration_days = days;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.expiration_days <= 0 {
            return Err(ConfigError::ValidationError(
                "session.expiration_days must be positive".to_string(),
            ));
        }
        if self.site.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "site.name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, suffix)).ok()
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Config tests touching the process environment serialise on this.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
