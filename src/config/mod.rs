//! Configuration management
//!
//! This module handles loading and parsing configuration for QManager.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// File storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Token authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
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
    /// CORS allowed origin (the admin panel)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
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
    "data/qmanager.db".to_string()
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

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_max_entries() -> u64 {
    10_000
}

/// File storage configuration (the "public" disk)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of stored files
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Maximum document size in bytes (default: 10MB)
    #[serde(default = "default_max_document_size")]
    pub max_document_size: u64,
    /// Maximum image size in bytes (default: 2MB)
    #[serde(default = "default_max_image_size")]
    pub max_image_size: u64,
    /// Allowed document extensions
    #[serde(default = "default_document_extensions")]
    pub document_extensions: Vec<String>,
    /// Allowed image extensions
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_document_size: default_max_document_size(),
            max_image_size: default_max_image_size(),
            document_extensions: default_document_extensions(),
            image_extensions: default_image_extensions(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("storage/public")
}

fn default_max_document_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_max_image_size() -> u64 {
    2 * 1024 * 1024 // 2MB
}

fn default_document_extensions() -> Vec<String> {
    ["pdf", "doc", "docx", "txt", "rtf"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_image_extensions() -> Vec<String> {
    ["jpeg", "png", "jpg", "gif"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl StorageConfig {
    /// Check if a file name carries an allowed document extension
    pub fn is_document_extension_allowed(&self, file_name: &str) -> bool {
        extension_in(file_name, &self.document_extensions)
    }

    /// Check if a file name carries an allowed image extension
    pub fn is_image_extension_allowed(&self, file_name: &str) -> bool {
        extension_in(file_name, &self.image_extensions)
    }
}

fn extension_in(file_name: &str, allowed: &[String]) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            allowed.iter().any(|a| *a == ext)
        })
        .unwrap_or(false)
}

/// Token authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of issued access tokens in days (0 = never expire)
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_days: default_token_ttl_days(),
        }
    }
}

fn default_token_ttl_days() -> i64 {
    30
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
    ParseError {
        path: String,
        message: String,
    },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
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

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - QMANAGER_SERVER_HOST
    /// - QMANAGER_SERVER_PORT
    /// - QMANAGER_SERVER_CORS_ORIGIN
    /// - QMANAGER_DATABASE_DRIVER
    /// - QMANAGER_DATABASE_URL
    /// - QMANAGER_CACHE_TTL_SECONDS
    /// - QMANAGER_STORAGE_PATH
    /// - QMANAGER_AUTH_TOKEN_TTL_DAYS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("QMANAGER_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("QMANAGER_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("QMANAGER_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("QMANAGER_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("QMANAGER_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("QMANAGER_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(path) = std::env::var("QMANAGER_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        if let Ok(days) = std::env::var("QMANAGER_AUTH_TOKEN_TTL_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                if days >= 0 {
                    self.auth.token_ttl_days = days;
                }
            }
        }
    }
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

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
