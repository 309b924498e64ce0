//! Configuration management for Chunk Relay

use serde::Deserialize;
use std::env;

use crate::upload::DEFAULT_CHUNK_SIZE;

/// Session store URL that selects the in-process store
pub const MEMORY_DATABASE_URL: &str = "memory";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Minio,
    R2,
    S3,
    B2,
}

impl StorageProvider {
    fn from_name(name: &str) -> Self {
        match name {
            "r2" => StorageProvider::R2,
            "s3" => StorageProvider::S3,
            "b2" => StorageProvider::B2,
            _ => StorageProvider::Minio,
        }
    }

    /// Region used when `S3_REGION` is not set
    pub fn default_region(&self) -> &'static str {
        match self {
            StorageProvider::R2 => "auto",
            _ => "us-east-1",
        }
    }

    /// Whether buckets are addressed by path instead of virtual host
    pub fn path_style(&self) -> bool {
        !matches!(self, StorageProvider::S3)
    }
}

impl StorageConfig {
    /// Configured region, or the provider's default
    pub fn resolved_region(&self) -> String {
        self.region
            .clone()
            .unwrap_or_else(|| self.provider.default_region().to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl DatabaseConfig {
    /// Whether sessions live in process memory instead of SQLite
    pub fn is_memory(&self) -> bool {
        self.url == MEMORY_DATABASE_URL
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Fixed chunk size for new sessions, in bytes
    pub chunk_size: u64,
    /// Timeout for a single request against the source server
    pub source_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                provider: StorageProvider::Minio,
                endpoint: "http://localhost:9000".to_string(),
                bucket: "uploads".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
            },
            database: DatabaseConfig {
                url: "sqlite:./relay.db".to_string(),
            },
            relay: RelayConfig {
                chunk_size: DEFAULT_CHUNK_SIZE,
                source_timeout_secs: 300,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 3000),
            },
            storage: StorageConfig {
                provider: StorageProvider::from_name(
                    env::var("S3_PROVIDER").unwrap_or_else(|_| "minio".to_string()).as_str(),
                ),
                endpoint: env::var("S3_ENDPOINT")?,
                bucket: env::var("S3_BUCKET")?,
                access_key: env::var("S3_ACCESS_KEY")?,
                secret_key: env::var("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./relay.db".to_string()),
            },
            relay: RelayConfig {
                chunk_size: parse_var("RELAY_CHUNK_SIZE", DEFAULT_CHUNK_SIZE).max(1),
                source_timeout_secs: parse_var("SOURCE_TIMEOUT_SECS", 300),
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
