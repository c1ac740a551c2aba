use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub similarity: SimilarityConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub client_url: Option<String>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Memory,
    Postgres,
}

impl DatabaseBackend {
    /// Whether separate processes opening this backend see the same data.
    pub fn is_shared(&self) -> bool {
        matches!(self, DatabaseBackend::Postgres)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    File,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub path: PathBuf,
    pub redis_url: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityBackend {
    Remote,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    pub backend: SimilarityBackend,
    pub base_url: String,
    pub timeout_secs: u64,
    pub top_n: usize,
}

impl SimilarityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub cookie_name: String,
    /// Accounts registered with these emails start as administrators.
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    Log,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub backend: MailBackend,
    pub endpoint: String,
    pub sender: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                workers: num_cpus::get(),
                client_url: None,
            },
            database: DatabaseConfig {
                backend: DatabaseBackend::Memory,
                url: "postgresql://localhost:5432/scholaris".to_string(),
                max_connections: 10,
            },
            cache: CacheConfig {
                backend: CacheBackend::File,
                path: PathBuf::from("config/nlp_config.json"),
                redis_url: "redis://localhost:6379".to_string(),
                key_prefix: "scholaris:matrix".to_string(),
            },
            similarity: SimilarityConfig {
                backend: SimilarityBackend::Remote,
                base_url: "http://localhost:6000".to_string(),
                timeout_secs: 30,
                top_n: 3,
            },
            auth: AuthConfig {
                jwt_secret: "dev-mode-secret-not-for-production-use-123456".to_string(),
                token_ttl_secs: 2 * 60 * 60,
                cookie_name: "token".to_string(),
                admin_emails: Vec::new(),
            },
            mail: MailConfig {
                backend: MailBackend::Log,
                endpoint: "http://localhost:8025/send".to_string(),
                sender: "no-reply@scholaris.local".to_string(),
                max_retries: 3,
                retry_delay_ms: 500,
                queue_capacity: 1000,
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SCHOLARIS").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Loads `path` when it exists, otherwise falls back to defaults plus environment.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            tracing::info!("Loading configuration from {}", path);
        } else {
            tracing::info!("Config file {} not found, using defaults", path);
        }
        Self::from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_lifetime_is_two_hours() {
        let config = Config::default();
        assert_eq!(config.auth.token_ttl_secs, 7200);
        assert_eq!(config.auth.cookie_name, "token");
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::default();
        let addr = config.server.socket_addr().unwrap();
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn test_from_missing_file_uses_defaults() {
        let config = Config::from_file("does/not/exist.toml").unwrap();
        assert_eq!(config.similarity.top_n, 3);
        assert_eq!(config.database.backend, DatabaseBackend::Memory);
        assert!(config.auth.admin_emails.is_empty());
    }

    #[test]
    fn test_only_postgres_is_shared_between_processes() {
        assert!(!DatabaseBackend::Memory.is_shared());
        assert!(DatabaseBackend::Postgres.is_shared());
    }

    #[test]
    fn test_shipped_config_file_parses() {
        let config = Config::from_file("config/default.toml").unwrap();
        assert_eq!(config.server.workers, 4);
        assert_eq!(config.auth.admin_emails, vec!["admin@scholaris.local".to_string()]);
    }
}
