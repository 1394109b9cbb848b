//! Process configuration and component factory
//!
//! Connection parameters are read once at startup into a [`DatabaseConfig`]
//! which is then passed explicitly to the sink constructor.

use crate::sink::{MemorySink, PostgresSink, SampleSink};
use crate::{Error, Result};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Connection settings for the samples database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    /// CA certificate used to verify the server
    pub ssl_root_cert: Option<PathBuf>,
    /// Client private key
    pub ssl_key: Option<PathBuf>,
    /// Client certificate
    pub ssl_cert: Option<PathBuf>,
    /// Pool size; at least the writer's worker count
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 26257,
            database: "defaultdb".to_string(),
            user: "root".to_string(),
            password: None,
            ssl_root_cert: None,
            ssl_key: None,
            ssl_cert: None,
            max_connections: 16,
            acquire_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Read the database configuration from the environment
    ///
    /// Environment variables:
    /// - COCKROACH_USER: database user (default: root)
    /// - COCKROACH_PASS: database password (optional)
    /// - HOST: database host (default: localhost)
    /// - PORT: database port (default: 26257)
    /// - DB: database name (default: defaultdb)
    /// - SSL_ROOT_CERT, SSL_KEY, SSL_CERT: TLS material paths (optional)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| {
                Error::Config(format!("PORT must be a valid port number, got '{raw}': {e}"))
            })?,
            None => defaults.port,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            database: get("DB").unwrap_or(defaults.database),
            user: get("COCKROACH_USER").unwrap_or(defaults.user),
            password: get("COCKROACH_PASS"),
            ssl_root_cert: get("SSL_ROOT_CERT").map(PathBuf::from),
            ssl_key: get("SSL_KEY").map(PathBuf::from),
            ssl_cert: get("SSL_CERT").map(PathBuf::from),
            ..defaults
        })
    }

    /// Whether any TLS material was supplied
    pub fn tls_enabled(&self) -> bool {
        self.ssl_root_cert.is_some() || self.ssl_key.is_some() || self.ssl_cert.is_some()
    }

    /// Connection options for the sqlx Postgres driver
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user);

        if let Some(password) = &self.password {
            options = options.password(password);
        }

        if !self.tls_enabled() {
            return options.ssl_mode(PgSslMode::Prefer);
        }

        options = options.ssl_mode(PgSslMode::Require);
        if let Some(root_cert) = &self.ssl_root_cert {
            options = options.ssl_root_cert(root_cert);
        }
        if let Some(cert) = &self.ssl_cert {
            options = options.ssl_client_cert(cert);
        }
        if let Some(key) = &self.ssl_key {
            options = options.ssl_client_key(key);
        }
        options
    }

    /// Connection URL with the password masked, for logging
    pub fn redacted_url(&self) -> String {
        let credentials = match &self.password {
            Some(_) => format!("{}:***", self.user),
            None => self.user.clone(),
        };
        let mut url = format!(
            "postgresql://{}@{}:{}/{}",
            credentials, self.host, self.port, self.database
        );

        if self.tls_enabled() {
            url.push_str("?sslmode=require");
            for (param, path) in [
                ("sslrootcert", &self.ssl_root_cert),
                ("sslkey", &self.ssl_key),
                ("sslcert", &self.ssl_cert),
            ] {
                if let Some(path) = path {
                    url.push_str(&format!("&{}={}", param, path.display()));
                }
            }
        }
        url
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Cockroach,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Cockroach => "cockroach",
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "cockroach" | "cockroachdb" | "postgres" | "postgresql" => Ok(Self::Cockroach),
            other => Err(format!(
                "unknown storage backend '{}'; expected one of memory, cockroach, postgres",
                other
            )),
        }
    }
}

pub struct ComponentFactory;

impl ComponentFactory {
    /// Create the sample sink and provision its schema
    pub async fn create_sink(
        backend: StorageBackend,
        database: &DatabaseConfig,
    ) -> Result<Arc<dyn SampleSink>> {
        let sink: Arc<dyn SampleSink> = match backend {
            StorageBackend::Memory => {
                info!("Using in-memory sample sink (development mode)");
                Arc::new(MemorySink::new())
            }
            StorageBackend::Cockroach => {
                info!(url = %database.redacted_url(), "Using CockroachDB sample sink");
                Arc::new(PostgresSink::connect(database).await?)
            }
        };

        sink.ensure_schema().await?;
        Ok(sink)
    }
}
