use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rest: RestConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub engine: EngineConfigValues,
    pub shared_cache: SharedCacheConfig,
    pub log: LogConfig,
    pub tracing: TracingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfigValues {
    pub max_inheritance_depth: usize,
    pub serialize_per_user: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SharedCacheConfig {
    pub max_capacity: u64,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub enabled: bool,
    pub otlp_endpoint: String,
    pub service_name: String,
    pub sample_rate: f64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/grantwell".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for EngineConfigValues {
    fn default() -> Self {
        let defaults = grantwell_core::engine::EngineConfig::default();
        Self {
            max_inheritance_depth: defaults.max_inheritance_depth,
            serialize_per_user: defaults.serialize_per_user,
        }
    }
}

impl Default for SharedCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
            ttl_secs: 3600,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            service_name: "grantwell".to_string(),
            sample_rate: 1.0,
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GRANTWELL_REST_HOST") {
            self.rest.host = v;
        }
        if let Ok(v) = std::env::var("GRANTWELL_REST_PORT")
            && let Ok(port) = v.parse()
        {
            self.rest.port = port;
        }
        if let Ok(v) = std::env::var("GRANTWELL_STORAGE_BACKEND") {
            match v.as_str() {
                "memory" => self.storage.backend = StorageBackend::Memory,
                "postgres" => self.storage.backend = StorageBackend::Postgres,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var("GRANTWELL_DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = std::env::var("GRANTWELL_DATABASE_MAX_CONNECTIONS")
            && let Ok(n) = v.parse()
        {
            self.database.max_connections = n;
        }
        if let Ok(v) = std::env::var("GRANTWELL_ENGINE_MAX_INHERITANCE_DEPTH")
            && let Ok(n) = v.parse()
        {
            self.engine.max_inheritance_depth = n;
        }
        if let Ok(v) = std::env::var("GRANTWELL_ENGINE_SERIALIZE_PER_USER")
            && let Ok(b) = v.parse()
        {
            self.engine.serialize_per_user = b;
        }
        if let Ok(v) = std::env::var("GRANTWELL_SHARED_CACHE_MAX_CAPACITY")
            && let Ok(n) = v.parse()
        {
            self.shared_cache.max_capacity = n;
        }
        if let Ok(v) = std::env::var("GRANTWELL_SHARED_CACHE_TTL_SECS")
            && let Ok(n) = v.parse()
        {
            self.shared_cache.ttl_secs = n;
        }
        if let Ok(v) = std::env::var("GRANTWELL_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = std::env::var("GRANTWELL_LOG_FORMAT") {
            match v.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var("GRANTWELL_TRACING_ENABLED")
            && let Ok(b) = v.parse()
        {
            self.tracing.enabled = b;
        }
        if let Ok(v) = std::env::var("GRANTWELL_TRACING_OTLP_ENDPOINT") {
            self.tracing.otlp_endpoint = v;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rest.port == 0 {
            return Err(ConfigError::Validation(
                "rest.port must be non-zero".to_string(),
            ));
        }
        if self.engine.max_inheritance_depth == 0 {
            return Err(ConfigError::Validation(
                "engine.max_inheritance_depth must be non-zero".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be non-zero".to_string(),
            ));
        }
        if self.shared_cache.max_capacity == 0 {
            return Err(ConfigError::Validation(
                "shared_cache.max_capacity must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tracing.sample_rate) {
            return Err(ConfigError::Validation(
                "tracing.sample_rate must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_engine_config(&self) -> grantwell_core::engine::EngineConfig {
        grantwell_core::engine::EngineConfig {
            max_inheritance_depth: self.engine.max_inheritance_depth,
            serialize_per_user: self.engine.serialize_per_user,
        }
    }

    pub fn shared_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.shared_cache.ttl_secs)
    }

    pub fn rest_addr(&self) -> String {
        format!("{}:{}", self.rest.host, self.rest.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}
