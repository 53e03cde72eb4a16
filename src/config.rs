use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use editer_core::{DEFAULT_MAX_CONTENT_LENGTH, DEFAULT_MAX_CREATE_ATTEMPTS};

/// Default filter when neither `RUST_LOG` nor `log_level` is set.
pub const DEFAULT_LOG_LEVEL: &str = "editer=info,editer_core=info,tower_http=info";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Path to the SQLite database
    pub database_path: PathBuf,
    /// Logical database name, reported by the health check
    pub database_name: String,
    /// Seed for share-id generation; random when unset
    pub hrid_seed: Option<String>,
    /// Largest document accepted from clients, in bytes
    pub max_document_size: usize,
    /// Largest document the store will persist, in bytes
    pub max_content_length: usize,
    /// Origins allowed by CORS; empty means any
    pub allowed_origins: Vec<String>,
    /// Seconds to wait for a database connection
    pub connect_timeout_secs: u64,
    /// Seconds a single database operation may take
    pub operation_timeout_secs: u64,
    /// Share-ids tried per create before giving up
    pub max_create_attempts: usize,
    /// tracing filter directive
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("editer")
                .join("editer.db"),
            database_name: "editer".to_string(),
            hrid_seed: None,
            max_document_size: 1024 * 1024,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            allowed_origins: [
                "http://localhost:3000",
                "http://localhost:5173",
                "http://127.0.0.1:3000",
                "http://127.0.0.1:5173",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            connect_timeout_secs: 5,
            operation_timeout_secs: 5,
            max_create_attempts: DEFAULT_MAX_CREATE_ATTEMPTS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`], reading variables through `env`.
    pub fn load_with<F>(config_path: Option<PathBuf>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        if let Some(host) = env("EDITER_HOST") {
            config.host = host;
        }
        if let Some(port) = env("EDITER_PORT") {
            config.port = parse_var("EDITER_PORT", &port)?;
        }
        if let Some(db_path) = env("EDITER_DATABASE_PATH") {
            config.database_path = PathBuf::from(db_path);
        }
        if let Some(name) = env("EDITER_DATABASE_NAME") {
            config.database_name = name;
        }
        if let Some(seed) = env("EDITER_HRID_SEED") {
            config.hrid_seed = Some(seed);
        }
        if let Some(size) = env("EDITER_MAX_DOCUMENT_SIZE") {
            config.max_document_size = parse_var("EDITER_MAX_DOCUMENT_SIZE", &size)?;
        }
        if let Some(len) = env("EDITER_MAX_CONTENT_LENGTH") {
            config.max_content_length = parse_var("EDITER_MAX_CONTENT_LENGTH", &len)?;
        }
        if let Some(origins) = env("EDITER_ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(secs) = env("EDITER_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout_secs = parse_var("EDITER_CONNECT_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = env("EDITER_OPERATION_TIMEOUT_SECS") {
            config.operation_timeout_secs = parse_var("EDITER_OPERATION_TIMEOUT_SECS", &secs)?;
        }
        if let Some(attempts) = env("EDITER_MAX_CREATE_ATTEMPTS") {
            config.max_create_attempts = parse_var("EDITER_MAX_CREATE_ATTEMPTS", &attempts)?;
        }
        if let Some(level) = env("EDITER_LOG_LEVEL") {
            config.log_level = level;
        }

        // An empty seed would fail generator setup; treat it as unset.
        if config.hrid_seed.as_deref() == Some("") {
            config.hrid_seed = None;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects zero sizes and timeouts, which would disable a bound or
    /// refuse every document.
    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_document_size", self.max_document_size as u64),
            ("max_content_length", self.max_content_length as u64),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("operation_timeout_secs", self.operation_timeout_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue(key, value.to_string()));
            }
        }
        Ok(())
    }

    /// Default config file path: ~/.config/editer/config.yaml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("editer")
            .join("config.yaml")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

fn parse_var<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key, value.to_string()))
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                )
            }
            ConfigError::InvalidValue(key, value) => {
                write!(f, "Invalid value for {}: '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database_path.to_string_lossy().contains("editer.db"));
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_document_size, 1024 * 1024);
        assert_eq!(config.max_content_length, 10 * 1024 * 1024);
        assert_eq!(config.max_create_attempts, 2);
        assert!(config.hrid_seed.is_none());
        assert_eq!(config.allowed_origins.len(), 4);
    }

    #[test]
    fn test_load_no_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load_with(Some(config_path), no_env).unwrap();
        assert_eq!(config.database_name, "editer");
        assert_eq!(config.operation_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /custom/path/db.sqlite").unwrap();
        writeln!(file, "hrid_seed: pinned").unwrap();
        writeln!(file, "port: 9001").unwrap();
        writeln!(file, "allowed_origins: [\"https://example.com\"]").unwrap();

        let config = Config::load_with(Some(config_path), no_env).unwrap();
        assert_eq!(
            config.database_path,
            PathBuf::from("/custom/path/db.sqlite")
        );
        assert_eq!(config.hrid_seed.as_deref(), Some("pinned"));
        assert_eq!(config.port, 9001);
        assert_eq!(config.allowed_origins, vec!["https://example.com"]);
        // Unset fields keep their defaults
        assert_eq!(config.max_create_attempts, 2);
    }

    #[test]
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "hrid_seed: fromfile").unwrap();
        writeln!(file, "max_document_size: 10").unwrap();

        let env = env_from(&[
            ("EDITER_HRID_SEED", "fromenv"),
            ("EDITER_MAX_DOCUMENT_SIZE", "2048"),
            ("EDITER_ALLOWED_ORIGINS", "http://a.test, http://b.test,"),
        ]);
        let config = Config::load_with(Some(config_path), env).unwrap();
        assert_eq!(config.hrid_seed.as_deref(), Some("fromenv"));
        assert_eq!(config.max_document_size, 2048);
        assert_eq!(config.allowed_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_empty_seed_is_unset() {
        let temp_dir = tempdir().unwrap();
        let env = env_from(&[("EDITER_HRID_SEED", "")]);
        let config = Config::load_with(Some(temp_dir.path().join("none.yaml")), env).unwrap();
        assert!(config.hrid_seed.is_none());
    }

    #[test]
    fn test_invalid_number_error() {
        let temp_dir = tempdir().unwrap();
        let env = env_from(&[("EDITER_PORT", "eighty")]);
        let err = Config::load_with(Some(temp_dir.path().join("none.yaml")), env).unwrap_err();
        assert!(err.to_string().contains("EDITER_PORT"));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let temp_dir = tempdir().unwrap();
        for key in [
            "EDITER_OPERATION_TIMEOUT_SECS",
            "EDITER_CONNECT_TIMEOUT_SECS",
            "EDITER_MAX_DOCUMENT_SIZE",
            "EDITER_MAX_CONTENT_LENGTH",
        ] {
            let env = env_from(&[(key, "0")]);
            let err = Config::load_with(Some(temp_dir.path().join("none.yaml")), env).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(_, ref v) if v == "0"), "{}", key);
        }
    }

    #[test]
    fn test_zero_timeout_in_file_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "operation_timeout_secs: 0").unwrap();

        let err = Config::load_with(Some(config_path), no_env).unwrap_err();
        assert!(err.to_string().contains("operation_timeout_secs"));
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load_with(Some(config_path), no_env);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
