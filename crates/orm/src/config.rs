//! Database configuration
//!
//! Pool settings for the PostgreSQL backend, deserializable from application
//! config files or read from the environment.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Connection settings for [`PostgresConnection`](crate::backends::PostgresConnection)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: Option<u64>,
    /// Log every executed statement at debug level
    pub log_statements: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/tiny_orm".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600), // 10 minutes
            log_statements: false,
        }
    }
}

impl DatabaseConfig {
    /// Config with the default pool settings for `url`
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    /// Read `DATABASE_URL`, `DB_MAX_CONNECTIONS`, `DB_MIN_CONNECTIONS`,
    /// `DB_ACQUIRE_TIMEOUT` and `DB_IDLE_TIMEOUT`, defaults for the unset ones
    pub fn from_env() -> ModelResult<Self> {
        let defaults = Self::default();
        let config = Self {
            url: std::env::var("DATABASE_URL").map_err(|_| {
                ModelError::Configuration("DATABASE_URL environment variable is not set".to_string())
            })?,
            max_connections: env_number("DB_MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections),
            min_connections: env_number("DB_MIN_CONNECTIONS")?.unwrap_or(defaults.min_connections),
            acquire_timeout_seconds: env_number("DB_ACQUIRE_TIMEOUT")?.unwrap_or(defaults.acquire_timeout_seconds),
            idle_timeout_seconds: env_number("DB_IDLE_TIMEOUT")?.or(defaults.idle_timeout_seconds),
            log_statements: defaults.log_statements,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the url scheme and the pool bounds
    pub fn validate(&self) -> ModelResult<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| ModelError::Configuration(format!("Invalid database URL: {}", e)))?;

        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(ModelError::Configuration(format!(
                "Unsupported database URL scheme '{}', expected postgres",
                parsed.scheme()
            )));
        }

        if self.max_connections == 0 {
            return Err(ModelError::Configuration("max_connections must be at least 1".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ModelError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }

        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> ModelResult<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ModelError::Configuration(format!("{} must be a number, got '{}'", name, value))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DatabaseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_foreign_schemes_and_bad_bounds() {
        let err = DatabaseConfig::new("mysql://localhost/app").validate().unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));

        let config = DatabaseConfig {
            min_connections: 20,
            ..DatabaseConfig::new("postgresql://localhost/app")
        };
        assert!(config.validate().is_err());

        assert!(DatabaseConfig::new("not a url").validate().is_err());
    }

    #[test]
    fn test_deserialize_fills_missing_fields() {
        let config: DatabaseConfig =
            serde_json::from_str(r#"{"url": "postgres://db/app", "max_connections": 4}"#).unwrap();

        assert_eq!(config.url, "postgres://db/app");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.acquire_timeout_seconds, 30);
    }
}
