//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Directory holding photo bytes
    pub photo_dir: String,
    /// Static client build to serve at `/`, if any
    pub frontend_dir: Option<String>,
    /// Session expiration in hours
    pub session_expiry_hours: i64,
    /// Maximum photo size in bytes
    pub max_photo_size: usize,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Environment (development/production)
    pub environment: Environment,
    /// Trusted proxy IP prefixes (e.g., ["10.0.0.", "172.16."])
    /// Only trust X-Forwarded-For headers from these peers
    pub trusted_proxies: Vec<String>,
    /// Seconds between maintenance passes (expired sessions, stale rate limit rows)
    pub maintenance_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("ENVIRONMENT")
            .unwrap_or_else(|| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        // DATABASE_URL, or the individual DATABASE_* components
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => {
                let host = lookup("DATABASE_HOST");
                let user = lookup("DATABASE_USER");
                let password = lookup("DATABASE_PASSWORD");
                let db = lookup("DATABASE_DB");
                let port = lookup("DATABASE_PORT").unwrap_or_else(|| "5432".to_string());
                match (host, user, password, db) {
                    (Some(host), Some(user), Some(password), Some(db)) => {
                        format!("postgres://{}:{}@{}:{}/{}", user, password, host, port, db)
                    }
                    _ => {
                        return Err(ConfigError::Missing(
                            "DATABASE_URL, or DATABASE_HOST + DATABASE_USER + DATABASE_PASSWORD + DATABASE_DB is required".to_string(),
                        ))
                    }
                }
            }
        };

        let port = match lookup("PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT must be a number, got '{}'", p)))?,
            None => 8080,
        };

        let session_expiry_hours = lookup("SESSION_EXPIRY_HOURS")
            .and_then(|h| h.parse().ok())
            .unwrap_or(8);
        if session_expiry_hours <= 0 {
            return Err(ConfigError::Invalid(
                "SESSION_EXPIRY_HOURS must be positive".to_string(),
            ));
        }

        Ok(Config {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url,
            photo_dir: lookup("PHOTO_DIR")
                .or_else(|| lookup("DATA_PATH").map(|p| format!("{}/photos", p.trim_end_matches('/'))))
                .unwrap_or_else(|| "/app/photos".to_string()),
            frontend_dir: lookup("FRONTEND_DIR").filter(|d| !d.trim().is_empty()),
            session_expiry_hours,
            max_photo_size: lookup("MAX_PHOTO_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(10 * 1024 * 1024), // 10MB default
            cors_origins: lookup("CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or_else(|| vec!["http://localhost:8080".to_string()]),
            environment,
            // Examples: "10.0.0.", "172.16.", "127.0.0.1"
            trusted_proxies: lookup("TRUSTED_PROXIES")
                .map(|s| {
                    s.split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            maintenance_interval_secs: lookup("MAINTENANCE_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(900),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/civic")]).unwrap();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.photo_dir, "/app/photos");
        assert_eq!(config.max_photo_size, 10 * 1024 * 1024);
        assert_eq!(config.session_expiry_hours, 8);
        assert!(config.frontend_dir.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_database_url_from_components() {
        let config = load(&[
            ("DATABASE_HOST", "db"),
            ("DATABASE_USER", "civic"),
            ("DATABASE_PASSWORD", "secret"),
            ("DATABASE_DB", "civic_lens"),
        ])
        .unwrap();
        assert_eq!(config.database_url, "postgres://civic:secret@db:5432/civic_lens");
    }

    #[test]
    fn test_missing_database() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_invalid_port() {
        assert!(matches!(
            load(&[("DATABASE_URL", "postgres://x"), ("PORT", "eighty")]),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_production_and_lists() {
        let config = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("ENVIRONMENT", "PROD"),
            ("DATA_PATH", "/srv/data/"),
            ("TRUSTED_PROXIES", "10.0.0., ,172.16."),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
        ])
        .unwrap();
        assert!(config.is_production());
        assert_eq!(config.photo_dir, "/srv/data/photos");
        assert_eq!(config.trusted_proxies, vec!["10.0.0.", "172.16."]);
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
    }
}
