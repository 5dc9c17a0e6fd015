use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::error::AppError;

/// How bearer tokens are verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwtKeySource {
    /// HS256 shared secret
    Secret(String),
    /// RS256 public key (PEM)
    RsaPublicKey(String),
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl HistoryConfig {
    /// Resolve a requested page size against the configured default and cap
    pub fn clamp_limit(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(limit) if limit > 0 => limit.min(self.max_limit),
            _ => self.default_limit,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: usize,
    pub port: u16,
    pub jwt: JwtKeySource,
    pub history: HistoryConfig,
    pub ws: WsConfig,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL missing".into()))?;
        let db_max_connections = parse_var("DB_MAX_CONNECTIONS", 16usize);
        let port = parse_var("PORT", 3000u16);

        // RS256 wins when both key sources are configured
        let jwt = match (
            env::var("JWT_PUBLIC_KEY_PEM").ok().filter(|v| !v.trim().is_empty()),
            env::var("JWT_SECRET").ok().filter(|v| !v.trim().is_empty()),
        ) {
            (Some(pem), _) => JwtKeySource::RsaPublicKey(pem),
            (None, Some(secret)) => JwtKeySource::Secret(secret),
            (None, None) => {
                return Err(AppError::Config(
                    "JWT_PUBLIC_KEY_PEM or JWT_SECRET must be set".into(),
                ))
            }
        };

        let defaults = HistoryConfig::default();
        let history = HistoryConfig {
            default_limit: parse_var("HISTORY_DEFAULT_LIMIT", defaults.default_limit),
            max_limit: parse_var("HISTORY_MAX_LIMIT", defaults.max_limit),
        };
        if history.default_limit <= 0 || history.max_limit < history.default_limit {
            return Err(AppError::Config(
                "HISTORY_DEFAULT_LIMIT must be positive and not exceed HISTORY_MAX_LIMIT".into(),
            ));
        }

        let ws = WsConfig {
            heartbeat_interval: Duration::from_secs(parse_var("WS_HEARTBEAT_INTERVAL_SECS", 5u64)),
            client_timeout: Duration::from_secs(parse_var("WS_CLIENT_TIMEOUT_SECS", 30u64)),
        };

        Ok(Self {
            database_url,
            db_max_connections,
            port,
            jwt,
            history,
            ws,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "DATABASE_URL",
            "PORT",
            "JWT_SECRET",
            "JWT_PUBLIC_KEY_PEM",
            "HISTORY_DEFAULT_LIMIT",
            "HISTORY_MAX_LIMIT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_requires_database_url() {
        clear_env();
        env::set_var("JWT_SECRET", "secret");
        assert!(matches!(Config::from_env(), Err(AppError::Config(_))));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_requires_a_jwt_key() {
        clear_env();
        env::set_var("DATABASE_URL", "postgres://localhost/chat");
        assert!(matches!(Config::from_env(), Err(AppError::Config(_))));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_prefers_rsa_key() {
        clear_env();
        env::set_var("DATABASE_URL", "postgres://localhost/chat");
        env::set_var("JWT_SECRET", "secret");
        env::set_var("JWT_PUBLIC_KEY_PEM", "-----BEGIN PUBLIC KEY-----");
        env::set_var("PORT", "8088");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8088);
        assert!(matches!(config.jwt, JwtKeySource::RsaPublicKey(_)));
        assert_eq!(config.history.default_limit, 50);
        clear_env();
    }

    #[test]
    fn test_clamp_limit() {
        let history = HistoryConfig::default();
        assert_eq!(history.clamp_limit(None), 50);
        assert_eq!(history.clamp_limit(Some(0)), 50);
        assert_eq!(history.clamp_limit(Some(-3)), 50);
        assert_eq!(history.clamp_limit(Some(20)), 20);
        assert_eq!(history.clamp_limit(Some(10_000)), 200);
    }
}
