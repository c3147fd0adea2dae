use anyhow::{Context, Result, anyhow};
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Logging
    pub log_dir: String,
    pub log_level: tracing::Level,

    pub run_migrations: bool,
    pub bootstrap_admin: Option<AdminCredentials>,
}

#[derive(Clone, Debug)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{key} must be set"));

        let bootstrap_admin = match (var("ADMIN_USERNAME"), var("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) if !username.trim().is_empty() => {
                Some(AdminCredentials {
                    username: username.trim().to_string(),
                    password,
                })
            }
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            server_addr: var("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            // default 8 hours, one working day
            access_token_ttl: parse_or(&var, "ACCESS_TOKEN_TTL", 28_800)?,

            rate_login_per_min: parse_or(&var, "RATE_LOGIN_PER_MIN", 60)?,
            rate_protected_per_min: parse_or(&var, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: var("API_PREFIX").unwrap_or_else(|| "/api".to_string()),

            log_dir: var("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level: parse_or(&var, "LOG_LEVEL", tracing::Level::INFO)?,

            run_migrations: parse_or(&var, "RUN_MIGRATIONS", true)?,
            bootstrap_admin,
        })
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = config_from(&[
            ("DATABASE_URL", "mysql://root@localhost/attendance"),
            ("JWT_SECRET", "secret"),
        ])
        .unwrap();

        assert_eq!(config.server_addr, "127.0.0.1:8080");
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.access_token_ttl, 28_800);
        assert_eq!(config.log_level, tracing::Level::INFO);
        assert!(config.run_migrations);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = config_from(&[("JWT_SECRET", "secret")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn malformed_number_is_an_error() {
        let err = config_from(&[
            ("DATABASE_URL", "mysql://localhost/db"),
            ("JWT_SECRET", "secret"),
            ("RATE_LOGIN_PER_MIN", "lots"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("RATE_LOGIN_PER_MIN"));
    }

    #[test]
    fn reads_overrides_and_admin() {
        let config = config_from(&[
            ("DATABASE_URL", "mysql://localhost/db"),
            ("JWT_SECRET", "secret"),
            ("LOG_LEVEL", "debug"),
            ("RUN_MIGRATIONS", "false"),
            ("ADMIN_USERNAME", " admin "),
            ("ADMIN_PASSWORD", "changeme"),
        ])
        .unwrap();

        assert_eq!(config.log_level, tracing::Level::DEBUG);
        assert!(!config.run_migrations);
        let admin = config.bootstrap_admin.unwrap();
        assert_eq!(admin.username, "admin");
        assert_eq!(admin.password, "changeme");
    }
}
