use std::env;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context};

use crate::store::StoreBackend;

pub type MutableConfig = Arc<RwLock<Config>>;

const DEV_JWT_SECRET: &str = "showcase-dev-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub store_backend: StoreBackend,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub cors_allow_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: String::new(),
            store_backend: StoreBackend::Memory,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_audience: "authenticated".to_string(),
            cors_allow_origin: "*".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let store_backend = StoreBackend::from_str(&get("STORE_BACKEND", "postgres"))
            .map_err(|e| anyhow!(e))?;

        let database_url = lookup("DATABASE_URL").unwrap_or_default();
        if store_backend == StoreBackend::Postgres && database_url.is_empty() {
            return Err(anyhow!("DATABASE_URL is required for the postgres store"));
        }

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ if store_backend == StoreBackend::Memory => DEV_JWT_SECRET.to_string(),
            _ => return Err(anyhow!("JWT_SECRET is required for the postgres store")),
        };

        Ok(Config {
            host: get("HOST", "0.0.0.0"),
            port: get("PORT", "8080")
                .parse()
                .context("PORT must be a valid port number")?,
            database_url,
            store_backend,
            jwt_secret,
            jwt_audience: get("JWT_AUDIENCE", "authenticated"),
            cors_allow_origin: get("CORS_ALLOW_ORIGIN", "*"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_memory_backend_defaults() {
        let config = Config::from_lookup(lookup(&[("STORE_BACKEND", "memory")])).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.jwt_audience, "authenticated");
        assert_eq!(config.cors_allow_origin, "*");
    }

    #[test]
    fn test_postgres_backend_requires_url_and_secret() {
        assert!(Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/showcase")])).is_err());

        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/showcase"),
            ("JWT_SECRET", "s3cret"),
            ("PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("STORE_BACKEND", "mongo")])).is_err());
        assert!(Config::from_lookup(lookup(&[("STORE_BACKEND", "memory"), ("PORT", "eighty")])).is_err());
    }
}
