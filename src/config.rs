use std::{fmt, str::FromStr, time::Duration};

use anyhow::Context;
use serde::Deserialize;

#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl_minutes", &self.ttl_minutes)
            .field("refresh_ttl_minutes", &self.refresh_ttl_minutes)
            .finish()
    }
}

/// Argon2id work factor.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // OWASP minimum for argon2id
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct GeocodingConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl fmt::Debug for GeocodingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeocodingConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub geocoding: GeocodingConfig,
    pub repo_timeout_secs: u64,
    pub cors_allow_origin: String,
    pub env_type: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET must not be empty");
        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "chronospace".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "chronospace-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 15),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 7),
        };

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("PASSWORD_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("PASSWORD_ITERATIONS", defaults.iterations),
            parallelism: env_or("PASSWORD_PARALLELISM", defaults.parallelism),
        };

        let geocoding = GeocodingConfig {
            api_key: std::env::var("GOOGLE_API_KEY").context("GOOGLE_API_KEY must be set")?,
            base_url: std::env::var("GEOCODING_BASE_URL")
                .unwrap_or_else(|_| "https://maps.googleapis.com".into()),
            timeout_secs: env_or("GEOCODING_TIMEOUT_SECS", 5),
            max_retries: env_or("GEOCODING_MAX_RETRIES", 2),
        };

        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            password,
            geocoding,
            repo_timeout_secs: env_or("REPO_TIMEOUT_SECS", 5),
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").unwrap_or_else(|_| "*".into()),
            env_type: std::env::var("ENV_TYPE").unwrap_or_else(|_| "dev".into()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
        })
    }

    pub fn repo_timeout(&self) -> Duration {
        Duration::from_secs(self.repo_timeout_secs)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_config_debug_hides_secret() {
        let cfg = JwtConfig {
            secret: "super-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 15,
            refresh_ttl_minutes: 60,
        };
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("CHRONOSPACE_TEST_ENV_OR", "not-a-number");
        assert_eq!(env_or("CHRONOSPACE_TEST_ENV_OR", 7u64), 7);
        std::env::set_var("CHRONOSPACE_TEST_ENV_OR", "42");
        assert_eq!(env_or("CHRONOSPACE_TEST_ENV_OR", 7u64), 42);
        std::env::remove_var("CHRONOSPACE_TEST_ENV_OR");
    }
}
