/// Configuration management for the API server
///
/// Configuration comes from environment variables (a `.env` file is loaded
/// first when present) and is parsed into a typed [`Config`].
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8000)
/// - `API_PRODUCTION`: Enables HSTS (default: false)
/// - `CORS_ORIGINS`: Comma-separated origins, `*` for any (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: HS256 shared secret, at least 32 characters (required)
/// - `JWT_LEEWAY_SECONDS`: Clock skew tolerated on `exp` (default: 0)
/// - `ACCESS_TOKEN_EXPIRE_MINUTES`: Lifetime of locally issued tokens (default: 30)
/// - `PASSWORD_HASH_MEMORY_KIB`, `PASSWORD_HASH_ITERATIONS`,
///   `PASSWORD_HASH_PARALLELISM`: Argon2id cost (default: 65536 / 3 / 4)
/// - `RATE_LIMIT_ENABLED`: Request admission control (default: true)
/// - `STORAGE_TIMEOUT_SECONDS`: Bound on every storage call (default: 5)
/// - `RUST_LOG`: Log filter; `LOG_FORMAT=json` switches to JSON output
///
/// # Example
///
/// ```no_run
/// use tasknest_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use tasknest_shared::auth::password::PasswordConfig;
use tasknest_shared::db::pool::DatabaseConfig;

/// Minimum accepted length of `JWT_SECRET`
pub const MIN_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Token configuration
    pub jwt: JwtConfig,

    /// Password hashing cost
    pub password: PasswordConfig,

    /// Rate limiting
    pub rate_limit: RateLimitConfig,

    /// Storage call bounds
    pub storage: StorageConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Production mode turns on HSTS
    pub production: bool,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,
}

/// Token configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HS256 secret
    ///
    /// Must be kept secret and be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Seconds of clock skew accepted on `exp`
    pub leeway_seconds: u64,

    /// Lifetime of tokens issued by the local login path
    pub access_token_expire_minutes: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct StorageConfig {
    pub timeout_seconds: u64,
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails
    /// to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parses configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "API_PORT", 8000u16)?;
        let production = parse_bool_or(&lookup, "API_PRODUCTION", false)?;
        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!("JWT_SECRET must be at least {MIN_SECRET_LENGTH} characters long");
        }

        let access_token_expire_minutes = parse_or(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES", 30i64)?;
        if access_token_expire_minutes <= 0 {
            anyhow::bail!("ACCESS_TOKEN_EXPIRE_MINUTES must be positive");
        }

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: parse_or(&lookup, "PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&lookup, "PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&lookup, "PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                production,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                ..Default::default()
            },
            jwt: JwtConfig {
                secret,
                leeway_seconds: parse_or(&lookup, "JWT_LEEWAY_SECONDS", 0u64)?,
                access_token_expire_minutes,
            },
            password,
            rate_limit: RateLimitConfig {
                enabled: parse_bool_or(&lookup, "RATE_LIMIT_ENABLED", true)?,
            },
            storage: StorageConfig {
                timeout_seconds: parse_or(&lookup, "STORAGE_TIMEOUT_SECONDS", 5u64)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// True when any origin is allowed
    pub fn cors_permissive(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> anyhow::Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("Invalid value for {key}: expected a boolean, got {v:?}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgresql://localhost/tasknest"),
            ("JWT_SECRET", SECRET),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&required())).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert!(!config.api.production);
        assert!(config.cors_permissive());
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.jwt.leeway_seconds, 0);
        assert_eq!(config.jwt.access_token_expire_minutes, 30);
        assert_eq!(config.password, PasswordConfig::default());
        assert!(config.rate_limit.enabled);
        assert_eq!(config.storage.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = required();
        pairs.extend([
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("API_PRODUCTION", "true"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("RATE_LIMIT_ENABLED", "false"),
            ("PASSWORD_HASH_ITERATIONS", "2"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert!(config.api.production);
        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert!(!config.cors_permissive());
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.password.iterations, 2);
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", SECRET)])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgresql://x")])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let pairs = [("DATABASE_URL", "postgresql://x"), ("JWT_SECRET", "short")];
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_invalid_number() {
        let mut pairs = required();
        pairs.push(("API_PORT", "eighty"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("API_PORT"));
    }
}
