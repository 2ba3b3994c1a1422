//! Environment-driven server configuration.

use std::env;

use tessera_auth::config::{AuthConfig, PasswordPolicy, parse_duration};
use tessera_auth::error::AuthError;
use tessera_db::DbConfig;

/// Top-level configuration assembled from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `development` (default) or `production`.
    pub env: String,
    pub db: DbConfig,
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Load from the process environment. TTLs are duration strings
    /// (`15m`, `30d`, `1h`). Fails when a duration does not parse or
    /// when the auth secrets fail the production checks.
    pub fn from_env() -> Result<Self, AuthError> {
        let env_name = env_or("TESSERA_ENV", "development");

        let db = DbConfig {
            url: env_or("SURREALDB_URL", "127.0.0.1:8000"),
            namespace: env_or("SURREALDB_NAMESPACE", "tessera"),
            database: env_or("SURREALDB_DATABASE", "main"),
            username: env_or("SURREALDB_USERNAME", "root"),
            password: env_or("SURREALDB_PASSWORD", "root"),
        };

        let defaults = AuthConfig::default();
        let auth = AuthConfig {
            access_token_secret: env_or("JWT_ACCESS_TOKEN_SECRET", &defaults.access_token_secret),
            refresh_token_secret: env_or(
                "JWT_REFRESH_TOKEN_SECRET",
                &defaults.refresh_token_secret,
            ),
            access_token_ttl_secs: parse_duration(&env_or("ACCESS_TOKEN_TTL", "15m"))?,
            refresh_token_ttl_secs: parse_duration(&env_or("REFRESH_TOKEN_TTL", "30d"))?,
            reset_code_ttl_secs: parse_duration(&env_or("PASSWORD_RESET_TTL", "1h"))?,
            issuer: env_or("JWT_ISSUER", &defaults.issuer),
            password_policy: PasswordPolicy {
                require_special: env_or("PASSWORD_REQUIRE_SPECIAL", "false") == "true",
                ..Default::default()
            },
        };

        let config = Self {
            env: env_name,
            db,
            auth,
        };
        config.auth.validate(config.is_production())?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
