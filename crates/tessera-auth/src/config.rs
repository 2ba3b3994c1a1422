//! Authentication configuration.

use crate::error::AuthError;

/// Default secret shipped in dev configs; refused in production.
pub const PLACEHOLDER_SECRET: &str = "change-me-in-production";

/// Password strength policy.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    /// Stricter variant: also require a non-alphanumeric character.
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_special: false,
        }
    }
}

/// Configuration for the authentication service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for access tokens. Must differ from the refresh
    /// secret — a leaked access secret must not mint refresh tokens.
    pub access_token_secret: String,
    /// HMAC secret for refresh tokens.
    pub refresh_token_secret: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_ttl_secs: u64,
    /// Refresh token lifetime in seconds (default: 2_592_000 = 30 days).
    pub refresh_token_ttl_secs: u64,
    /// Password-reset code lifetime in seconds (default: 3600 = 1 hour).
    pub reset_code_ttl_secs: u64,
    /// JWT issuer (`iss` claim).
    pub issuer: String,
    pub password_policy: PasswordPolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: PLACEHOLDER_SECRET.into(),
            refresh_token_secret: PLACEHOLDER_SECRET.into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 2_592_000,
            reset_code_ttl_secs: 3_600,
            issuer: "tessera".into(),
            password_policy: PasswordPolicy::default(),
        }
    }
}

impl AuthConfig {
    /// Startup validation. In a production-like environment the
    /// placeholder secret and category-shared secrets are refused.
    pub fn validate(&self, production: bool) -> Result<(), AuthError> {
        if self.access_token_secret.is_empty() || self.refresh_token_secret.is_empty() {
            return Err(AuthError::Config("token secrets must not be empty".into()));
        }
        if production {
            if self.access_token_secret == PLACEHOLDER_SECRET
                || self.refresh_token_secret == PLACEHOLDER_SECRET
            {
                return Err(AuthError::Config(
                    "token secrets must be changed in production".into(),
                ));
            }
            if self.access_token_secret == self.refresh_token_secret {
                return Err(AuthError::Config(
                    "access and refresh token secrets must differ".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Parse a duration string like `"90s"`, `"15m"`, `"2h"` or `"30d"`
/// into seconds. A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<u64, AuthError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AuthError::Config("empty duration".into()));
    }

    let (value, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };

    let value: u64 = value
        .parse()
        .map_err(|_| AuthError::Config(format!("invalid duration: {s:?}")))?;

    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        other => {
            return Err(AuthError::Config(format!(
                "unknown duration unit {other:?} in {s:?}"
            )));
        }
    };

    Ok(value * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_durations() {
        assert_eq!(parse_duration("90s").unwrap(), 90);
        assert_eq!(parse_duration("15m").unwrap(), 900);
        assert_eq!(parse_duration("2h").unwrap(), 7_200);
        assert_eq!(parse_duration("30d").unwrap(), 2_592_000);
        assert_eq!(parse_duration("45").unwrap(), 45);
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("15w").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("ten minutes").is_err());
    }

    #[test]
    fn placeholder_secret_rejected_in_production() {
        let config = AuthConfig::default();
        assert!(config.validate(false).is_ok());
        assert!(config.validate(true).is_err());
    }

    #[test]
    fn shared_secret_rejected_in_production() {
        let config = AuthConfig {
            access_token_secret: "same-secret".into(),
            refresh_token_secret: "same-secret".into(),
            ..Default::default()
        };
        assert!(config.validate(true).is_err());
    }

    #[test]
    fn distinct_secrets_accepted_in_production() {
        let config = AuthConfig {
            access_token_secret: "access-secret".into(),
            refresh_token_secret: "refresh-secret".into(),
            ..Default::default()
        };
        assert!(config.validate(true).is_ok());
    }
}
