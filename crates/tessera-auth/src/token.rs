//! Access/refresh JWT issuance and verification, plus generation of
//! the random identifiers the session store keys on.
//!
//! The two token categories are signed with independent HMAC secrets:
//! a leaked access secret must never be able to mint refresh tokens.
//! Access tokens are stateless; refresh tokens carry a `jti` that is
//! joined against the session store on every redemption.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tessera_core::models::principal::Principal;
use tessera_core::models::user::GlobalRole;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// `typ` claim value for access tokens.
pub const ACCESS_TOKEN_TYPE: &str = "access";
/// `typ` claim value for refresh tokens.
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject — user ID (UUID string).
    pub sub: String,
    /// Global role at issuance time.
    pub role: String,
    /// Token category tag.
    pub typ: String,
    /// Issuer.
    pub iss: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// Claims embedded in every refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject — user ID (UUID string).
    pub sub: String,
    /// Unique token identifier correlated with a session-store row.
    pub jti: String,
    /// Token category tag.
    pub typ: String,
    /// Issuer.
    pub iss: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// Issue a signed HS256 access token.
pub fn issue_access_token(
    user_id: Uuid,
    role: GlobalRole,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = AccessClaims {
        sub: user_id.to_string(),
        role: role.as_str().into(),
        typ: ACCESS_TOKEN_TYPE.into(),
        iss: config.issuer.clone(),
        iat: now,
        exp: now + config.access_token_ttl_secs as i64,
    };
    sign(&claims, &config.access_token_secret)
}

/// Issue a signed HS256 refresh token carrying `jti`.
pub fn issue_refresh_token(
    user_id: Uuid,
    jti: &str,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = RefreshClaims {
        sub: user_id.to_string(),
        jti: jti.into(),
        typ: REFRESH_TOKEN_TYPE.into(),
        iss: config.issuer.clone(),
        iat: now,
        exp: now + config.refresh_token_ttl_secs as i64,
    };
    sign(&claims, &config.refresh_token_secret)
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, AuthError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Decode and verify a token against one category's secret. Fails
/// closed: bad signature, expiry (zero leeway), missing subject and a
/// missing/garbled claim set are all rejections.
fn decode_claims<T: serde::de::DeserializeOwned>(
    token: &str,
    secret: &str,
    issuer: &str,
) -> Result<T, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

    jsonwebtoken::decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid(e.to_string()),
    })
}

/// Verify an access token: signature, expiry, issuer and type tag.
pub fn verify_access_token(token: &str, config: &AuthConfig) -> Result<AccessClaims, AuthError> {
    let claims: AccessClaims = decode_claims(token, &config.access_token_secret, &config.issuer)?;
    if claims.typ != ACCESS_TOKEN_TYPE {
        return Err(AuthError::TokenInvalid("wrong token type".into()));
    }
    Ok(claims)
}

/// Verify a refresh token: signature, expiry, issuer and type tag.
pub fn verify_refresh_token(token: &str, config: &AuthConfig) -> Result<RefreshClaims, AuthError> {
    let claims: RefreshClaims = decode_claims(token, &config.refresh_token_secret, &config.issuer)?;
    if claims.typ != REFRESH_TOKEN_TYPE {
        return Err(AuthError::TokenInvalid("wrong token type".into()));
    }
    Ok(claims)
}

/// Convert verified access claims into a request principal.
pub fn principal_from_claims(claims: &AccessClaims) -> Result<Principal, AuthError> {
    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AuthError::TokenInvalid("subject is not a UUID".into()))?;
    let role = GlobalRole::parse(&claims.role)
        .ok_or_else(|| AuthError::TokenInvalid(format!("unknown role {:?}", claims.role)))?;
    Ok(Principal { id, role })
}

/// Authenticate a request from its `Authorization` header value.
///
/// This is the API-boundary entry point: a missing header and a
/// failed verification are distinct rejection reasons, and both are
/// "unauthenticated" — never "forbidden".
pub fn principal_from_bearer(
    header: Option<&str>,
    config: &AuthConfig,
) -> Result<Principal, AuthError> {
    let header = header.ok_or(AuthError::TokenMissing)?;
    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AuthError::TokenInvalid("authorization header is not a bearer token".into())
    })?;
    let claims = verify_access_token(token, config)?;
    principal_from_claims(&claims)
}

/// Generate a unique token identifier: 16 cryptographically random
/// bytes (128 bits), hex-encoded.
pub fn generate_jti() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rand::Rng::random(&mut rng);
    hex::encode(bytes)
}

/// Generate a password-reset code: 32 cryptographically random bytes,
/// base64url-encoded without padding. Short numeric codes are
/// deliberately not supported — they are brute-forceable within the
/// expiry window.
pub fn generate_reset_code() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of a raw reset code, hex-encoded. This is the value
/// stored in the database; the raw code exists only in transit.
pub fn hash_reset_code(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "test-access-secret".into(),
            refresh_token_secret: "test-refresh-secret".into(),
            issuer: "tessera-test".into(),
            ..Default::default()
        }
    }

    #[test]
    fn access_token_roundtrip() {
        let config = test_config();
        let user_id = Uuid::new_v4();

        let token = issue_access_token(user_id, GlobalRole::Admin, &config).unwrap();
        let claims = verify_access_token(&token, &config).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "ADMIN");
        assert_eq!(claims.typ, ACCESS_TOKEN_TYPE);
        assert_eq!(claims.iss, "tessera-test");
    }

    #[test]
    fn refresh_token_roundtrip() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let jti = generate_jti();

        let token = issue_refresh_token(user_id, &jti, &config).unwrap();
        let claims = verify_refresh_token(&token, &config).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.jti, jti);
        assert_eq!(claims.typ, REFRESH_TOKEN_TYPE);
    }

    #[test]
    fn tampered_token_fails() {
        let config = test_config();
        let token = issue_access_token(Uuid::new_v4(), GlobalRole::User, &config).unwrap();
        let tampered = format!("{token}x");
        assert!(verify_access_token(&tampered, &config).is_err());
    }

    #[test]
    fn refresh_token_rejected_by_access_verifier() {
        let config = test_config();
        let token = issue_refresh_token(Uuid::new_v4(), &generate_jti(), &config).unwrap();
        // Different secret AND different type tag — either alone must
        // already cause a rejection.
        assert!(verify_access_token(&token, &config).is_err());
    }

    #[test]
    fn wrong_type_tag_fails_even_with_right_secret() {
        let config = test_config();
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: Uuid::new_v4().to_string(),
            role: "USER".into(),
            typ: REFRESH_TOKEN_TYPE.into(),
            iss: config.issuer.clone(),
            iat: now,
            exp: now + 900,
        };
        let token = sign(&claims, &config.access_token_secret).unwrap();

        let err = verify_access_token(&token, &config).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid(_)));
    }

    #[test]
    fn expired_token_fails() {
        let config = test_config();
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: Uuid::new_v4().to_string(),
            role: "USER".into(),
            typ: ACCESS_TOKEN_TYPE.into(),
            iss: config.issuer.clone(),
            iat: now - 1_000,
            exp: now - 100,
        };
        let token = sign(&claims, &config.access_token_secret).unwrap();

        let err = verify_access_token(&token, &config).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn jti_is_unique_hex() {
        let a = generate_jti();
        let b = generate_jti();
        assert_ne!(a, b);
        // 16 bytes -> 32 hex chars.
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn reset_code_is_url_safe() {
        let code = generate_reset_code();
        // 32 bytes -> 43 base64url chars, no padding.
        assert_eq!(code.len(), 43);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn reset_code_hash_is_deterministic() {
        let code = generate_reset_code();
        assert_eq!(hash_reset_code(&code), hash_reset_code(&code));
        assert_ne!(hash_reset_code(&code), hash_reset_code("other"));
    }

    #[test]
    fn principal_from_bearer_happy_path() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = issue_access_token(user_id, GlobalRole::User, &config).unwrap();
        let header = format!("Bearer {token}");

        let principal = principal_from_bearer(Some(&header), &config).unwrap();
        assert_eq!(principal.id, user_id);
        assert_eq!(principal.role, GlobalRole::User);
    }

    #[test]
    fn missing_header_is_distinct_from_invalid_token() {
        let config = test_config();
        assert!(matches!(
            principal_from_bearer(None, &config).unwrap_err(),
            AuthError::TokenMissing
        ));
        assert!(matches!(
            principal_from_bearer(Some("Bearer garbage"), &config).unwrap_err(),
            AuthError::TokenInvalid(_)
        ));
        assert!(matches!(
            principal_from_bearer(Some("Basic abc"), &config).unwrap_err(),
            AuthError::TokenInvalid(_)
        ));
    }
}
