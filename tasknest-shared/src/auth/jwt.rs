/// Bearer token validation (and optional local issuance)
///
/// Access tokens are HS256 JWTs minted by the external identity provider.
/// This module only verifies them: signature, algorithm, expiry and the
/// presence of the `sub` and `email` claims.
///
/// # Security
///
/// - **Algorithm**: HS256 only; tokens declaring any other algorithm fail
/// - **Expiry**: one check, performed by the decoder (`validate_exp`), with
///   an optional leeway for clock skew
/// - **Subject**: must parse as a UUID
///
/// # Local issuance
///
/// With the `local-issuer` cargo feature the crate also exposes
/// [`TokenIssuer`], used by standalone deployments and tests to sign their
/// own tokens. It is compiled out of default builds so the trusted path
/// cannot accidentally mint credentials.
///
/// # Example
///
/// ```
/// use tasknest_shared::auth::jwt::{TokenError, TokenValidator};
///
/// let validator = TokenValidator::new("a-secret-of-at-least-thirty-two-bytes!", 0);
/// assert!(matches!(validator.validate("not.a.jwt"), Err(TokenError::Invalid(_))));
/// ```

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single accepted signing algorithm
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, wrong algorithm, malformed or missing claims
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// `exp` is in the past
    #[error("Token has expired")]
    Expired,
}

/// JWT claims carried by access tokens
///
/// `sub` stays a string on the wire so a malformed subject is reported as an
/// invalid token instead of a generic decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: String,

    /// Email of the subject
    #[serde(default)]
    pub email: Option<String>,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: Option<i64>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Token ID, unique per issued token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Identity extracted from a valid token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    pub user_id: Uuid,
    pub email: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

/// Verifies bearer tokens against the shared secret
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    /// Creates a validator for `secret`, tolerating `leeway_seconds` of clock skew
    pub fn new(secret: &str, leeway_seconds: u64) -> Self {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = leeway_seconds;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validates `token` and extracts the caller identity
    ///
    /// # Errors
    ///
    /// - [`TokenError::Expired`] when `exp` has passed
    /// - [`TokenError::Invalid`] for everything else
    pub fn validate(&self, token: &str) -> Result<ValidatedToken, TokenError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })?;
        let claims = data.claims;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| TokenError::Invalid("subject is not a valid user id".to_string()))?;

        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| TokenError::Invalid("missing email claim".to_string()))?;

        let expires_at = timestamp(claims.exp)
            .ok_or_else(|| TokenError::Invalid("exp out of range".to_string()))?;

        Ok(ValidatedToken {
            user_id,
            email,
            issued_at: claims.iat.and_then(timestamp),
            expires_at,
        })
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

#[cfg(feature = "local-issuer")]
pub use issuer::{IssuedToken, TokenIssuer};

#[cfg(feature = "local-issuer")]
mod issuer {
    use super::{Claims, TokenError, TOKEN_ALGORITHM};
    use chrono::{DateTime, Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    /// A freshly signed token and its lifetime
    #[derive(Debug, Clone)]
    pub struct IssuedToken {
        pub token: String,
        pub issued_at: DateTime<Utc>,
        pub expires_at: DateTime<Utc>,
    }

    /// Signs access tokens with the shared secret
    #[derive(Clone)]
    pub struct TokenIssuer {
        key: EncodingKey,
        ttl: Duration,
    }

    impl TokenIssuer {
        pub fn new(secret: &str, ttl: Duration) -> Self {
            Self {
                key: EncodingKey::from_secret(secret.as_bytes()),
                ttl,
            }
        }

        /// Signs a token for `user_id` issued at `now`
        pub fn issue(
            &self,
            user_id: Uuid,
            email: &str,
            now: DateTime<Utc>,
        ) -> Result<IssuedToken, TokenError> {
            let expires_at = now + self.ttl;
            let claims = Claims {
                sub: user_id.to_string(),
                email: Some(email.to_string()),
                iat: Some(now.timestamp()),
                exp: expires_at.timestamp(),
                jti: Some(Uuid::new_v4().to_string()),
            };

            let token = encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.key)
                .map_err(|e| TokenError::Invalid(format!("Token encoding failed: {e}")))?;

            Ok(IssuedToken {
                token,
                issued_at: now,
                expires_at,
            })
        }
    }
}
