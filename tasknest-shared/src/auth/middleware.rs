/// Request authentication
///
/// Turns an `Authorization: Bearer <token>` header into an [`AuthContext`]:
///
/// 1. Parse the header (missing or non-bearer → unauthenticated)
/// 2. Validate the token ([`TokenValidator`])
/// 3. Resolve the subject ([`UserDirectory`]); unknown users are
///    unauthenticated, inactive users are forbidden
/// 4. Consult the token ledger; revoked or expired entries are rejected
/// 5. Attach the user's capabilities
///
/// The HTTP crate wraps [`Authenticator::authenticate`] in an axum
/// middleware and inserts the context into request extensions.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use tasknest_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("User: {}", auth.user_id)
/// }
/// ```

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use super::authorization::{AuthorizationGuard, CapabilitySet};
use super::jwt::{TokenError, TokenValidator};
use crate::directory::{DirectoryError, TokenStatus, UserDirectory};

/// Authentication context added to request extensions
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Email from the token
    pub email: String,

    /// Capabilities granted to the user
    pub capabilities: CapabilitySet,

    /// Raw bearer token, kept for logout
    pub token: String,
}

impl AuthContext {
    pub fn new(
        user_id: Uuid,
        email: impl Into<String>,
        capabilities: CapabilitySet,
        token: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            email: email.into(),
            capabilities,
            token: token.into(),
        }
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    #[error("Expected Bearer token")]
    InvalidScheme,

    /// Token validation failed
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Subject does not name a known user
    #[error("User not found")]
    UnknownUser,

    /// User exists but is deactivated
    #[error("User account is inactive")]
    InactiveUser,

    /// Ledger says the token was revoked or has lapsed
    #[error("Token has been revoked or expired")]
    TokenRevoked,

    /// Lookup failed
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Extracts the token from an `Authorization` header
///
/// The scheme is matched case-insensitively; an empty token is treated as a
/// malformed header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidScheme)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidScheme)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidScheme);
    }

    Ok(token)
}

/// Everything needed to authenticate a request
#[derive(Clone)]
pub struct Authenticator {
    pub tokens: TokenValidator,
    pub users: UserDirectory,
    pub guard: AuthorizationGuard,
}

impl Authenticator {
    pub fn new(tokens: TokenValidator, users: UserDirectory, guard: AuthorizationGuard) -> Self {
        Self {
            tokens,
            users,
            guard,
        }
    }

    /// Authenticates a request from its headers
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let token = bearer_token(headers)?;
        let validated = self.tokens.validate(token)?;

        let user = self
            .users
            .resolve(validated.user_id)
            .await?
            .ok_or(AuthError::UnknownUser)?;
        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }

        match self.users.token_status(token).await? {
            TokenStatus::Unrecorded | TokenStatus::Valid => {}
            TokenStatus::Revoked | TokenStatus::Expired => return Err(AuthError::TokenRevoked),
        }

        let capabilities = self.guard.capabilities_for(&user).await;
        Ok(AuthContext::new(user.id, validated.email, capabilities, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[test]
    fn test_wrong_scheme() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer   ", "abc"] {
            assert!(
                matches!(bearer_token(&headers(value)), Err(AuthError::InvalidScheme)),
                "{value} should be rejected"
            );
        }
    }
}
