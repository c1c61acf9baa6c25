/// Ledger of access tokens issued by this service
///
/// Only the local-issuance path writes here. Tokens minted by the external
/// identity provider never appear in the ledger and are judged on signature
/// and expiry alone.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE auth_tokens (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     token TEXT NOT NULL UNIQUE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     issued_at TIMESTAMPTZ NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL,
///     is_revoked BOOLEAN NOT NULL DEFAULT FALSE
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Issued token record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
}

/// Input for recording an issued token
#[derive(Debug, Clone)]
pub struct NewAuthToken {
    pub token: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Builds a ledger entry as the database would
    pub fn from_new(data: NewAuthToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: data.token,
            user_id: data.user_id,
            issued_at: data.issued_at,
            expires_at: data.expires_at,
            is_revoked: false,
        }
    }

    /// Not expired and not revoked
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && now < self.expires_at
    }

    /// Records an issued token
    pub async fn create(pool: &PgPool, data: NewAuthToken) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AuthToken>(
            r#"
            INSERT INTO auth_tokens (token, user_id, issued_at, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, token, user_id, issued_at, expires_at, is_revoked
            "#,
        )
        .bind(data.token)
        .bind(data.user_id)
        .bind(data.issued_at)
        .bind(data.expires_at)
        .fetch_one(pool)
        .await
    }

    /// Looks up a token string
    pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AuthToken>(
            r#"
            SELECT id, token, user_id, issued_at, expires_at, is_revoked
            FROM auth_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await
    }

    /// Marks a token revoked; returns false if it was never recorded
    pub async fn revoke(pool: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE auth_tokens SET is_revoked = TRUE WHERE token = $1")
            .bind(token)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_in: Duration) -> AuthToken {
        let now = Utc::now();
        AuthToken::from_new(NewAuthToken {
            token: "abc".to_string(),
            user_id: Uuid::new_v4(),
            issued_at: now,
            expires_at: now + expires_in,
        })
    }

    #[test]
    fn test_fresh_token_is_valid() {
        assert!(token(Duration::minutes(30)).is_valid(Utc::now()));
    }

    #[test]
    fn test_expired_token_is_invalid() {
        assert!(!token(Duration::minutes(-1)).is_valid(Utc::now()));
    }

    #[test]
    fn test_revoked_token_is_invalid() {
        let mut t = token(Duration::minutes(30));
        t.is_revoked = true;
        assert!(!t.is_valid(Utc::now()));
    }
}
