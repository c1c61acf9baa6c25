/// User directory: lookup, credential checks and registration
///
/// The directory sits between the HTTP layer and the [`UserStore`]. It owns
/// the password policy and the token ledger checks used by the
/// local-issuance path.
///
/// # Timing
///
/// [`UserDirectory::authenticate`] always runs one Argon2 verification. When
/// the email is unknown it verifies against a dummy hash created with the
/// same cost parameters, so response time does not reveal whether an
/// account exists.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tasknest_shared::auth::password::PasswordConfig;
/// use tasknest_shared::clock::system_clock;
/// use tasknest_shared::directory::{Registration, UserDirectory};
/// use tasknest_shared::store::MemoryUserStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let directory = UserDirectory::new(
///     Arc::new(MemoryUserStore::new()),
///     PasswordConfig::minimal(),
///     system_clock(),
/// )?;
///
/// let user = directory.register(Registration::new("Ada@Example.com", "Aa1!aaaa")).await?;
/// assert_eq!(user.email, "ada@example.com");
///
/// let found = directory.authenticate("ada@example.com", "Aa1!aaaa").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::password::{
    hash_password, validate_password_strength, verify_password, PasswordConfig, PasswordError,
};
use crate::clock::SharedClock;
use crate::models::auth_token::NewAuthToken;
use crate::models::user::{NewUser, User};
use crate::store::{StoreError, UserStore};

/// Error type for directory operations
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("{0}")]
    WeakPassword(String),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for DirectoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => DirectoryError::DuplicateEmail,
            other => DirectoryError::Store(other),
        }
    }
}

/// Registration input (plaintext password, not yet hashed)
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Registration {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
        }
    }
}

/// Ledger state of a presented bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// Not issued by this service; judged on signature and expiry only
    Unrecorded,
    Valid,
    Revoked,
    Expired,
}

/// Lowercases and trims an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Resolves and authenticates users
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
    password: PasswordConfig,
    dummy_hash: Arc<str>,
    clock: SharedClock,
}

impl UserDirectory {
    /// Builds a directory; hashes the dummy password up front
    ///
    /// # Errors
    ///
    /// Fails if `password` holds parameters argon2 rejects.
    pub fn new(
        store: Arc<dyn UserStore>,
        password: PasswordConfig,
        clock: SharedClock,
    ) -> Result<Self, DirectoryError> {
        let dummy_hash = hash_password("tasknest-dummy-password", &password)?;

        Ok(Self {
            store,
            password,
            dummy_hash: dummy_hash.into(),
            clock,
        })
    }

    /// User by id, active or not
    pub async fn resolve(&self, user_id: Uuid) -> Result<Option<User>, DirectoryError> {
        Ok(self.store.find_by_id(user_id).await?)
    }

    /// Checks an email/password pair
    ///
    /// Returns `None` for an unknown email, a wrong password or an inactive
    /// account; callers cannot tell which.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, DirectoryError> {
        let user = self.store.find_by_email(&normalize_email(email)).await?;

        let hash = match &user {
            Some(u) => u.hashed_password.clone(),
            None => self.dummy_hash.to_string(),
        };
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| PasswordError::VerifyError(e.to_string()))??;

        match user {
            Some(u) if matches && u.is_active => Ok(Some(u)),
            Some(u) if matches => {
                tracing::info!(user_id = %u.id, "Login rejected for inactive user");
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Creates an account
    ///
    /// The store's unique constraint is the authoritative duplicate check;
    /// a concurrent registration that slips past the pre-check still ends
    /// in [`DirectoryError::DuplicateEmail`].
    pub async fn register(&self, registration: Registration) -> Result<User, DirectoryError> {
        validate_password_strength(&registration.password).map_err(DirectoryError::WeakPassword)?;

        let email = normalize_email(&registration.email);
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(DirectoryError::DuplicateEmail);
        }

        let cfg = self.password;
        let password = registration.password;
        let hashed_password = tokio::task::spawn_blocking(move || hash_password(&password, &cfg))
            .await
            .map_err(|e| PasswordError::HashError(e.to_string()))??;

        let user = self
            .store
            .create_user(NewUser {
                email,
                hashed_password,
                first_name: registration.first_name,
                last_name: registration.last_name,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Records a locally issued token in the ledger
    pub async fn record_token(
        &self,
        user_id: Uuid,
        token: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        self.store
            .record_token(NewAuthToken {
                token: token.to_string(),
                user_id,
                issued_at,
                expires_at,
            })
            .await?;
        Ok(())
    }

    /// Ledger verdict for a presented token
    pub async fn token_status(&self, token: &str) -> Result<TokenStatus, DirectoryError> {
        let status = match self.store.find_token(token).await? {
            None => TokenStatus::Unrecorded,
            Some(t) if t.is_revoked => TokenStatus::Revoked,
            Some(t) if !t.is_valid(self.clock.utc()) => TokenStatus::Expired,
            Some(_) => TokenStatus::Valid,
        };
        Ok(status)
    }

    /// Revokes a ledger token; false when it was never recorded
    pub async fn revoke(&self, token: &str) -> Result<bool, DirectoryError> {
        Ok(self.store.revoke_token(token).await?)
    }
}
