/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`jwt`]: Bearer token validation (and feature-gated local issuance)
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`authorization`]: Owner checks and capability sets
/// - [`middleware`]: Header parsing and the request [`middleware::Authenticator`]
///
/// # Security Features
///
/// - **Tokens**: HS256 only, single expiry check, UUID subject required
/// - **Passwords**: Argon2id with configurable cost
/// - **Isolation**: path owner must equal the token subject, no overrides
///
/// # Example
///
/// ```
/// use tasknest_shared::auth::password::{hash_password, verify_password, PasswordConfig};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Aa1!aaaa", &PasswordConfig::minimal())?;
/// assert!(verify_password("Aa1!aaaa", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
