/// Database models for TaskNest
///
/// Each model carries its own SQL; the storage traits in [`crate::store`]
/// wrap them for the PostgreSQL backend.
///
/// # Models
///
/// - `user`: User accounts and profiles
/// - `task`: Tasks, notification settings, partial updates
/// - `auth_token`: Ledger of locally issued access tokens

pub mod auth_token;
pub mod task;
pub mod user;
