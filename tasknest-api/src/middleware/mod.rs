/// Middleware modules for the API server
///
/// - `security`: Security response headers
/// - `rate_limit`: Sliding-window admission control (runs first)
/// - `auth`: Bearer authentication and the owner guard

pub mod auth;
pub mod rate_limit;
pub mod security;
