/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/register` - Create an account
/// - `POST /api/auth/login` - Check credentials and, with the `local-issuer`
///   feature, issue an access token
/// - `POST /api/auth/logout` - Revoke the presented token (bearer)
/// - `GET /api/auth/me` - Current user's profile (bearer)
///
/// Tokens are normally issued by an external identity provider. Without
/// `local-issuer`, login still verifies the credentials and then answers
/// `501 Not Implemented`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::Json,
    routes::MessageResponse,
};
use axum::{extract::State, http::StatusCode, Extension};
use serde::{Deserialize, Serialize};
use tasknest_shared::{
    auth::middleware::AuthContext,
    directory::Registration,
    models::user::{User, UserProfile},
};
use uuid::Uuid;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (strength is checked by the directory)
    pub password: String,

    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,
}

/// Register response
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,

    /// Always `bearer`
    pub token_type: String,

    /// Seconds until the token expires
    pub expires_in: i64,

    pub user: UserProfile,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "ada@example.com",
///   "password": "SecureP@ss123",
///   "first_name": "Ada"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request` (`duplicate_email`): Email already registered
/// - `422 Unprocessable Entity`: Invalid email, weak password, long names
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    req.validate()?;

    let user = state
        .users()
        .register(Registration {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            email: user.email,
        }),
    ))
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "ada@example.com",
///   "password": "SecureP@ss123"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "access_token": "eyJ...",
///   "token_type": "bearer",
///   "expires_in": 1800,
///   "user": { "id": "uuid", "email": "ada@example.com", ... }
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email, wrong password or inactive account
/// - `501 Not Implemented`: Local issuance is not compiled in
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let user = state
        .users()
        .authenticate(&req.email, &req.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    issue_session(&state, user).await.map(Json)
}

#[cfg(feature = "local-issuer")]
async fn issue_session(state: &AppState, user: User) -> ApiResult<LoginResponse> {
    let issued = state
        .issuer
        .issue(user.id, &user.email, state.clock.utc())
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    state
        .users()
        .record_token(user.id, &issued.token, issued.issued_at, issued.expires_at)
        .await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(LoginResponse {
        access_token: issued.token,
        token_type: "bearer".to_string(),
        expires_in: (issued.expires_at - issued.issued_at).num_seconds(),
        user: UserProfile::from(&user),
    })
}

#[cfg(not(feature = "local-issuer"))]
async fn issue_session(_state: &AppState, user: User) -> ApiResult<LoginResponse> {
    tracing::info!(user_id = %user.id, "Credentials verified; token issuance is external");
    Err(ApiError::NotImplemented(
        "Access tokens are issued by the identity provider".to_string(),
    ))
}

/// Logout endpoint
///
/// Revokes the presented token when it was issued locally; otherwise only
/// acknowledges.
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MessageResponse>> {
    revoke_session(&state, &auth).await?;
    Ok(Json(MessageResponse::new("Successfully logged out")))
}

#[cfg(feature = "local-issuer")]
async fn revoke_session(state: &AppState, auth: &AuthContext) -> ApiResult<()> {
    let revoked = state.users().revoke(&auth.token).await?;
    tracing::info!(user_id = %auth.user_id, revoked, "User logged out");
    Ok(())
}

#[cfg(not(feature = "local-issuer"))]
async fn revoke_session(_state: &AppState, auth: &AuthContext) -> ApiResult<()> {
    tracing::info!(user_id = %auth.user_id, "User logged out");
    Ok(())
}

/// Current user's profile
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .users()
        .resolve(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    Ok(Json(UserProfile::from(&user)))
}
