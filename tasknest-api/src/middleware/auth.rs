/// Bearer authentication and owner guard
///
/// Two layers protect `/api/:user_id/...` routes, in this order:
///
/// 1. [`jwt_auth_layer`] authenticates the bearer token and inserts an
///    [`AuthContext`] into request extensions.
/// 2. [`owner_guard`] checks that `:user_id` names the caller, then that the
///    caller holds the capability the HTTP method needs.
///
/// Both run before any handler touches storage.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tasknest_shared::auth::authorization::Capability;
use tasknest_shared::auth::middleware::AuthContext;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extract::Path;

/// JWT authentication middleware layer
///
/// Validates the `Authorization: Bearer` token, resolves the user and
/// injects [`AuthContext`] into request extensions.
pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = state
        .auth
        .authenticate(req.headers())
        .await
        .map_err(|e| {
            tracing::debug!(error = %e, "Authentication failed");
            ApiError::from(e)
        })?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Owner segment of `/api/:user_id/...`
#[derive(Debug, Deserialize)]
pub struct OwnerPath {
    pub user_id: String,
}

/// Capability needed for a request
pub fn required_capability(method: &Method, path: &str) -> Capability {
    if path.ends_with("/restore") {
        return Capability::TasksUpdate;
    }

    match *method {
        Method::POST => Capability::TasksCreate,
        Method::PUT | Method::PATCH => Capability::TasksUpdate,
        Method::DELETE => Capability::TasksDelete,
        _ => Capability::TasksRead,
    }
}

/// Owner guard middleware
///
/// Must be layered inside [`jwt_auth_layer`]. A mismatched owner is denied
/// with 403 whether or not that owner exists.
pub async fn owner_guard(
    State(state): State<AppState>,
    Path(owner): Path<OwnerPath>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = req
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::Unauthorized("Missing credentials".to_string()))?;

    let guard = &state.auth.guard;
    if let Err(e) = guard.authorize(ctx, &owner.user_id) {
        tracing::warn!(
            user_id = %ctx.user_id,
            requested_owner = %owner.user_id,
            "Owner mismatch"
        );
        return Err(e.into());
    }

    let capability = required_capability(req.method(), req.uri().path());
    guard.require(ctx, capability)?;

    Ok(next.run(req).await)
}
