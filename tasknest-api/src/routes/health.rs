/// Health check endpoint
///
/// Liveness only: the process is up and serving. No authentication, no
/// rate limiting and no storage access.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "service": "tasknest-api",
///   "version": "0.1.0"
/// }
/// ```

use axum::Json;
use serde::{Deserialize, Serialize};

/// Name reported by the health endpoint
pub const SERVICE_NAME: &str = "tasknest-api";

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service name
    pub service: String,

    /// Application version
    pub version: String,
}

/// Health check handler
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let Json(response) = health_check().await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.service, "tasknest-api");
        assert!(!response.version.is_empty());
    }
}
