/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use tasknest_api::{app::{build_router, AppState}, config::Config};
/// use tasknest_shared::db::pool::create_pool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.database.clone()).await?;
/// let state = AppState::postgres(pool, config)?;
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{
        auth::{jwt_auth_layer, owner_guard},
        rate_limit::{rate_limit_layer, RateGate},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tasknest_shared::{
    auth::{
        authorization::{AuthorizationGuard, StaticCapabilities},
        jwt::TokenValidator,
        middleware::Authenticator,
    },
    clock::{system_clock, SharedClock},
    directory::{DirectoryError, UserDirectory},
    service::TaskService,
    store::{PgTaskStore, PgUserStore, TaskStore, UserStore},
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

#[cfg(feature = "local-issuer")]
use tasknest_shared::auth::jwt::TokenIssuer;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every
/// field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,

    /// Token validation, user lookup and capability resolution
    pub auth: Arc<Authenticator>,

    /// Task operations
    pub tasks: TaskService,

    /// Admission control, `None` when disabled
    pub rate_gate: Option<Arc<RateGate>>,

    /// Time source
    pub clock: SharedClock,

    /// Signs tokens for the local login path
    #[cfg(feature = "local-issuer")]
    pub issuer: TokenIssuer,
}

impl AppState {
    /// Creates state over arbitrary store backends
    ///
    /// # Errors
    ///
    /// Fails if the configured password hashing parameters are rejected.
    pub fn new(
        config: Config,
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        clock: SharedClock,
    ) -> Result<Self, DirectoryError> {
        let directory = UserDirectory::new(users, config.password, clock.clone())?;
        let auth = Authenticator::new(
            TokenValidator::new(&config.jwt.secret, config.jwt.leeway_seconds),
            directory,
            AuthorizationGuard::new(Arc::new(StaticCapabilities::default())),
        );

        let tasks = TaskService::new(tasks, clock.clone()).with_timeout(config.storage.timeout());

        let rate_gate = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateGate::new(clock.clone())));

        Ok(Self {
            #[cfg(feature = "local-issuer")]
            issuer: TokenIssuer::new(
                &config.jwt.secret,
                chrono::Duration::minutes(config.jwt.access_token_expire_minutes),
            ),
            config: Arc::new(config),
            auth: Arc::new(auth),
            tasks,
            rate_gate,
            clock,
        })
    }

    /// Creates state backed by PostgreSQL and the wall clock
    pub fn postgres(pool: PgPool, config: Config) -> Result<Self, DirectoryError> {
        Self::new(
            config,
            Arc::new(PgTaskStore::new(pool.clone())),
            Arc::new(PgUserStore::new(pool)),
            system_clock(),
        )
    }

    /// Replaces the rate gate (tests use a gate on a manual clock)
    pub fn with_rate_gate(mut self, gate: Option<Arc<RateGate>>) -> Self {
        self.rate_gate = gate;
        self
    }

    /// User lookup and credential checks
    pub fn users(&self) -> &UserDirectory {
        &self.auth.users
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                                  # Liveness (public, not rate limited)
/// └── /api/
///     ├── /auth/
///     │   ├── POST /register
///     │   ├── POST /login
///     │   ├── POST /logout                     # bearer
///     │   └── GET  /me                         # bearer
///     └── /:user_id/tasks                      # bearer + owner guard
///         ├── GET  /            POST /
///         ├── GET  /stats
///         ├── GET  /deleted
///         ├── GET  /reminders
///         ├── GET|PUT|DELETE /:task_id
///         ├── PATCH  /:task_id/complete
///         ├── POST   /:task_id/restore
///         └── DELETE /:task_id/permanent
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Rate limiting (`/api` only)
/// 5. Bearer authentication, then the owner guard (per route group)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    let session_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Layers run bottom-up: authentication wraps the owner guard
    let task_routes = Router::new()
        .route(
            "/:user_id/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route("/:user_id/tasks/stats", get(routes::tasks::task_stats))
        .route("/:user_id/tasks/deleted", get(routes::tasks::list_deleted_tasks))
        .route("/:user_id/tasks/reminders", get(routes::tasks::upcoming_reminders))
        .route(
            "/:user_id/tasks/:task_id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/:user_id/tasks/:task_id/complete",
            patch(routes::tasks::toggle_task_completion),
        )
        .route(
            "/:user_id/tasks/:task_id/restore",
            post(routes::tasks::restore_task),
        )
        .route(
            "/:user_id/tasks/:task_id/permanent",
            delete(routes::tasks::permanently_delete_task),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            owner_guard,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let api_routes = Router::new()
        .nest("/auth", public_auth_routes.merge(session_routes))
        .merge(task_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_layer,
        ));

    let cors = if state.config.cors_permissive() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .expose_headers([
                header::RETRY_AFTER,
                header::HeaderName::from_static("x-ratelimit-limit"),
                header::HeaderName::from_static("x-ratelimit-remaining"),
                header::HeaderName::from_static("x-ratelimit-reset"),
            ])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
