//! Common test utilities for integration tests
//!
//! Builds the real router over in-memory stores and a manual clock, and
//! offers helpers to drive it through `tower::Service::call`.
//!
//! The manual clock starts at the wall-clock time: token expiry is checked
//! by the JWT library against system time, so issued tokens must be fresh.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tasknest_api::app::{build_router, AppState};
use tasknest_api::config::Config;
use tasknest_api::middleware::rate_limit::RateGate;
use tasknest_shared::clock::ManualClock;
use tasknest_shared::directory::Registration;
use tasknest_shared::store::{MemoryTaskStore, MemoryUserStore};
use tower::Service as _;
use uuid::Uuid;

pub const SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const PASSWORD: &str = "Aa1!aaaa";

/// Configuration with cheap hashing and rate limiting off
pub fn test_config() -> Config {
    Config::from_lookup(|key| {
        let value = match key {
            "DATABASE_URL" => "postgresql://unused/tasknest",
            "JWT_SECRET" => SECRET,
            "PASSWORD_HASH_MEMORY_KIB" => "8",
            "PASSWORD_HASH_ITERATIONS" => "1",
            "PASSWORD_HASH_PARALLELISM" => "1",
            "RATE_LIMIT_ENABLED" => "false",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("test config")
}

/// Signs a token the way an external identity provider would
pub fn external_token(user_id: Uuid, email: &str, ttl: Duration) -> String {
    let now = Utc::now();
    encode(
        &Header::default(),
        &json!({
            "sub": user_id.to_string(),
            "email": email,
            "iat": now.timestamp(),
            "exp": (now + ttl).timestamp(),
        }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("Should encode")
}

/// Decoded response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Test context containing all necessary resources
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub users: Arc<MemoryUserStore>,
    pub tasks: Arc<MemoryTaskStore>,
}

impl TestApp {
    /// App with rate limiting disabled
    pub fn new() -> Self {
        Self::build(|state| state)
    }

    /// App with the standard rate gate on the manual clock
    pub fn with_rate_limit() -> Self {
        Self::build(|state| {
            let gate = RateGate::new(state.clock.clone());
            state.with_rate_gate(Some(Arc::new(gate)))
        })
    }

    /// App with a customised state
    pub fn build(customize: impl FnOnce(AppState) -> AppState) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let users = Arc::new(MemoryUserStore::with_clock(clock.clone()));
        let tasks = Arc::new(MemoryTaskStore::with_clock(clock.clone()));

        let state = AppState::new(test_config(), tasks.clone(), users.clone(), clock.clone())
            .expect("state");
        let state = customize(state);

        Self {
            router: build_router(state.clone()),
            state,
            clock,
            users,
            tasks,
        }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        self.request_with(method, uri, token, body, &[]).await
    }

    pub async fn request_with(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        extra_headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().call(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Registers a user directly through the directory
    pub async fn user(&self, email: &str) -> Uuid {
        self.state
            .users()
            .register(Registration::new(email, PASSWORD))
            .await
            .expect("register")
            .id
    }

    /// Registered user plus an externally signed token
    pub async fn signed_in(&self, email: &str) -> (Uuid, String) {
        let id = self.user(email).await;
        (id, external_token(id, email, Duration::minutes(30)))
    }

    /// Creates a task through the API and returns its JSON
    pub async fn create_task(&self, user_id: Uuid, token: &str, body: Value) -> Value {
        let response = self
            .request("POST", &format!("/api/{user_id}/tasks"), Some(token), Some(body))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body
    }
}
