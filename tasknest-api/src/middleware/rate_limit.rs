/// Rate limiting middleware
///
/// Sliding-window admission control keyed by client identity and endpoint
/// pattern. Each key owns a queue of request timestamps; before counting,
/// timestamps older than `now - window` are evicted. A request is admitted
/// while the queue holds fewer than `limit` entries, and only admitted
/// requests are recorded.
///
/// # Endpoint patterns
///
/// The first UUID path segment is replaced with `{user_id}`, later ones with
/// `{task_id}`, so every user shares the same per-pattern limit:
///
/// | Pattern                           | Limit | Window |
/// |-----------------------------------|-------|--------|
/// | `/api/{user_id}/tasks`            | 100   | 60s    |
/// | `/api/{user_id}/tasks/{task_id}`  | 50    | 60s    |
/// | `/api/auth/login`                 | 5     | 300s   |
/// | `/api/auth/register`              | 2     | 3600s  |
/// | `/api/auth/me`                    | 20    | 60s    |
/// | `/api/{user_id}/tasks/stats`      | 30    | 60s    |
/// | anything else                     | 100   | 60s    |
///
/// # Storage
///
/// State lives in process memory behind one mutex. Several API replicas do
/// not share counters; a shared store would be needed to scale out.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: Requests allowed per window
/// - `X-RateLimit-Remaining`: Requests left in the current window
/// - `X-RateLimit-Reset`: Unix timestamp when the window frees up
/// - `Retry-After`: Seconds to wait (429 responses only)

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;

use axum::{
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use tasknest_shared::clock::SharedClock;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::{insert_rate_headers, ApiError, RateLimitInfo};

/// Limit for one endpoint pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests admitted per window
    pub limit: u32,

    /// Window length
    pub window: Duration,
}

impl RateWindow {
    pub fn new(limit: u32, window_seconds: i64) -> Self {
        Self {
            limit,
            window: Duration::seconds(window_seconds),
        }
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow {
        limit: u32,
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    Deny {
        limit: u32,
        reset_at: DateTime<Utc>,
        /// Whole seconds, at least 1
        retry_after: u64,
    },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allow { .. })
    }

    pub fn info(&self) -> RateLimitInfo {
        match *self {
            Admission::Allow {
                limit,
                remaining,
                reset_at,
            } => RateLimitInfo {
                limit,
                remaining,
                reset_time: reset_at.timestamp(),
                retry_after: 0,
            },
            Admission::Deny {
                limit,
                reset_at,
                retry_after,
            } => RateLimitInfo {
                limit,
                remaining: 0,
                reset_time: reset_at.timestamp(),
                retry_after,
            },
        }
    }
}

type Key = (String, String);

/// Per-process sliding-window rate limiter
pub struct RateGate {
    windows: HashMap<String, RateWindow>,
    fallback: RateWindow,
    clock: SharedClock,
    hits: Mutex<HashMap<Key, VecDeque<DateTime<Utc>>>>,
}

impl RateGate {
    /// Gate with the standard per-endpoint limits
    pub fn new(clock: SharedClock) -> Self {
        let windows = [
            ("/api/{user_id}/tasks", RateWindow::new(100, 60)),
            ("/api/{user_id}/tasks/{task_id}", RateWindow::new(50, 60)),
            ("/api/auth/login", RateWindow::new(5, 300)),
            ("/api/auth/register", RateWindow::new(2, 3600)),
            ("/api/auth/me", RateWindow::new(20, 60)),
            ("/api/{user_id}/tasks/stats", RateWindow::new(30, 60)),
        ]
        .into_iter()
        .map(|(pattern, window)| (pattern.to_string(), window))
        .collect();

        Self::with_windows(windows, RateWindow::new(100, 60), clock)
    }

    /// Gate with custom limits; `fallback` applies to unlisted patterns
    pub fn with_windows(
        windows: HashMap<String, RateWindow>,
        fallback: RateWindow,
        clock: SharedClock,
    ) -> Self {
        Self {
            windows,
            fallback,
            clock,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Generic pattern for a request path
    pub fn pattern(path: &str) -> String {
        let trimmed = match path.strip_suffix('/') {
            Some(rest) if !rest.is_empty() => rest,
            _ => path,
        };

        let mut seen_id = false;
        trimmed
            .split('/')
            .map(|segment| {
                if segment.len() == 36 && Uuid::parse_str(segment).is_ok() {
                    let placeholder = if seen_id { "{task_id}" } else { "{user_id}" };
                    seen_id = true;
                    placeholder
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Limit that applies to `pattern`
    pub fn window_for(&self, pattern: &str) -> RateWindow {
        self.windows.get(pattern).copied().unwrap_or(self.fallback)
    }

    /// Checks and, when allowed, records one request
    pub fn admit(&self, client: &str, pattern: &str) -> Admission {
        let RateWindow { limit, window } = self.window_for(pattern);
        let now = self.clock.utc();
        let boundary = now - window;

        let mut hits = self.hits.lock().unwrap_or_else(|p| p.into_inner());
        let queue = hits
            .entry((client.to_string(), pattern.to_string()))
            .or_default();

        while queue.front().is_some_and(|t| *t < boundary) {
            queue.pop_front();
        }

        let count = u32::try_from(queue.len()).unwrap_or(u32::MAX);
        if count >= limit {
            let oldest = queue.front().copied().unwrap_or(now);
            let reset_at = oldest + window;
            let wait_ms = (reset_at - now).num_milliseconds().max(0) as u64;
            let retry_after = wait_ms.div_ceil(1000).max(1);

            return Admission::Deny {
                limit,
                reset_at,
                retry_after,
            };
        }

        queue.push_back(now);
        Admission::Allow {
            limit,
            remaining: limit - count - 1,
            reset_at: now + window,
        }
    }

    /// Drops keys whose every timestamp has left its window
    pub fn sweep(&self) -> usize {
        let now = self.clock.utc();
        let mut hits = self.hits.lock().unwrap_or_else(|p| p.into_inner());
        let before = hits.len();

        hits.retain(|(_, pattern), queue| {
            let boundary = now - self.window_for(pattern).window;
            queue.back().is_some_and(|t| *t >= boundary)
        });

        before - hits.len()
    }

    /// Number of tracked (client, pattern) keys
    pub fn tracked_keys(&self) -> usize {
        self.hits.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

/// Paths that bypass the gate
const EXCLUDED_PATHS: &[&str] = &["/health"];

/// Client identity for rate limiting
///
/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware layer
///
/// Runs before authentication. Returns 429 when the window is full and
/// stamps the `X-RateLimit-*` headers on admitted responses.
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(gate) = state.rate_gate.clone() else {
        return Ok(next.run(request).await);
    };

    // Nested routers see a stripped path
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    if EXCLUDED_PATHS.contains(&path.as_str()) {
        return Ok(next.run(request).await);
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_identity(request.headers(), peer);
    let pattern = RateGate::pattern(&path);

    let admission = gate.admit(&client, &pattern);
    if !admission.is_allowed() {
        tracing::warn!(client = %client, pattern = %pattern, "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded(admission.info()));
    }

    let mut response = next.run(request).await;
    insert_rate_headers(response.headers_mut(), &admission.info());
    Ok(response)
}
