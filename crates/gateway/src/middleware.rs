//! Middleware for authentication and other cross-cutting concerns

use std::collections::HashMap;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, warn};

use kinnect_config::{CorsConfig, RateLimitConfig};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::state::GatewayState;

/// Resolve the bearer token to a live user and attach it to the request.
pub async fn auth_middleware(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Access token required"))?;

    let user = state.users.authenticate(token).await?;
    request.extensions_mut().insert(AuthUser {
        id: user.id,
        email: user.email,
    });

    Ok(next.run(request).await)
}

/// Logging middleware for request/response logging
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client address and route prefix.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Window>>,
}

/// Windows kept before expired ones are swept.
const SWEEP_THRESHOLD: usize = 10_000;

/// Hard cap on tracked windows. New clients are refused while it is reached.
const MAX_WINDOWS: usize = 50_000;

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_seconds.max(1))
    }

    pub fn trusts_forwarded_for(&self) -> bool {
        self.config.trust_forwarded_for
    }

    /// The configured prefix that covers `path`, if any.
    pub fn prefix_for(&self, path: &str) -> Option<&str> {
        if !self.config.enabled {
            return None;
        }
        self.config
            .prefixes
            .iter()
            .map(String::as_str)
            .find(|prefix| path.starts_with(prefix))
    }

    /// Count one request. Returns the time until the window resets when the limit is exceeded.
    pub fn check(&self, client: &str, path: &str) -> Result<(), Duration> {
        self.check_at(client, path, Instant::now())
    }

    fn check_at(&self, client: &str, path: &str, now: Instant) -> Result<(), Duration> {
        let Some(prefix) = self.prefix_for(path) else {
            return Ok(());
        };
        let window = self.window();
        let key = format!("{client}|{prefix}");

        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }
        if windows.len() >= MAX_WINDOWS && !windows.contains_key(&key) {
            warn!(tracked = windows.len(), "rate limiter is full, refusing new client");
            return Err(window);
        }

        let entry = windows.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.config.max_requests {
            return Err(window.saturating_sub(now.duration_since(entry.started)));
        }
        entry.count += 1;
        Ok(())
    }
}

/// Client address used as the rate limit key.
///
/// The socket peer is used unless `trust_forwarded_for` is set, in which case
/// the first `X-Forwarded-For` hop wins. IPv6 peers are grouped by their /64.
fn client_ip(request: &Request, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| request.headers().get("x-forwarded-for"))
        .flatten()
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(hop) = forwarded {
        return match hop.parse::<IpAddr>() {
            Ok(ip) => client_key(ip),
            Err(_) => hop.to_string(),
        };
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| client_key(addr.ip()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn client_key(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => {
                let mut segments = v6.segments();
                segments[4..].fill(0);
                format!("{}/64", Ipv6Addr::from(segments))
            }
        },
    }
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_ip(&request, state.rate_limiter.trusts_forwarded_for());
    let path = request.uri().path().to_string();

    match state.rate_limiter.check(&client, &path) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            warn!(client = %client, path = %path, "rate limit exceeded");
            let mut response = ApiError::too_many_requests().into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

/// CORS for the configured origins. A `*` entry allows any origin without credentials.
pub fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE]);

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    debug!(count = origins.len(), "configured CORS origins");

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// Headers added to every response that does not set them itself.
pub fn security_headers() -> [(HeaderName, HeaderValue); 3] {
    [
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
    ]
}
