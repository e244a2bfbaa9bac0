use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::auth::{extract_bearer_token, AuthError, AuthService, RateLimitConfig, UserRole, UserSession};

/// JWT authentication middleware
pub async fn jwt_auth_middleware(
    State(auth_service): State<AuthService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;
    let session = auth_service.validate_session(token).await?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Admin-only middleware; must run after `jwt_auth_middleware`
pub async fn admin_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    let session = request
        .extensions()
        .get::<UserSession>()
        .ok_or(AuthError::InsufficientPermissions)?;

    if !session.role.can_access(&UserRole::Admin) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn security_headers_layer() -> SetResponseHeaderLayer<axum::http::HeaderValue> {
    SetResponseHeaderLayer::overriding(
        axum::http::header::X_CONTENT_TYPE_OPTIONS,
        axum::http::HeaderValue::from_static("nosniff"),
    )
}

/// Sliding-window request counter keyed by client address
#[derive(Debug, Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
            trust_proxy_headers: false,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            trust_proxy_headers: config.trust_proxy_headers,
            ..Self::new(config.max_requests, Duration::from_secs(config.window_seconds))
        }
    }

    pub fn check_rate_limit(&self, key: &str) -> bool {
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();

        // expired clients are dropped so the map only holds active windows
        requests.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < self.window);
            !times.is_empty()
        });

        let entry = requests.entry(key.to_string()).or_default();
        if entry.len() >= self.max_requests {
            return false;
        }

        entry.push(now);
        true
    }

    /// Peer address, or the first forwarded hop when proxy headers are trusted
    pub fn client_key(&self, request: &Request) -> String {
        if self.trust_proxy_headers {
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .or_else(|| request.headers().get("x-real-ip"))
                .and_then(|header| header.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty());

            if let Some(client) = forwarded {
                return client.to_string();
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Throttles credential endpoints per client
pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let client = rate_limiter.client_key(&request);

    if !rate_limiter.check_rate_limit(&client) {
        tracing::warn!("Rate limit exceeded for {}", client);
        return Err(AuthError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));

        assert!(limiter.check_rate_limit("client1"));
        assert!(limiter.check_rate_limit("client1"));
        assert!(limiter.check_rate_limit("client1"));
        assert!(!limiter.check_rate_limit("client1"));

        assert!(limiter.check_rate_limit("client2"));
    }

    #[test]
    fn test_rate_limiter_window_expires() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check_rate_limit("client"));
        assert!(!limiter.check_rate_limit("client"));

        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check_rate_limit("client"));
    }

    #[test]
    fn test_idle_clients_are_evicted() {
        let limiter = RateLimiter::new(5, Duration::from_millis(20));
        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(limiter.check_rate_limit("10.0.0.2"));
        assert_eq!(limiter.tracked_clients(), 2);

        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check_rate_limit("10.0.0.3"));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    fn request_from(peer: &str, forwarded_for: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/login");
        if let Some(value) = forwarded_for {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut request = builder.body(axum::body::Body::empty()).unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn test_client_key_uses_peer_address_by_default() {
        let limiter = RateLimiter::from_config(&RateLimitConfig::default());
        let request = request_from("203.0.113.7:51000", Some("198.51.100.1"));

        assert_eq!(limiter.client_key(&request), "203.0.113.7");
    }

    #[test]
    fn test_client_key_trusts_forwarding_when_configured() {
        let limiter = RateLimiter::from_config(&RateLimitConfig {
            trust_proxy_headers: true,
            ..Default::default()
        });

        let request = request_from("10.0.0.1:443", Some("198.51.100.1, 10.0.0.1"));
        assert_eq!(limiter.client_key(&request), "198.51.100.1");

        let direct = request_from("10.0.0.1:443", None);
        assert_eq!(limiter.client_key(&direct), "10.0.0.1");
    }

    #[test]
    fn test_user_role_permissions() {
        assert!(UserRole::Admin.can_access(&UserRole::Admin));
        assert!(UserRole::Admin.can_access(&UserRole::User));
        assert!(UserRole::User.can_access(&UserRole::User));
        assert!(!UserRole::User.can_access(&UserRole::Admin));
    }
}
