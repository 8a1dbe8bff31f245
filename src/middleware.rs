use crate::auth::AuthUser;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::key_extractor::KeyExtractor;
use uuid::Uuid;

/// Request ID wrapper for use in request extensions
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Caller metadata captured once per request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl RequestContext {
    fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>, request_id: Option<String>) -> Self {
        Self {
            request_id,
            client_ip: extract_client_ip(headers, peer),
            user_agent: header_string(headers, "user-agent"),
            referrer: header_string(headers, "referer"),
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<RequestContext>() {
            return Ok(context.clone());
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(RequestContext::from_parts(&parts.headers, peer, None))
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Client IP: `x-forwarded-for` (first hop), then `x-real-ip`, then the socket peer.
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = header_string(headers, "x-real-ip") {
        return Some(real_ip);
    }

    peer.map(|addr| addr.ip().to_string())
}

/// Request ID middleware - adds a unique ID to each request
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    // Reuse the caller's ID when one was supplied
    let request_id: String = req
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(request_id.clone()));

    tracing::info!(
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
        "Incoming request"
    );

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", header_value);
    }

    response
}

/// Request context middleware - captures caller metadata for handlers
pub async fn request_context_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req.extensions().get::<RequestId>().map(|r| r.0.clone());
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let context = RequestContext::from_parts(req.headers(), peer, request_id);
    req.extensions_mut().insert(context);

    next.run(req).await
}

/// Attach the authenticated caller, when the token is valid, so rate limiting
/// can key on the user instead of the address.
pub async fn identify_caller(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Ok(user) = state.auth_service.authenticate(req.headers(), None) {
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}

/// Rate limit key: per user when authenticated, per client IP otherwise
#[derive(Clone)]
pub struct AuthAwareKeyExtractor;

impl KeyExtractor for AuthAwareKeyExtractor {
    type Key = String;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, tower_governor::GovernorError> {
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return Ok(format!("user:{}", user.id));
        }

        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let ip = extract_client_ip(req.headers(), peer).unwrap_or_else(|| "unknown".to_string());
        Ok(format!("ip:{}", ip))
    }
}
