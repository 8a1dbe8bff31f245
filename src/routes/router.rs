use crate::config::{CorsConfig, RateLimitConfig};
use crate::error::{AppError, AppResult};
use crate::middleware::{
    identify_caller, request_context_middleware, request_id_middleware, AuthAwareKeyExtractor,
};
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::analytics_handlers;
use super::auth_handlers;
use super::health;
use super::link_handlers;
use super::qr_handlers;
use super::AppState;

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allows_any() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<http::HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|s| s.parse::<http::HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Create application router
pub fn create_router(
    state: Arc<AppState>,
    cors_config: &CorsConfig,
    rate_limit_config: &RateLimitConfig,
    max_body_bytes: usize,
) -> AppResult<Router> {
    // Authenticated and mutating endpoints (auth-aware)
    let strict_config = GovernorConfigBuilder::default()
        .per_millisecond(rate_limit_config.strict_period_ms())
        .burst_size(rate_limit_config.burst_size)
        .key_extractor(AuthAwareKeyExtractor)
        .finish()
        .ok_or_else(|| AppError::Configuration("Invalid strict rate limit".to_string()))?;

    // Public redirect gets twice the allowance
    let lenient_config = GovernorConfigBuilder::default()
        .per_millisecond(rate_limit_config.lenient_period_ms())
        .burst_size(rate_limit_config.lenient_burst_size())
        .key_extractor(AuthAwareKeyExtractor)
        .finish()
        .ok_or_else(|| AppError::Configuration("Invalid lenient rate limit".to_string()))?;

    let api_routes = Router::new()
        .route("/auth/login", post(auth_handlers::login))
        .route(
            "/links",
            post(link_handlers::create_link).get(link_handlers::list_links),
        )
        .route(
            "/links/{id}",
            put(link_handlers::update_link).delete(link_handlers::delete_link),
        )
        .route(
            "/links/device-analytics",
            get(analytics_handlers::device_analytics),
        )
        .route(
            "/links/over-time-analytics",
            get(analytics_handlers::over_time_analytics),
        )
        .route(
            "/links/summary-analytics",
            get(analytics_handlers::summary_analytics),
        )
        // Same parameter name as /links/{id}; the segment holds a short code here
        .route(
            "/links/{id}/analytics",
            get(analytics_handlers::link_analytics),
        )
        .route(
            "/links/qr",
            post(qr_handlers::create_qr).get(qr_handlers::list_qr),
        )
        .route("/qrcodes", get(qr_handlers::list_qr))
        .route("/qrcodes/{id}", delete(qr_handlers::delete_qr))
        .route("/upload-qr", post(qr_handlers::upload_qr))
        .route("/analytics", get(analytics_handlers::list_events))
        .layer(GovernorLayer::new(strict_config));

    let public_routes = Router::new()
        .route("/s/{short_code}", get(link_handlers::redirect))
        .layer(GovernorLayer::new(lenient_config));

    // Health check endpoint (no rate limiting)
    let health_routes = Router::new().route("/_health", get(health::health_check));

    Ok(api_routes
        .merge(public_routes)
        .merge(health_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(middleware::from_fn_with_state(state.clone(), identify_caller))
        .layer(cors_layer(cors_config))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
