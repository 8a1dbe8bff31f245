use serde::{Deserialize, Serialize};

/// Query parameters for `GET /analytics`
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Restrict to one short code
    pub slug: Option<String>,
    pub limit: Option<i64>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub store: HealthStatus,
    pub image_hosting: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Individual health status
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub latency_ms: Option<u64>,
}
