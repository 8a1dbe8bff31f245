use crate::auth::AuthService;
use crate::jobs::JobSender;
use crate::services::image_host::ImageHost;
use crate::store::Store;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Wrapped in `Arc` and handed to every handler through Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    /// Link, click, QR and user storage
    pub store: Arc<dyn Store>,

    /// JWT authentication service for token generation and validation
    pub auth_service: AuthService,

    /// Queue feeding the background click recorder
    pub job_sender: JobSender,

    /// QR image hosting; `None` when no bucket is configured
    pub image_host: Option<Arc<dyn ImageHost>>,

    /// Base URL for composing short links (e.g. "http://localhost:3000")
    pub base_url: String,

    /// Expiry applied to links created without one
    pub default_expiry_hours: Option<i64>,

    /// Length of randomly generated short codes
    pub short_code_length: usize,

    /// Maximum number of attempts to generate a unique short code
    pub short_code_max_attempts: u32,

    /// Whether strict URL validation is enabled (requires http:// or https://)
    pub strict_url_validation: bool,
}
