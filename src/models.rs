use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Coarse device category derived from a request's user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Desktop,
    Tablet,
    SmartTv,
    Wearable,
    Embedded,
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Desktop => "desktop",
            DeviceType::Tablet => "tablet",
            DeviceType::SmartTv => "smarttv",
            DeviceType::Wearable => "wearable",
            DeviceType::Embedded => "embedded",
            DeviceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile" => Ok(DeviceType::Mobile),
            "desktop" => Ok(DeviceType::Desktop),
            "tablet" => Ok(DeviceType::Tablet),
            "smarttv" => Ok(DeviceType::SmartTv),
            "wearable" => Ok(DeviceType::Wearable),
            "embedded" => Ok(DeviceType::Embedded),
            "unknown" => Ok(DeviceType::Unknown),
            other => Err(format!("unknown device type: {}", other)),
        }
    }
}

/// One redirect event, embedded in its parent link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Click {
    pub timestamp: DateTime<Utc>,
    pub device_type: DeviceType,
    pub region: String,
    pub user_agent: Option<String>,
}

/// A short code mapping owned by one user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: i64,
    pub owner_id: i64,
    pub original_url: String,
    pub short_code: String,
    /// Recomputed from the configured base URL on every read; never persisted.
    #[sqlx(skip)]
    pub shortened_url: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[sqlx(skip)]
    pub clicks: Vec<Click>,
}

impl Link {
    /// Fill in the composed short URL for `base_url`.
    pub fn with_short_url(mut self, base_url: &str) -> Self {
        self.shortened_url = compose_short_url(base_url, &self.short_code);
        self
    }

    /// A link without an expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

/// `base_url + "/s/" + short_code`, tolerating a trailing slash on the base.
pub fn compose_short_url(base_url: &str, short_code: &str) -> String {
    format!("{}/s/{}", base_url.trim_end_matches('/'), short_code)
}

/// Fields required to persist a new link.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub owner_id: i64,
    pub original_url: String,
    pub short_code: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Owner-initiated edits; `None` leaves a field untouched, `Some(None)`
/// clears a nullable one.
#[derive(Debug, Clone, Default)]
pub struct LinkChanges {
    pub title: Option<Option<String>>,
    pub original_url: Option<String>,
    pub short_code: Option<String>,
    pub is_active: Option<bool>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// Independently addressable redirect event (parallel analytics log).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: i64,
    pub owner_id: i64,
    pub short_code: String,
    pub link_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub ip: Option<String>,
    pub referrer: Option<String>,
    pub device_type: String,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// Analytics event before the store assigns it an id.
#[derive(Debug, Clone)]
pub struct NewAnalyticsEvent {
    pub owner_id: i64,
    pub short_code: String,
    pub link_id: i64,
    pub timestamp: DateTime<Utc>,
    pub ip: Option<String>,
    pub referrer: Option<String>,
    pub device_type: DeviceType,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// A QR code bound to arbitrary text, optionally with a hosted image.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    pub id: i64,
    pub owner_id: i64,
    pub text: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Registered account; credentials are managed outside the core.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
}

/// Request to create a short link
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub original_url: Option<String>,

    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: Option<String>,

    pub custom_slug: Option<String>,

    pub expires_at: Option<DateTime<Utc>>,

    #[validate(range(
        min = 1,
        max = 87600,
        message = "Expiry must be between 1 and 87600 hours"
    ))]
    pub expiry_hours: Option<i64>,
}

/// Partial update of a link. An explicit `null` clears `title` or `expiresAt`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLinkRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub title: Option<Option<String>>,
    pub original_url: Option<String>,
    pub short_code: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// Maps a present field to `Some`, so `null` arrives as `Some(None)`.
/// Absent fields fall back to `None` through `#[serde(default)]`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Longest title accepted on create and update
pub const MAX_TITLE_CHARS: usize = 200;

/// Request to create a QR code from text
#[derive(Debug, Deserialize)]
pub struct CreateQrRequest {
    pub text: Option<String>,
}

/// Plain `{message}` acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
