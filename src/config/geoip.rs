use serde::Deserialize;

/// Request geolocation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GeoIpConfig {
    /// Path to a MaxMind GeoLite2/GeoIP2 City database
    pub maxminddb_path: Option<String>,

    /// ip-api style endpoint queried as `<url>/<ip>` for city-level detail
    pub api_url: Option<String>,

    /// Timeout for one external lookup
    pub timeout_ms: u64,
}

impl GeoIpConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == 0 || self.timeout_ms > 10_000 {
            return Err("GEOIP_TIMEOUT_MS must be between 1 and 10000".to_string());
        }

        Ok(())
    }
}
