use serde::Deserialize;

/// S3-compatible image hosting for uploaded QR images
#[derive(Debug, Clone, Deserialize)]
pub struct ImageHostConfig {
    /// Bucket name; image hosting is disabled when absent
    pub bucket: Option<String>,
    pub region: String,
    /// Custom endpoint for non-AWS services (MinIO, R2, ...)
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Public prefix under which uploaded objects are reachable
    pub public_url: Option<String>,
}

impl ImageHostConfig {
    pub fn is_enabled(&self) -> bool {
        self.bucket.is_some()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.is_enabled() && self.public_url.is_none() {
            return Err("S3_PUBLIC_URL is required when S3_BUCKET is set".to_string());
        }

        Ok(())
    }
}
