use serde::Deserialize;

/// Token signing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret used to sign and verify session tokens
    pub jwt_secret: String,

    /// Lifetime of an issued token in hours
    pub jwt_expiration_hours: i64,
}

impl AuthConfig {
    /// Validate authentication configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.len() < 32 {
            return Err("JWT_SECRET must be at least 32 characters for security".to_string());
        }

        if !(1..=24 * 30).contains(&self.jwt_expiration_hours) {
            return Err("JWT_EXPIRATION_HOURS must be between 1 and 720".to_string());
        }

        Ok(())
    }
}
