use serde::Deserialize;

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained requests per minute for authenticated/mutating routes
    pub requests_per_minute: u64,

    /// Maximum burst size for authenticated/mutating routes
    pub burst_size: u32,
}

impl RateLimitConfig {
    /// Validate rate limiting configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.requests_per_minute == 0 || self.requests_per_minute > 60_000 {
            return Err("RATE_LIMIT_PER_MINUTE must be between 1 and 60000".to_string());
        }

        if self.burst_size == 0 {
            return Err("RATE_LIMIT_BURST must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Replenish interval for the strict bucket.
    pub fn strict_period_ms(&self) -> u64 {
        (60_000 / self.requests_per_minute).max(1)
    }

    /// The public redirect route gets twice the strict allowance.
    pub fn lenient_period_ms(&self) -> u64 {
        (60_000 / (self.requests_per_minute * 2)).max(1)
    }

    pub fn lenient_burst_size(&self) -> u32 {
        self.burst_size.saturating_mul(2)
    }
}
