//! Best-effort IP geolocation.
//!
//! An offline MaxMind database answers country (and often city) without any
//! network traffic; an optional ip-api style service is consulted for city
//! precision. Every failure degrades to an empty [`GeoInfo`]; nothing here
//! returns an error.

mod ip_api;
mod maxmind;

pub use ip_api::IpApiProvider;
pub use maxmind::MaxMindProvider;

use crate::config::GeoIpConfig;
use async_trait::async_trait;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Geolocation data for a single IP address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoInfo {
    /// ISO 3166-1 alpha-2 country code (e.g. "DE")
    pub country: Option<String>,
    pub city: Option<String>,
}

impl GeoInfo {
    /// Fill missing fields from `other`.
    fn merge(&mut self, other: GeoInfo) {
        if self.country.is_none() {
            self.country = other.country;
        }
        if self.city.is_none() {
            self.city = other.city;
        }
    }
}

#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> Option<GeoInfo>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// Combines the offline and external providers.
#[derive(Clone)]
pub struct GeoResolver {
    offline: Option<Arc<dyn GeoLookup>>,
    external: Option<Arc<dyn GeoLookup>>,
    timeout: Duration,
}

impl GeoResolver {
    pub fn new(
        offline: Option<Arc<dyn GeoLookup>>,
        external: Option<Arc<dyn GeoLookup>>,
        timeout: Duration,
    ) -> Self {
        Self {
            offline,
            external,
            timeout,
        }
    }

    /// Resolver that never finds anything.
    pub fn disabled() -> Self {
        Self::new(None, None, Duration::from_millis(1))
    }

    pub fn from_config(config: &GeoIpConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);

        let offline: Option<Arc<dyn GeoLookup>> = match &config.maxminddb_path {
            Some(path) => match MaxMindProvider::new(path) {
                Ok(provider) => {
                    info!("GeoIP: using MaxMind database at {}", path);
                    Some(Arc::new(provider))
                }
                Err(e) => {
                    warn!("GeoIP: failed to load MaxMind database at {}: {}", path, e);
                    None
                }
            },
            None => None,
        };

        let external: Option<Arc<dyn GeoLookup>> = config.api_url.as_ref().map(|url| {
            info!("GeoIP: external lookups enabled via {}", url);
            Arc::new(IpApiProvider::new(url, timeout)) as Arc<dyn GeoLookup>
        });

        if offline.is_none() && external.is_none() {
            debug!("GeoIP: no provider configured, regions will be recorded as unknown");
        }

        Self::new(offline, external, timeout)
    }

    pub async fn lookup(&self, ip: &str) -> GeoInfo {
        if is_private(ip) {
            return GeoInfo::default();
        }

        let mut info = match &self.offline {
            Some(provider) => provider.lookup(ip).await.unwrap_or_default(),
            None => GeoInfo::default(),
        };

        if info.city.is_some() {
            return info;
        }

        if let Some(provider) = &self.external {
            match tokio::time::timeout(self.timeout, provider.lookup(ip)).await {
                Ok(Some(remote)) => info.merge(remote),
                Ok(None) => {}
                Err(_) => debug!("GeoIP: {} lookup for {} timed out", provider.name(), ip),
            }
        }

        info
    }
}

/// Return `true` for addresses that should never be geolocated: loopback,
/// link-local, private ranges, IPv6 special addresses and anything unparseable.
pub fn is_private(ip_str: &str) -> bool {
    match parse_ip(ip_str) {
        Some(IpAddr::V4(addr)) => {
            addr.is_loopback()
                || addr.is_link_local()
                || addr.is_unspecified()
                || addr.is_broadcast()
                || addr.is_private()
        }
        Some(IpAddr::V6(addr)) => {
            addr.is_loopback()
                || addr.is_unspecified()
                // fe80::/10
                || (addr.segments()[0] & 0xffc0) == 0xfe80
                // fc00::/7
                || (addr.segments()[0] & 0xfe00) == 0xfc00
        }
        None => true,
    }
}

/// Parse a client address, unwrapping IPv4-mapped IPv6 (`::ffff:1.2.3.4`).
pub(crate) fn parse_ip(ip_str: &str) -> Option<IpAddr> {
    IpAddr::from_str(ip_str.trim())
        .ok()
        .map(|addr| addr.to_canonical())
}
