use super::{GeoInfo, GeoLookup};
use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

/// How long a provider answer is reused
const CACHE_TTL: Duration = Duration::from_secs(15 * 60);
const CACHE_MAX_CAPACITY: u64 = 10_000;

/// ip-api.com response shape
#[derive(Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
    city: Option<String>,
}

/// External lookups against an ip-api compatible endpoint.
///
/// Answers the provider actually gave, including `status: "fail"`, are kept
/// in a bounded TTL cache. Concurrent lookups of one address share a single
/// request. Transport and decode failures are not cached.
pub struct IpApiProvider {
    base_url: String,
    client: reqwest::Client,
    cache: Cache<String, Option<GeoInfo>>,
}

impl IpApiProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self::with_cache_limits(base_url, timeout, CACHE_MAX_CAPACITY, CACHE_TTL)
    }

    pub fn with_cache_limits(
        base_url: &str,
        timeout: Duration,
        max_capacity: u64,
        ttl: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("GeoIP: falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            cache,
        }
    }

    fn request_url(&self, ip: &str) -> String {
        format!("{}/{}?fields=status,countryCode,city", self.base_url, ip)
    }

    /// `Ok(None)` is the provider saying it has nothing for `ip`.
    async fn fetch(&self, ip: &str) -> Result<Option<GeoInfo>, reqwest::Error> {
        let body: IpApiResponse = self
            .client
            .get(self.request_url(ip))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        trace!("ip-api answered {} for {}", body.status, ip);
        Ok(parse_response(body))
    }
}

fn parse_response(body: IpApiResponse) -> Option<GeoInfo> {
    if body.status != "success" {
        return None;
    }

    let info = GeoInfo {
        country: body.country_code.filter(|s| !s.is_empty()),
        city: body.city.filter(|s| !s.is_empty()),
    };

    if info.country.is_none() && info.city.is_none() {
        return None;
    }

    Some(info)
}

#[async_trait]
impl GeoLookup for IpApiProvider {
    async fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        match self.cache.try_get_with(ip.to_owned(), self.fetch(ip)).await {
            Ok(info) => info,
            Err(e) => {
                debug!("geo lookup for {} failed: {}", ip, e);
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "ip-api"
    }
}
