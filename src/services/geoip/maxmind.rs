use super::{parse_ip, GeoInfo, GeoLookup};
use async_trait::async_trait;
use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::trace;

/// Offline lookups against a MaxMind GeoLite2/GeoIP2 City database.
pub struct MaxMindProvider {
    reader: Arc<Reader<Vec<u8>>>,
}

impl MaxMindProvider {
    pub fn new(path: &str) -> Result<Self, maxminddb::MaxMindDbError> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// `None` when the database has no record, or a record with neither field.
    fn city_for(&self, addr: IpAddr) -> Option<GeoInfo> {
        let record: geoip2::City = self.reader.lookup(addr).ok()?.decode().ok()??;

        let info = GeoInfo {
            country: non_empty(record.country.iso_code),
            city: non_empty(record.city.names.english),
        };

        (info.country.is_some() || info.city.is_some()).then_some(info)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_owned)
}

#[async_trait]
impl GeoLookup for MaxMindProvider {
    async fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        let addr = parse_ip(ip)?;
        let info = self.city_for(addr);
        trace!(ip, ?info, "MaxMind lookup");
        info
    }

    fn name(&self) -> &'static str {
        "MaxMind"
    }
}
