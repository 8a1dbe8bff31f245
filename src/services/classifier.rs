//! Derives device category and coarse location from request metadata.

use crate::models::DeviceType;
use crate::services::geoip::GeoResolver;
use woothee::parser::Parser;

const SMART_TV_MARKERS: &[&str] = &[
    "smart-tv", "smarttv", "googletv", "appletv", "hbbtv", "roku", "netcast", "bravia", "crkey",
];
const WEARABLE_MARKERS: &[&str] = &["watchos", "watch os", "wear os", "wearos", "galaxy watch"];
const EMBEDDED_MARKERS: &[&str] = &["tesla", "qtcarbrowser"];
const TABLET_MARKERS: &[&str] = &["ipad", "tablet", "kindle", "silk/", "playbook"];

/// Map a user agent to a device category.
///
/// A missing user agent, or one the parser cannot place, counts as desktop:
/// redirect traffic without any mobile signal is overwhelmingly desktop browsers.
pub fn classify_device(user_agent: Option<&str>) -> DeviceType {
    let ua = match user_agent.map(str::trim) {
        Some(ua) if !ua.is_empty() => ua,
        _ => return DeviceType::Desktop,
    };

    let lower = ua.to_ascii_lowercase();
    let has_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    // Categories woothee does not distinguish.
    if has_any(SMART_TV_MARKERS) {
        return DeviceType::SmartTv;
    }
    if has_any(WEARABLE_MARKERS) {
        return DeviceType::Wearable;
    }
    if has_any(EMBEDDED_MARKERS) {
        return DeviceType::Embedded;
    }
    if has_any(TABLET_MARKERS) || (lower.contains("android") && !lower.contains("mobile")) {
        return DeviceType::Tablet;
    }

    match Parser::new().parse(ua).map(|result| result.category) {
        Some("pc") => DeviceType::Desktop,
        Some("smartphone") | Some("mobilephone") => DeviceType::Mobile,
        Some("appliance") => DeviceType::Embedded,
        Some("crawler") | Some("misc") => DeviceType::Unknown,
        _ => DeviceType::Desktop,
    }
}

/// Everything derived about one visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub device_type: DeviceType,
    pub country: Option<String>,
    pub city: Option<String>,
}

impl Classification {
    /// Region string stored on a click.
    pub fn region(&self) -> String {
        self.country
            .clone()
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Clone)]
pub struct RequestClassifier {
    geo: GeoResolver,
}

impl RequestClassifier {
    pub fn new(geo: GeoResolver) -> Self {
        Self { geo }
    }

    /// Never fails; unknown location degrades to empty fields.
    pub async fn classify(&self, ip: Option<&str>, user_agent: Option<&str>) -> Classification {
        let device_type = classify_device(user_agent);
        let geo = match ip {
            Some(ip) => self.geo.lookup(ip).await,
            None => Default::default(),
        };

        Classification {
            device_type,
            country: geo.country,
            city: geo.city,
        }
    }
}
