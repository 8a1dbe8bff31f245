//! Read-side aggregation over an owner's click logs.
//!
//! Nothing is cached; every call recomputes from the store.

use crate::error::{AppError, AppResult};
use crate::models::{AnalyticsEvent, Click, DeviceType};
use crate::store::Store;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Upper bound (and default) for `GET /analytics`.
pub const MAX_EVENT_LIMIT: i64 = 1000;

/// One bucket of a categorical breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedCount {
    pub name: &'static str,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub value: u64,
}

/// Busiest day; `date` is null when there are no clicks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopDay {
    pub date: Option<NaiveDate>,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverTime {
    pub over_time: Vec<DailyCount>,
    pub top: TopDay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub short_links_count: i64,
    pub qr_codes_count: i64,
    pub device_data: Vec<NamedCount>,
}

/// Breakdown for a single link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAnalytics {
    pub total_clicks: u64,
    pub mobile_clicks: u64,
    pub desktop_clicks: u64,
    pub regional_data: BTreeMap<String, u64>,
}

/// Fold a device type into the four dashboard buckets.
fn bucket_index(device: DeviceType) -> usize {
    match device {
        DeviceType::Desktop => 0,
        DeviceType::Mobile => 1,
        DeviceType::Tablet => 2,
        DeviceType::SmartTv | DeviceType::Wearable | DeviceType::Embedded | DeviceType::Unknown => 3,
    }
}

/// Desktop, Mobile, Tablet and Unknown counts; all four are always present.
pub fn device_distribution(clicks: &[Click]) -> Vec<NamedCount> {
    let mut counts = [0u64; 4];
    for click in clicks {
        counts[bucket_index(click.device_type)] += 1;
    }

    ["Desktop", "Mobile", "Tablet", "Unknown"]
        .into_iter()
        .zip(counts)
        .map(|(name, value)| NamedCount { name, value })
        .collect()
}

/// Clicks per UTC calendar day, ascending, plus the busiest day.
///
/// When several days share the maximum the earliest one wins.
pub fn clicks_over_time(clicks: &[Click]) -> OverTime {
    let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for click in clicks {
        *per_day.entry(click.timestamp.date_naive()).or_default() += 1;
    }

    let mut top = TopDay {
        date: None,
        value: 0,
    };
    for (date, value) in &per_day {
        if *value > top.value {
            top = TopDay {
                date: Some(*date),
                value: *value,
            };
        }
    }

    OverTime {
        over_time: per_day
            .into_iter()
            .map(|(date, value)| DailyCount { date, value })
            .collect(),
        top,
    }
}

pub fn link_breakdown(clicks: &[Click]) -> LinkAnalytics {
    let mut analytics = LinkAnalytics {
        total_clicks: clicks.len() as u64,
        mobile_clicks: 0,
        desktop_clicks: 0,
        regional_data: BTreeMap::new(),
    };

    for click in clicks {
        match click.device_type {
            DeviceType::Mobile => analytics.mobile_clicks += 1,
            DeviceType::Desktop => analytics.desktop_clicks += 1,
            _ => {}
        }
        *analytics
            .regional_data
            .entry(click.region.clone())
            .or_default() += 1;
    }

    analytics
}

/// Owner-scoped analytics queries.
pub struct AnalyticsService<'a> {
    store: &'a dyn Store,
}

impl<'a> AnalyticsService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn device(&self, owner_id: i64) -> AppResult<Vec<NamedCount>> {
        let clicks = self.store.clicks_for_owner(owner_id).await?;
        Ok(device_distribution(&clicks))
    }

    pub async fn over_time(&self, owner_id: i64) -> AppResult<OverTime> {
        let clicks = self.store.clicks_for_owner(owner_id).await?;
        Ok(clicks_over_time(&clicks))
    }

    pub async fn summary(&self, owner_id: i64) -> AppResult<Summary> {
        let short_links_count = self.store.count_links(owner_id).await?;
        let qr_codes_count = self.store.count_qr(owner_id).await?;
        let clicks = self.store.clicks_for_owner(owner_id).await?;

        Ok(Summary {
            short_links_count,
            qr_codes_count,
            device_data: device_distribution(&clicks),
        })
    }

    /// Breakdown for one of the owner's links, addressed by short code.
    pub async fn for_link(&self, owner_id: i64, short_code: &str) -> AppResult<LinkAnalytics> {
        let link = self
            .store
            .find_link_by_code(short_code)
            .await?
            .ok_or_else(|| AppError::NotFound("Link not found".to_string()))?;

        if link.owner_id != owner_id {
            return Err(AppError::Forbidden("User not authorized".to_string()));
        }

        let link = self
            .store
            .find_link(link.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Link not found".to_string()))?;

        Ok(link_breakdown(&link.clicks))
    }

    /// Raw event log, newest first.
    pub async fn events(
        &self,
        owner_id: i64,
        short_code: Option<String>,
        limit: Option<i64>,
    ) -> AppResult<Vec<AnalyticsEvent>> {
        let limit = limit.unwrap_or(MAX_EVENT_LIMIT).clamp(1, MAX_EVENT_LIMIT);
        self.store.list_events(owner_id, short_code, limit).await
    }
}
