//! Short code resolution.
//!
//! `Lookup → NotFound | Expired | Inactive | Valid`. Only `Valid` produces a
//! redirect target, and only `Valid` records a click. Recording happens on the
//! background worker so the response never waits on it.

use crate::error::{AppError, AppResult};
use crate::jobs::{ClickJob, JobSender};
use crate::models::Link;
use crate::store::Store;
use chrono::{DateTime, Utc};

/// Outcome of checking a stored link against the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Expired,
    Inactive,
    Valid,
}

/// Expiry wins over the active flag.
pub fn evaluate(link: &Link, now: DateTime<Utc>) -> LinkState {
    if link.is_expired_at(now) {
        LinkState::Expired
    } else if !link.is_active {
        LinkState::Inactive
    } else {
        LinkState::Valid
    }
}

/// Request metadata captured for analytics.
#[derive(Debug, Clone)]
pub struct Visit {
    pub timestamp: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

pub struct Redirector<'a> {
    store: &'a dyn Store,
    jobs: &'a JobSender,
}

impl<'a> Redirector<'a> {
    pub fn new(store: &'a dyn Store, jobs: &'a JobSender) -> Self {
        Self { store, jobs }
    }

    /// Resolve `short_code` to its destination and queue the click.
    pub async fn resolve(&self, short_code: &str, visit: Visit) -> AppResult<String> {
        let link = self
            .store
            .find_link_by_code(short_code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Short code not found: {}", short_code)))?;

        match evaluate(&link, visit.timestamp) {
            LinkState::Expired => Err(AppError::Expired(link.short_code)),
            LinkState::Inactive => Err(AppError::Inactive(link.short_code)),
            LinkState::Valid => {
                self.jobs.record_click(ClickJob {
                    link_id: link.id,
                    owner_id: link.owner_id,
                    short_code: link.short_code,
                    visit,
                });
                Ok(link.original_url)
            }
        }
    }
}
