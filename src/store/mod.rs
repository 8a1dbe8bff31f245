//! Storage seam for links, clicks, analytics events, QR codes and users.
//!
//! Two implementations exist: [`crate::db::Repository`] (PostgreSQL) and
//! [`MemoryStore`] (in-process, used for local development and tests).
//! Both enforce global short-code uniqueness and report a violation as
//! [`AppError::DuplicateSlug`](crate::error::AppError::DuplicateSlug).

mod memory;

pub use memory::MemoryStore;

use crate::error::AppResult;
use crate::models::{
    AnalyticsEvent, Click, Link, LinkChanges, NewAnalyticsEvent, NewLink, QrCode, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Link totals used by the `admin stats` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_links: i64,
    pub total_clicks: i64,
    pub active_links: i64,
    pub expired_links: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap connectivity check for the health endpoint.
    async fn ping(&self) -> AppResult<()>;

    async fn create_user(&self, username: &str, password_hash: &str) -> AppResult<User>;

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Persist a new link. Fails with `DuplicateSlug` if the short code is taken.
    async fn insert_link(&self, link: NewLink) -> AppResult<Link>;

    async fn find_link(&self, id: i64) -> AppResult<Option<Link>>;

    async fn find_link_by_code(&self, short_code: &str) -> AppResult<Option<Link>>;

    /// All links of an owner, newest first, with clicks embedded.
    async fn list_links(&self, owner_id: i64) -> AppResult<Vec<Link>>;

    /// Apply `changes` to link `id`. Returns `None` if the link does not exist.
    async fn update_link(&self, id: i64, changes: LinkChanges) -> AppResult<Option<Link>>;

    /// Hard delete; clicks go with the link.
    async fn delete_link(&self, id: i64) -> AppResult<bool>;

    async fn short_code_exists(&self, short_code: &str) -> AppResult<bool>;

    async fn count_links(&self, owner_id: i64) -> AppResult<i64>;

    /// Atomically append one click to a link's log.
    async fn append_click(&self, link_id: i64, click: Click) -> AppResult<()>;

    /// Every click across every link of `owner_id`.
    async fn clicks_for_owner(&self, owner_id: i64) -> AppResult<Vec<Click>>;

    async fn record_event(&self, event: NewAnalyticsEvent) -> AppResult<()>;

    /// Owner's analytics events, newest first, optionally filtered by short code.
    async fn list_events(
        &self,
        owner_id: i64,
        short_code: Option<String>,
        limit: i64,
    ) -> AppResult<Vec<AnalyticsEvent>>;

    async fn insert_qr(
        &self,
        owner_id: i64,
        text: &str,
        image_url: Option<String>,
    ) -> AppResult<QrCode>;

    async fn find_qr(&self, id: i64) -> AppResult<Option<QrCode>>;

    async fn find_qr_by_text(&self, owner_id: i64, text: &str) -> AppResult<Option<QrCode>>;

    /// Owner's QR codes, newest first.
    async fn list_qr(&self, owner_id: i64) -> AppResult<Vec<QrCode>>;

    async fn count_qr(&self, owner_id: i64) -> AppResult<i64>;

    async fn delete_qr(&self, id: i64) -> AppResult<bool>;

    /// Delete links whose expiry is before `now`; returns how many were removed.
    async fn delete_expired_links(&self, now: DateTime<Utc>) -> AppResult<u64>;

    async fn stats(&self, now: DateTime<Utc>) -> AppResult<Stats>;
}
