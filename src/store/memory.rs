use super::{Stats, Store};
use crate::error::{AppError, AppResult};
use crate::models::{
    AnalyticsEvent, Click, Link, LinkChanges, NewAnalyticsEvent, NewLink, QrCode, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    links: BTreeMap<i64, Link>,
    events: Vec<AnalyticsEvent>,
    qr_codes: BTreeMap<i64, QrCode>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn code_taken(&self, short_code: &str, except: Option<i64>) -> bool {
        self.links
            .values()
            .any(|l| l.short_code == short_code && Some(l.id) != except)
    }
}

/// In-process store. Every mutation happens under one write lock, which gives
/// the same per-record atomicity as the database backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, i64),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.username == username) {
            return Err(AppError::Validation(format!(
                "Username already taken: {}",
                username
            )));
        }
        let user = User {
            id: inner.next_id(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            is_active: true,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn insert_link(&self, link: NewLink) -> AppResult<Link> {
        let mut inner = self.inner.write().await;
        if inner.code_taken(&link.short_code, None) {
            return Err(AppError::DuplicateSlug(link.short_code));
        }
        let stored = Link {
            id: inner.next_id(),
            owner_id: link.owner_id,
            original_url: link.original_url,
            short_code: link.short_code,
            shortened_url: String::new(),
            title: link.title,
            created_at: link.created_at,
            expires_at: link.expires_at,
            is_active: true,
            clicks: Vec::new(),
        };
        inner.links.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_link(&self, id: i64) -> AppResult<Option<Link>> {
        Ok(self.inner.read().await.links.get(&id).cloned())
    }

    async fn find_link_by_code(&self, short_code: &str) -> AppResult<Option<Link>> {
        let inner = self.inner.read().await;
        Ok(inner
            .links
            .values()
            .find(|l| l.short_code == short_code)
            .cloned())
    }

    async fn list_links(&self, owner_id: i64) -> AppResult<Vec<Link>> {
        let inner = self.inner.read().await;
        let mut links: Vec<Link> = inner
            .links
            .values()
            .filter(|l| l.owner_id == owner_id)
            .cloned()
            .collect();
        newest_first(&mut links, |l| (l.created_at, l.id));
        Ok(links)
    }

    async fn update_link(&self, id: i64, changes: LinkChanges) -> AppResult<Option<Link>> {
        let mut inner = self.inner.write().await;
        if let Some(code) = &changes.short_code {
            if inner.code_taken(code, Some(id)) {
                return Err(AppError::DuplicateSlug(code.clone()));
            }
        }
        let Some(link) = inner.links.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            link.title = title;
        }
        if let Some(original_url) = changes.original_url {
            link.original_url = original_url;
        }
        if let Some(short_code) = changes.short_code {
            link.short_code = short_code;
        }
        if let Some(is_active) = changes.is_active {
            link.is_active = is_active;
        }
        if let Some(expires_at) = changes.expires_at {
            link.expires_at = expires_at;
        }
        Ok(Some(link.clone()))
    }

    async fn delete_link(&self, id: i64) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.links.remove(&id).is_none() {
            return Ok(false);
        }
        for event in inner.events.iter_mut().filter(|e| e.link_id == Some(id)) {
            event.link_id = None;
        }
        Ok(true)
    }

    async fn short_code_exists(&self, short_code: &str) -> AppResult<bool> {
        Ok(self.inner.read().await.code_taken(short_code, None))
    }

    async fn count_links(&self, owner_id: i64) -> AppResult<i64> {
        let inner = self.inner.read().await;
        Ok(inner.links.values().filter(|l| l.owner_id == owner_id).count() as i64)
    }

    async fn append_click(&self, link_id: i64, click: Click) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let link = inner
            .links
            .get_mut(&link_id)
            .ok_or_else(|| AppError::NotFound(format!("Link {} not found", link_id)))?;
        // Keep the log ordered even if a late worker delivers an older click.
        let at = link
            .clicks
            .partition_point(|c| c.timestamp <= click.timestamp);
        link.clicks.insert(at, click);
        Ok(())
    }

    async fn clicks_for_owner(&self, owner_id: i64) -> AppResult<Vec<Click>> {
        let inner = self.inner.read().await;
        Ok(inner
            .links
            .values()
            .filter(|l| l.owner_id == owner_id)
            .flat_map(|l| l.clicks.iter().cloned())
            .collect())
    }

    async fn record_event(&self, event: NewAnalyticsEvent) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let stored = AnalyticsEvent {
            id: inner.next_id(),
            owner_id: event.owner_id,
            short_code: event.short_code,
            link_id: Some(event.link_id),
            timestamp: event.timestamp,
            ip: event.ip,
            referrer: event.referrer,
            device_type: event.device_type.to_string(),
            user_agent: event.user_agent,
            country: event.country,
            city: event.city,
        };
        inner.events.push(stored);
        Ok(())
    }

    async fn list_events(
        &self,
        owner_id: i64,
        short_code: Option<String>,
        limit: i64,
    ) -> AppResult<Vec<AnalyticsEvent>> {
        let inner = self.inner.read().await;
        let mut events: Vec<AnalyticsEvent> = inner
            .events
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .filter(|e| short_code.as_ref().map_or(true, |code| &e.short_code == code))
            .cloned()
            .collect();
        newest_first(&mut events, |e| (e.timestamp, e.id));
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn insert_qr(
        &self,
        owner_id: i64,
        text: &str,
        image_url: Option<String>,
    ) -> AppResult<QrCode> {
        let mut inner = self.inner.write().await;
        let qr = QrCode {
            id: inner.next_id(),
            owner_id,
            text: text.to_string(),
            image_url,
            created_at: Utc::now(),
        };
        inner.qr_codes.insert(qr.id, qr.clone());
        Ok(qr)
    }

    async fn find_qr(&self, id: i64) -> AppResult<Option<QrCode>> {
        Ok(self.inner.read().await.qr_codes.get(&id).cloned())
    }

    async fn find_qr_by_text(&self, owner_id: i64, text: &str) -> AppResult<Option<QrCode>> {
        let inner = self.inner.read().await;
        Ok(inner
            .qr_codes
            .values()
            .find(|q| q.owner_id == owner_id && q.text == text)
            .cloned())
    }

    async fn list_qr(&self, owner_id: i64) -> AppResult<Vec<QrCode>> {
        let inner = self.inner.read().await;
        let mut qr_codes: Vec<QrCode> = inner
            .qr_codes
            .values()
            .filter(|q| q.owner_id == owner_id)
            .cloned()
            .collect();
        newest_first(&mut qr_codes, |q| (q.created_at, q.id));
        Ok(qr_codes)
    }

    async fn count_qr(&self, owner_id: i64) -> AppResult<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .qr_codes
            .values()
            .filter(|q| q.owner_id == owner_id)
            .count() as i64)
    }

    async fn delete_qr(&self, id: i64) -> AppResult<bool> {
        Ok(self.inner.write().await.qr_codes.remove(&id).is_some())
    }

    async fn delete_expired_links(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let expired: HashSet<i64> = inner
            .links
            .values()
            .filter(|l| l.is_expired_at(now))
            .map(|l| l.id)
            .collect();

        inner.links.retain(|id, _| !expired.contains(id));
        for event in inner.events.iter_mut() {
            if event.link_id.is_some_and(|id| expired.contains(&id)) {
                event.link_id = None;
            }
        }

        Ok(expired.len() as u64)
    }

    async fn stats(&self, now: DateTime<Utc>) -> AppResult<Stats> {
        let inner = self.inner.read().await;
        let expired_links = inner
            .links
            .values()
            .filter(|l| l.is_expired_at(now))
            .count() as i64;
        let active_links = inner
            .links
            .values()
            .filter(|l| l.is_active && !l.is_expired_at(now))
            .count() as i64;
        Ok(Stats {
            total_links: inner.links.len() as i64,
            total_clicks: inner.links.values().map(|l| l.clicks.len() as i64).sum(),
            active_links,
            expired_links,
        })
    }
}
