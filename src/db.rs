use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    AnalyticsEvent, Click, DeviceType, Link, LinkChanges, NewAnalyticsEvent, NewLink, QrCode,
    User,
};
use crate::store::{Stats, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    ConnectOptions, FromRow, PgPool,
};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

const LINK_COLUMNS: &str =
    "id, owner_id, original_url, short_code, title, created_at, expires_at, is_active";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct Repository {
    pub(crate) pool: PgPool,
}

/// Click row as stored; the device type is kept as text.
#[derive(Debug, FromRow)]
struct ClickRow {
    link_id: i64,
    clicked_at: DateTime<Utc>,
    device_type: String,
    region: String,
    user_agent: Option<String>,
}

impl From<ClickRow> for Click {
    fn from(row: ClickRow) -> Self {
        Click {
            timestamp: row.clicked_at,
            device_type: row.device_type.parse().unwrap_or(DeviceType::Unknown),
            region: row.region,
            user_agent: row.user_agent,
        }
    }
}

/// Translate a unique-constraint violation on `links.short_code` into `DuplicateSlug`.
fn map_short_code_conflict(err: sqlx::Error, short_code: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::DuplicateSlug(short_code.to_string())
        }
        _ => AppError::Database(err),
    }
}

impl Repository {
    /// Create a new repository with a connection pool
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout_seconds: u64,
    ) -> AppResult<Self> {
        let options = PgConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Configuration(format!("Invalid database URL: {}", e)))?
            .disable_statement_logging();

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_seconds))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Connect using the database section of the configuration
    pub async fn from_config(config: &DatabaseConfig) -> AppResult<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| AppError::MissingEnvVar("DATABASE_URL".to_string()))?;

        Self::new(
            url,
            config.max_connections,
            config.min_connections,
            config.acquire_timeout_seconds,
        )
        .await
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Load the click logs of `links` in one query and embed them in timestamp order.
    async fn attach_clicks(&self, mut links: Vec<Link>) -> AppResult<Vec<Link>> {
        if links.is_empty() {
            return Ok(links);
        }

        let ids: Vec<i64> = links.iter().map(|l| l.id).collect();
        let rows = sqlx::query_as::<_, ClickRow>(
            r#"
            SELECT link_id, clicked_at, device_type, region, user_agent
            FROM clicks
            WHERE link_id = ANY($1)
            ORDER BY clicked_at ASC, id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_link: HashMap<i64, Vec<Click>> = HashMap::new();
        for row in rows {
            by_link.entry(row.link_id).or_default().push(row.into());
        }
        for link in &mut links {
            link.clicks = by_link.remove(&link.id).unwrap_or_default();
        }

        Ok(links)
    }

    async fn attach_clicks_one(&self, link: Option<Link>) -> AppResult<Option<Link>> {
        match link {
            Some(link) => Ok(self.attach_clicks(vec![link]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Store for Repository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, password_hash, is_active
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Validation(format!("Username already taken: {}", username))
            }
            _ => AppError::Database(err),
        })
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, is_active FROM users WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn insert_link(&self, link: NewLink) -> AppResult<Link> {
        let query = format!(
            r#"
            INSERT INTO links (owner_id, original_url, short_code, title, created_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            RETURNING {}
            "#,
            LINK_COLUMNS
        );

        sqlx::query_as::<_, Link>(&query)
            .bind(link.owner_id)
            .bind(&link.original_url)
            .bind(&link.short_code)
            .bind(&link.title)
            .bind(link.created_at)
            .bind(link.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_short_code_conflict(e, &link.short_code))
    }

    async fn find_link(&self, id: i64) -> AppResult<Option<Link>> {
        let query = format!("SELECT {} FROM links WHERE id = $1", LINK_COLUMNS);
        let link = sqlx::query_as::<_, Link>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        self.attach_clicks_one(link).await
    }

    async fn find_link_by_code(&self, short_code: &str) -> AppResult<Option<Link>> {
        // The redirect path never needs the click log.
        let query = format!("SELECT {} FROM links WHERE short_code = $1", LINK_COLUMNS);
        let link = sqlx::query_as::<_, Link>(&query)
            .bind(short_code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(link)
    }

    async fn list_links(&self, owner_id: i64) -> AppResult<Vec<Link>> {
        let query = format!(
            "SELECT {} FROM links WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
            LINK_COLUMNS
        );
        let links = sqlx::query_as::<_, Link>(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        self.attach_clicks(links).await
    }

    async fn update_link(&self, id: i64, changes: LinkChanges) -> AppResult<Option<Link>> {
        let query = format!(
            r#"
            UPDATE links
            SET title = CASE WHEN $7 THEN $2 ELSE title END,
                original_url = COALESCE($3, original_url),
                short_code = COALESCE($4, short_code),
                is_active = COALESCE($5, is_active),
                expires_at = CASE WHEN $8 THEN $6 ELSE expires_at END
            WHERE id = $1
            RETURNING {}
            "#,
            LINK_COLUMNS
        );

        let short_code = changes.short_code.clone().unwrap_or_default();
        let set_title = changes.title.is_some();
        let set_expiry = changes.expires_at.is_some();
        let link = sqlx::query_as::<_, Link>(&query)
            .bind(id)
            .bind(changes.title.flatten())
            .bind(changes.original_url)
            .bind(changes.short_code)
            .bind(changes.is_active)
            .bind(changes.expires_at.flatten())
            .bind(set_title)
            .bind(set_expiry)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_short_code_conflict(e, &short_code))?;

        self.attach_clicks_one(link).await
    }

    async fn delete_link(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM links WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn short_code_exists(&self, short_code: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM links WHERE short_code = $1)",
        )
        .bind(short_code)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn count_links(&self, owner_id: i64) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM links WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn append_click(&self, link_id: i64, click: Click) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clicks (link_id, clicked_at, device_type, region, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(link_id)
        .bind(click.timestamp)
        .bind(click.device_type.as_str())
        .bind(&click.region)
        .bind(&click.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clicks_for_owner(&self, owner_id: i64) -> AppResult<Vec<Click>> {
        let rows = sqlx::query_as::<_, ClickRow>(
            r#"
            SELECT c.link_id, c.clicked_at, c.device_type, c.region, c.user_agent
            FROM clicks c
            JOIN links l ON l.id = c.link_id
            WHERE l.owner_id = $1
            ORDER BY c.clicked_at ASC, c.id ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Click::from).collect())
    }

    async fn record_event(&self, event: NewAnalyticsEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO analytics_events
                (owner_id, short_code, link_id, timestamp, ip, referrer, device_type, user_agent, country, city)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(event.owner_id)
        .bind(&event.short_code)
        .bind(event.link_id)
        .bind(event.timestamp)
        .bind(&event.ip)
        .bind(&event.referrer)
        .bind(event.device_type.as_str())
        .bind(&event.user_agent)
        .bind(&event.country)
        .bind(&event.city)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_events(
        &self,
        owner_id: i64,
        short_code: Option<String>,
        limit: i64,
    ) -> AppResult<Vec<AnalyticsEvent>> {
        let events = sqlx::query_as::<_, AnalyticsEvent>(
            r#"
            SELECT id, owner_id, short_code, link_id, timestamp, ip, referrer,
                   device_type, user_agent, country, city
            FROM analytics_events
            WHERE owner_id = $1 AND ($2::TEXT IS NULL OR short_code = $2)
            ORDER BY timestamp DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(owner_id)
        .bind(short_code)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn insert_qr(
        &self,
        owner_id: i64,
        text: &str,
        image_url: Option<String>,
    ) -> AppResult<QrCode> {
        let qr = sqlx::query_as::<_, QrCode>(
            r#"
            INSERT INTO qr_codes (owner_id, text, image_url, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, text, image_url, created_at
            "#,
        )
        .bind(owner_id)
        .bind(text)
        .bind(image_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(qr)
    }

    async fn find_qr(&self, id: i64) -> AppResult<Option<QrCode>> {
        let qr = sqlx::query_as::<_, QrCode>(
            "SELECT id, owner_id, text, image_url, created_at FROM qr_codes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(qr)
    }

    async fn find_qr_by_text(&self, owner_id: i64, text: &str) -> AppResult<Option<QrCode>> {
        let qr = sqlx::query_as::<_, QrCode>(
            r#"
            SELECT id, owner_id, text, image_url, created_at
            FROM qr_codes
            WHERE owner_id = $1 AND text = $2
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(owner_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;

        Ok(qr)
    }

    async fn list_qr(&self, owner_id: i64) -> AppResult<Vec<QrCode>> {
        let qr_codes = sqlx::query_as::<_, QrCode>(
            r#"
            SELECT id, owner_id, text, image_url, created_at
            FROM qr_codes
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(qr_codes)
    }

    async fn count_qr(&self, owner_id: i64) -> AppResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM qr_codes WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn delete_qr(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM qr_codes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_links(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM links WHERE expires_at IS NOT NULL AND expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn stats(&self, now: DateTime<Utc>) -> AppResult<Stats> {
        let row = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM links) AS total_links,
                (SELECT COUNT(*) FROM clicks) AS total_clicks,
                (SELECT COUNT(*) FROM links WHERE is_active AND (expires_at IS NULL OR expires_at >= $1)) AS active_links,
                (SELECT COUNT(*) FROM links WHERE expires_at IS NOT NULL AND expires_at < $1) AS expired_links
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Stats {
            total_links: row.0,
            total_clicks: row.1,
            active_links: row.2,
            expired_links: row.3,
        })
    }
}
