use crate::error::{AppError, AppResult};
use crate::models::{
    CreateLinkRequest, Link, LinkChanges, NewLink, UpdateLinkRequest, MAX_TITLE_CHARS,
};
use crate::services::qr::QrService;
use crate::services::short_code::ShortCodeService;
use crate::state::AppState;
use crate::store::Store;
use chrono::{DateTime, Duration, Utc};
use url::Url as UrlParser;
use validator::Validate;

/// How many times a freshly generated code may lose the insert race.
const INSERT_ATTEMPTS: u32 = 3;

/// Check a destination URL; with `strict` it must parse and use http(s).
pub fn validate_destination(url: &str, strict: bool) -> AppResult<()> {
    if !strict {
        return Ok(());
    }

    let parsed = UrlParser::parse(url)
        .map_err(|_| AppError::Validation("Invalid URL format".to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Validation(
            "URL must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

/// Expiry for a new link: explicit timestamp, then relative hours, then the
/// configured default. `None` means the link never expires.
fn resolve_expiry(
    expires_at: Option<DateTime<Utc>>,
    expiry_hours: Option<i64>,
    default_hours: Option<i64>,
    now: DateTime<Utc>,
) -> AppResult<Option<DateTime<Utc>>> {
    let expires_at = expires_at.or_else(|| {
        expiry_hours
            .or(default_hours)
            .map(|hours| now + Duration::hours(hours))
    });

    if let Some(at) = expires_at {
        if at <= now {
            return Err(AppError::Validation(
                "Expiry must be in the future".to_string(),
            ));
        }
    }

    Ok(expires_at)
}

/// Trimmed, non-empty value or `None`.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Owner-scoped link management.
pub struct LinkService<'a> {
    state: &'a AppState,
}

impl<'a> LinkService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn store(&self) -> &'a dyn Store {
        self.state.store.as_ref()
    }

    /// Create a link for `owner_id`, plus a QR record for its short URL.
    pub async fn create(&self, owner_id: i64, request: CreateLinkRequest) -> AppResult<Link> {
        request
            .validate()
            .map_err(|e| AppError::Validation(format!("Validation failed: {}", e)))?;

        let original_url = non_blank(request.original_url)
            .ok_or_else(|| AppError::Validation("Original URL is required.".to_string()))?;
        validate_destination(&original_url, self.state.strict_url_validation)?;

        let now = Utc::now();
        let new_link = NewLink {
            owner_id,
            original_url,
            short_code: String::new(),
            title: non_blank(request.title),
            created_at: now,
            expires_at: resolve_expiry(
                request.expires_at,
                request.expiry_hours,
                self.state.default_expiry_hours,
                now,
            )?,
        };

        let link = match non_blank(request.custom_slug) {
            Some(slug) => {
                let short_code = ShortCodeService::claim_custom(&slug, self.store()).await?;
                self.store()
                    .insert_link(NewLink {
                        short_code,
                        ..new_link
                    })
                    .await?
            }
            None => self.insert_with_generated_code(new_link).await?,
        };

        let link = link.with_short_url(&self.state.base_url);

        if let Err(e) = QrService::new(self.store())
            .ensure_for_text(owner_id, &link.shortened_url)
            .await
        {
            tracing::warn!(short_code = %link.short_code, "Failed to create QR code for link: {}", e);
        }

        tracing::info!(
            owner_id,
            short_code = %link.short_code,
            "Created link"
        );

        Ok(link)
    }

    /// The store's unique constraint decides races between concurrent creators;
    /// a lost race draws a fresh code.
    async fn insert_with_generated_code(&self, new_link: NewLink) -> AppResult<Link> {
        for attempt in 1..=INSERT_ATTEMPTS {
            let short_code = ShortCodeService::generate(
                self.state.short_code_length,
                self.state.short_code_max_attempts,
                self.store(),
            )
            .await?;

            match self
                .store()
                .insert_link(NewLink {
                    short_code,
                    ..new_link.clone()
                })
                .await
            {
                Err(AppError::DuplicateSlug(code)) => {
                    tracing::debug!(attempt, code = %code, "Lost short code race, retrying");
                }
                result => return result,
            }
        }

        Err(AppError::CodeSpaceExhausted)
    }

    pub async fn list(&self, owner_id: i64) -> AppResult<Vec<Link>> {
        let links = self.store().list_links(owner_id).await?;
        Ok(links
            .into_iter()
            .map(|link| link.with_short_url(&self.state.base_url))
            .collect())
    }

    /// Load a link and check that `owner_id` owns it.
    async fn find_owned(&self, owner_id: i64, id: i64) -> AppResult<Link> {
        let link = self
            .store()
            .find_link(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Link not found".to_string()))?;

        if link.owner_id != owner_id {
            return Err(AppError::Forbidden("User not authorized".to_string()));
        }

        Ok(link)
    }

    pub async fn update(
        &self,
        owner_id: i64,
        id: i64,
        request: UpdateLinkRequest,
    ) -> AppResult<Link> {
        let link = self.find_owned(owner_id, id).await?;

        // Blank titles clear like an explicit null
        let title = request.title.map(non_blank);
        if let Some(Some(title)) = &title {
            if title.chars().count() > MAX_TITLE_CHARS {
                return Err(AppError::Validation(format!(
                    "Title must be at most {} characters",
                    MAX_TITLE_CHARS
                )));
            }
        }

        let original_url = non_blank(request.original_url);
        if let Some(url) = &original_url {
            validate_destination(url, self.state.strict_url_validation)?;
        }

        let short_code = non_blank(request.short_code).filter(|code| *code != link.short_code);
        if let Some(code) = &short_code {
            ShortCodeService::claim_custom(code, self.store()).await?;
        }

        let changes = LinkChanges {
            title,
            original_url,
            short_code,
            is_active: request.is_active,
            expires_at: request.expires_at,
        };

        let updated = self
            .store()
            .update_link(id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("Link not found".to_string()))?;

        Ok(updated.with_short_url(&self.state.base_url))
    }

    pub async fn delete(&self, owner_id: i64, id: i64) -> AppResult<()> {
        let link = self.find_owned(owner_id, id).await?;

        if !self.store().delete_link(link.id).await? {
            return Err(AppError::NotFound("Link not found".to_string()));
        }

        tracing::info!(owner_id, short_code = %link.short_code, "Deleted link");
        Ok(())
    }
}
