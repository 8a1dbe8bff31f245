use crate::error::{AppError, AppResult};
use crate::models::QrCode;
use crate::services::image_host::ImageHost;
use crate::store::Store;

/// A rendered QR image received from the client.
#[derive(Debug, Clone)]
pub struct QrImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// QR code records; every operation is scoped to one owner.
pub struct QrService<'a> {
    store: &'a dyn Store,
}

impl<'a> QrService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    fn require_text(text: Option<&str>) -> AppResult<&str> {
        text.map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Validation("Text is required.".to_string()))
    }

    pub async fn create(&self, owner_id: i64, text: Option<&str>) -> AppResult<QrCode> {
        let text = Self::require_text(text)?;
        self.store.insert_qr(owner_id, text, None).await
    }

    pub async fn list(&self, owner_id: i64) -> AppResult<Vec<QrCode>> {
        self.store.list_qr(owner_id).await
    }

    pub async fn delete(&self, owner_id: i64, id: i64) -> AppResult<()> {
        let qr = self
            .store
            .find_qr(id)
            .await?
            .ok_or_else(|| AppError::NotFound("QR code not found".to_string()))?;

        if qr.owner_id != owner_id {
            return Err(AppError::Forbidden("User not authorized".to_string()));
        }

        if !self.store.delete_qr(id).await? {
            return Err(AppError::NotFound("QR code not found".to_string()));
        }

        Ok(())
    }

    /// The owner's QR record for `text`, created if missing.
    pub async fn ensure_for_text(&self, owner_id: i64, text: &str) -> AppResult<QrCode> {
        if let Some(existing) = self.store.find_qr_by_text(owner_id, text).await? {
            return Ok(existing);
        }

        self.store.insert_qr(owner_id, text, None).await
    }

    /// Host the image externally and record a QR code pointing at it.
    pub async fn upload(
        &self,
        owner_id: i64,
        text: Option<&str>,
        image: QrImage,
        host: Option<&dyn ImageHost>,
    ) -> AppResult<QrCode> {
        let text = Self::require_text(text)?;

        if image.bytes.is_empty() {
            return Err(AppError::Validation("QR image is required.".to_string()));
        }
        if !image.content_type.starts_with("image/") {
            return Err(AppError::Validation(
                "QR image must be an image file".to_string(),
            ));
        }

        let host = host
            .ok_or_else(|| AppError::Upstream("Image hosting is not configured".to_string()))?;

        let image_url = host
            .upload(owner_id, image.bytes, &image.content_type)
            .await?;

        tracing::info!(owner_id, image_url = %image_url, "Uploaded QR code image");

        self.store.insert_qr(owner_id, text, Some(image_url)).await
    }
}
