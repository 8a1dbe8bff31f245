use crate::config::ImageHostConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use tracing::{debug, info};
use uuid::Uuid;

/// External storage for rendered QR images.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store `bytes` and return the public URL of the stored image.
    async fn upload(&self, owner_id: i64, bytes: Vec<u8>, content_type: &str) -> AppResult<String>;
}

/// File extension for an image content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "img",
    }
}

/// Object key for an owner's upload: `qr/<owner>/<uuid>.<ext>`.
pub fn object_key(owner_id: i64, content_type: &str) -> String {
    format!(
        "qr/{}/{}.{}",
        owner_id,
        Uuid::new_v4(),
        extension_for(content_type)
    )
}

/// Any S3-compatible bucket (AWS, MinIO, R2, ...).
pub struct S3ImageHost {
    bucket: Box<Bucket>,
    public_url: String,
}

impl S3ImageHost {
    /// Returns `Ok(None)` when no bucket is configured.
    pub fn from_config(config: &ImageHostConfig) -> AppResult<Option<Self>> {
        let Some(bucket_name) = config.bucket.as_deref() else {
            return Ok(None);
        };

        let public_url = config
            .public_url
            .as_deref()
            .ok_or_else(|| AppError::MissingEnvVar("S3_PUBLIC_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|e| AppError::Configuration(format!("Invalid S3_REGION: {:?}", e)))?,
        };

        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Configuration(format!("Invalid S3 credentials: {}", e)))?;

        let mut bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| AppError::Configuration(format!("Invalid S3 bucket: {}", e)))?;
        if config.endpoint.is_some() {
            bucket = bucket.with_path_style();
        }

        info!("Image hosting enabled: bucket {}", bucket_name);

        Ok(Some(Self { bucket, public_url }))
    }
}

#[async_trait]
impl ImageHost for S3ImageHost {
    async fn upload(&self, owner_id: i64, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        let key = object_key(owner_id, content_type);

        let response = self
            .bucket
            .put_object_with_content_type(&key, &bytes, content_type)
            .await
            .map_err(|e| AppError::Upstream(format!("Image upload failed: {}", e)))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(AppError::Upstream(format!(
                "Image upload rejected with status {}",
                status
            )));
        }

        debug!(key = %key, size = bytes.len(), "Uploaded QR image");

        Ok(format!("{}/{}", self.public_url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bucket: Option<&str>) -> ImageHostConfig {
        ImageHostConfig {
            bucket: bucket.map(String::from),
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            access_key: Some("minio".to_string()),
            secret_key: Some("minio-secret".to_string()),
            public_url: Some("http://localhost:9000/qr-bucket/".to_string()),
        }
    }

    #[test]
    fn test_object_key_layout() {
        let key = object_key(42, "image/png");
        assert!(key.starts_with("qr/42/"));
        assert!(key.ends_with(".png"));
        assert_ne!(key, object_key(42, "image/png"));
    }

    #[test]
    fn test_extension_for_unknown_type() {
        assert_eq!(extension_for("image/svg+xml"), "svg");
        assert_eq!(extension_for("image/x-fancy"), "img");
    }

    #[test]
    fn test_disabled_without_bucket() {
        assert!(S3ImageHost::from_config(&config(None)).unwrap().is_none());
    }

    #[test]
    fn test_enabled_with_bucket() {
        let host = S3ImageHost::from_config(&config(Some("qr-bucket")))
            .unwrap()
            .unwrap();
        assert_eq!(host.public_url, "http://localhost:9000/qr-bucket");
    }
}
