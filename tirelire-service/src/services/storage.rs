use async_trait::async_trait;
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use std::path::PathBuf;
use tokio::fs;

use super::ServiceError;
use crate::utils::UploadedImage;

pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "image/webp"];

/// Location of a stored upload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub file_name: String,
    pub url: String,
}

#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Checks type and size without writing anything.
    fn check(&self, image: &UploadedImage) -> Result<(), ServiceError>;
    async fn store(&self, image: UploadedImage) -> Result<StoredImage, ServiceError>;
    /// Delete an upload that ended up unreferenced. Missing files are not an error.
    async fn remove(&self, image: &StoredImage) -> Result<(), ServiceError>;
}

/// Writes uploads to a directory that is served under `/uploads`.
pub struct LocalImageStorage {
    base_path: PathBuf,
    public_base_url: String,
    max_bytes: usize,
}

impl LocalImageStorage {
    pub async fn new(
        base_path: impl Into<PathBuf>,
        api_url: &str,
        max_bytes: usize,
    ) -> Result<Self, ServiceError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServiceError::Storage(format!(
                "cannot create upload dir {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(Self {
            base_path,
            public_base_url: format!("{}/uploads", api_url.trim_end_matches('/')),
            max_bytes,
        })
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }
}

/// `tirelire-image-<millis>-<6 random alnum>.<ext>`
pub fn generate_file_name(image: &UploadedImage) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();

    format!(
        "tirelire-image-{}-{}.{}",
        Utc::now().timestamp_millis(),
        suffix,
        extension_for(image)
    )
}

fn extension_for(image: &UploadedImage) -> String {
    let from_name = image
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    from_name.unwrap_or_else(|| {
        match image.content_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpg",
        }
        .to_string()
    })
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    fn check(&self, image: &UploadedImage) -> Result<(), ServiceError> {
        if !ALLOWED_IMAGE_TYPES.contains(&image.content_type.as_str()) {
            return Err(ServiceError::Validation(
                "Seules les images sont autorisées (jpeg, png, webp)".to_string(),
            ));
        }
        if image.data.len() > self.max_bytes {
            return Err(ServiceError::Validation(format!(
                "L'image ne doit pas dépasser {} Mo",
                self.max_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }

    async fn store(&self, image: UploadedImage) -> Result<StoredImage, ServiceError> {
        self.check(&image)?;

        let file_name = generate_file_name(&image);
        let path = self.base_path.join(&file_name);

        fs::write(&path, &image.data).await.map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "Failed to write upload");
            ServiceError::Storage(e.to_string())
        })?;

        tracing::info!(
            file_name = %file_name,
            field = %image.field_name,
            size = image.data.len(),
            "Image stored"
        );

        Ok(StoredImage {
            url: format!("{}/{}", self.public_base_url, file_name),
            file_name,
        })
    }

    async fn remove(&self, image: &StoredImage) -> Result<(), ServiceError> {
        if image.file_name.contains(['/', '\\']) || image.file_name.starts_with('.') {
            return Err(ServiceError::Storage(format!(
                "refusing to remove {}",
                image.file_name
            )));
        }

        let path = self.base_path.join(&image.file_name);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(file_name = %image.file_name, "Image removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServiceError::Storage(e.to_string())),
        }
    }
}
