use axum::extract::Multipart;
use service_core::error::AppError;
use std::collections::HashMap;

/// Raw image part of a multipart form, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Multipart body split into text fields and file parts.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedImage>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Formulaire multipart invalide: {}", e))
        })? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if let Some(file_name) = field.file_name().map(str::to_string) {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Lecture du fichier impossible: {}", e))
                })?;

                form.files.insert(
                    name.clone(),
                    UploadedImage {
                        field_name: name,
                        file_name,
                        content_type,
                        data: data.to_vec(),
                    },
                );
            } else {
                let value = field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Champ invalide '{}': {}", name, e))
                })?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Trimmed text value, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedImage> {
        self.files.remove(name).filter(|f| !f.data.is_empty())
    }
}
