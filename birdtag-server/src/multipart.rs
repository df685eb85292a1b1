//! Multipart form parsing for media uploads
//!
//! Both upload endpoints take `multipart/form-data` with a `file` part and a
//! `user_id` text part. The file part is checked while it is read.

use std::collections::HashMap;

use axum::extract::Multipart;
use birdtag_core::FileType;

use crate::error::ApiError;
use crate::validation::{require_field, validate_upload};

/// A validated uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub data: Vec<u8>,
    pub file_type: FileType,
    /// Extension including the leading dot, lowercased
    pub extension: String,
    pub content_type: Option<String>,
}

/// Parsed multipart form fields
#[derive(Debug)]
pub struct UploadForm {
    file: Option<UploadedFile>,
    text_fields: HashMap<String, String>,
}

impl UploadForm {
    /// Parse all fields of an upload request, rejecting files that are too
    /// large, of an unsupported type, or whose Content-Type disagrees with the
    /// file name.
    pub async fn parse(multipart: &mut Multipart, max_file_size: usize) -> Result<Self, ApiError> {
        let mut file = None;
        let mut text_fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == "file" {
                let content_type = field.content_type().map(|s| s.to_string());
                let file_name = field.file_name().unwrap_or_default().to_string();

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?
                    .to_vec();

                let file_type =
                    validate_upload(&file_name, content_type.as_deref(), data.len(), max_file_size)?;
                let extension = birdtag_core::media::extension_of(&file_name)
                    .map(|ext| format!(".{}", ext.to_lowercase()))
                    .unwrap_or_default();

                file = Some(UploadedFile {
                    data,
                    file_type,
                    extension,
                    content_type,
                });
            } else {
                let value = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read field '{}': {}", name, e))
                })?;
                text_fields.insert(name, value);
            }
        }

        Ok(Self { file, text_fields })
    }

    /// Take the uploaded file. Missing file is a validation error.
    pub fn take_file(&mut self) -> Result<UploadedFile, ApiError> {
        self.file.take().ok_or_else(|| {
            ApiError::from(birdtag_core::BirdtagError::validation(
                "No file provided. Use 'file' field in multipart form.",
            ))
        })
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.text_fields.get(name).map(|s| s.as_str())
    }

    /// A required, non-blank text field
    pub fn require_text(&self, name: &str) -> Result<&str, ApiError> {
        require_field(name, self.get_text(name))
    }
}
