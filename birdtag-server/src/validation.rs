//! Request validation helpers

use birdtag_core::{BirdtagError, FileType};

use crate::error::ApiError;

/// Content-Type families accepted for uploads besides the media types.
const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

/// A required, non-blank field. Returns the trimmed value.
pub fn require_field<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(BirdtagError::validation(format!("{name} is required")).into()),
    }
}

/// Check an uploaded file and classify it.
///
/// - the file name must carry a supported media extension
/// - a media Content-Type (`image/*`, `video/*`, `audio/*`) must match the
///   extension's media type; `application/octet-stream` or no Content-Type
///   is accepted as is
/// - the size must not exceed `max_size`
pub fn validate_upload(
    file_name: &str,
    content_type: Option<&str>,
    size: usize,
    max_size: usize,
) -> Result<FileType, ApiError> {
    validate_file_size(size, max_size)?;
    let file_type = FileType::classify(file_name)?;

    if let Some(ct) = content_type {
        let ct = ct.to_lowercase();
        let family = ct.split('/').next().unwrap_or_default();
        let accepted = ct.starts_with(GENERIC_CONTENT_TYPE) || family == file_type.as_str();
        if !accepted {
            return Err(ApiError::bad_request(format!(
                "Content-Type '{ct}' does not match {file_type} file '{file_name}'"
            )));
        }
    }
    Ok(file_type)
}

/// Validates the size of an uploaded file
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size > max_size {
        let max_mb = max_size / (1024 * 1024);
        let actual_mb = size / (1024 * 1024);
        Err(ApiError::bad_request(format!(
            "File too large: {} MB exceeds maximum of {} MB",
            actual_mb, max_mb
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    const MAX: usize = 10 * 1024 * 1024;

    #[test]
    fn test_require_field() {
        assert_eq!(require_field("user_id", Some(" u1 ")).unwrap(), "u1");
        assert!(require_field("user_id", Some("")).is_err());
        assert!(require_field("user_id", None).is_err());
    }

    #[test]
    fn test_upload_classified_by_extension() {
        assert_eq!(
            validate_upload("bird.JPG", Some("image/jpeg"), 10, MAX).unwrap(),
            FileType::Image
        );
        assert_eq!(
            validate_upload("clip.mov", Some("application/octet-stream"), 10, MAX).unwrap(),
            FileType::Video
        );
        assert_eq!(validate_upload("call.mp3", None, 10, MAX).unwrap(), FileType::Audio);
    }

    #[test]
    fn test_upload_unsupported_extension() {
        let err = validate_upload("notes.txt", Some("text/plain"), 10, MAX).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_upload_content_type_mismatch() {
        let err = validate_upload("bird.jpg", Some("audio/wav"), 10, MAX).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(validate_upload("bird.jpg", Some("text/html"), 10, MAX).is_err());
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(MAX, MAX).is_ok());
        assert!(validate_file_size(MAX + 1, MAX).is_err());
    }
}
