//! Input validation module

use crate::engine::priority;
use crate::models::SubmitComplaintRequest;
use thiserror::Error;
use validator::Validate;

/// Longest photo id accepted; ids become file names on disk.
const MAX_PHOTO_ID_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' is too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    #[error("Invalid public id format (expected CL-<timestamp>-<code>)")]
    InvalidPublicId,

    #[error("Invalid photo id (letters, digits, '-' and '_' only, max 128 characters)")]
    InvalidPhotoId,

    #[error("Invalid file type: {mime_type}")]
    InvalidFileType { mime_type: String },

    #[error("File content does not match declared type {declared}")]
    ContentMismatch { declared: String },

    #[error("File too large (max {max_mb} MB)")]
    FileTooLarge { max_mb: usize },

    #[error("{0}")]
    Invalid(String),
}

/// Run `validator` derive rules and fold the result into [`ValidationError`].
pub fn validate_request<T: Validate>(input: &T) -> Result<(), ValidationError> {
    input
        .validate()
        .map_err(|e| ValidationError::Invalid(e.to_string().replace('\n', "; ")))
}

/// Validate a complaint submission
pub fn validate_submit_complaint(input: &SubmitComplaintRequest) -> Result<(), ValidationError> {
    // Category
    if input.category.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "category".to_string(),
        });
    }
    if !priority::is_known_category(&input.category) {
        return Err(ValidationError::UnknownCategory(input.category.clone()));
    }

    // Description
    if input.description.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "description".to_string(),
        });
    }
    if input.description.len() > 5000 {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 5000,
        });
    }

    // Location
    if input.location.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "location".to_string(),
        });
    }
    if input.location.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "location".to_string(),
            max: 500,
        });
    }

    validate_photo_id(&input.photo_id)?;

    // Public id (optional, generated server-side when absent)
    if let Some(ref public_id) = input.public_id {
        validate_public_id(public_id)?;
    }

    Ok(())
}

/// Validate a public complaint id: `CL-<digits>-<lowercase alphanumerics>`
pub fn validate_public_id(public_id: &str) -> Result<(), ValidationError> {
    if public_id.len() > 64 {
        return Err(ValidationError::InvalidPublicId);
    }

    let mut parts = public_id.splitn(3, '-');
    let prefix = parts.next().unwrap_or_default();
    let timestamp = parts.next().unwrap_or_default();
    let code = parts.next().unwrap_or_default();

    let valid = prefix == "CL"
        && !timestamp.is_empty()
        && timestamp.chars().all(|c| c.is_ascii_digit())
        && !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());

    if !valid {
        return Err(ValidationError::InvalidPublicId);
    }
    Ok(())
}

/// Validate an opaque photo id. Ids are used as file names, so only a safe
/// character set is allowed.
pub fn validate_photo_id(photo_id: &str) -> Result<(), ValidationError> {
    if photo_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "photo_id".to_string(),
        });
    }

    let is_valid = photo_id.len() <= MAX_PHOTO_ID_LEN
        && photo_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && !photo_id.starts_with('-');

    if !is_valid {
        return Err(ValidationError::InvalidPhotoId);
    }
    Ok(())
}

/// Allowed photo MIME types
const ALLOWED_PHOTO_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/heic"];

/// Validate uploaded photo metadata
pub fn validate_photo_upload(
    mime_type: &str,
    file_size: usize,
    max_size_bytes: usize,
) -> Result<(), ValidationError> {
    if file_size == 0 {
        return Err(ValidationError::Required {
            field: "photo".to_string(),
        });
    }

    if file_size > max_size_bytes {
        return Err(ValidationError::FileTooLarge {
            max_mb: max_size_bytes / (1024 * 1024),
        });
    }

    if !ALLOWED_PHOTO_TYPES.contains(&mime_type) {
        return Err(ValidationError::InvalidFileType {
            mime_type: mime_type.to_string(),
        });
    }

    Ok(())
}

/// Check the magic bytes of a photo against its declared MIME type
pub fn validate_photo_content(declared: &str, data: &[u8]) -> Result<(), ValidationError> {
    match infer::get(data) {
        Some(kind) if kind.mime_type() == declared => Ok(()),
        // infer reports HEIF containers under either name
        Some(kind) if declared == "image/heic" && kind.mime_type() == "image/heif" => Ok(()),
        _ => Err(ValidationError::ContentMismatch {
            declared: declared.to_string(),
        }),
    }
}

/// Extensions that must never be stored, even disguised as a photo
const DANGEROUS_EXTENSIONS: &[&str] = &[
    ".php", ".phtml", ".asp", ".aspx", ".jsp", ".cgi", ".pl", ".py", ".rb", ".exe", ".bat",
    ".cmd", ".com", ".msi", ".dll", ".sh", ".js", ".mjs", ".html", ".htm", ".svg", ".htaccess",
    ".jar",
];

/// Check the original filename for dangerous extensions, including double
/// extensions such as `shell.php.jpg`
pub fn validate_filename_extensions(filename: &str) -> Result<(), ValidationError> {
    let lower = filename.to_lowercase();

    for ext in DANGEROUS_EXTENSIONS {
        let double_ext_pattern = format!("{}.", ext);
        if lower.ends_with(ext) || lower.contains(&double_ext_pattern) {
            return Err(ValidationError::InvalidFileType {
                mime_type: format!("filename contains dangerous extension: {}", ext),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedbackRequest, RegisterRequest};

    fn submission() -> SubmitComplaintRequest {
        SubmitComplaintRequest {
            category: "Pothole".to_string(),
            description: "Deep pothole in the left lane".to_string(),
            location: "Main Street near City Hall".to_string(),
            photo_id: "photo_01HQ-abc".to_string(),
            public_id: Some("CL-1709283600000-k3j9x2m1q".to_string()),
        }
    }

    #[test]
    fn test_validate_submit_complaint_valid() {
        assert!(validate_submit_complaint(&submission()).is_ok());

        let mut without_public_id = submission();
        without_public_id.public_id = None;
        assert!(validate_submit_complaint(&without_public_id).is_ok());
    }

    #[test]
    fn test_validate_submit_complaint_empty_fields() {
        let mut input = submission();
        input.description = "   ".to_string();
        assert!(matches!(
            validate_submit_complaint(&input),
            Err(ValidationError::Required { .. })
        ));

        let mut input = submission();
        input.location = String::new();
        assert!(matches!(
            validate_submit_complaint(&input),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_submit_complaint_unknown_category() {
        let mut input = submission();
        input.category = "Alien landing".to_string();
        assert!(matches!(
            validate_submit_complaint(&input),
            Err(ValidationError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_validate_submit_complaint_priority_label() {
        for label in ["High Priority", "Moderate Priority", "Low Priority"] {
            let mut input = submission();
            input.category = label.to_string();
            assert!(validate_submit_complaint(&input).is_ok(), "{label} rejected");
        }
    }

    #[test]
    fn test_validate_submit_complaint_long_description() {
        let mut input = submission();
        input.description = "x".repeat(5001);
        assert!(matches!(
            validate_submit_complaint(&input),
            Err(ValidationError::TooLong { max: 5000, .. })
        ));
    }

    #[test]
    fn test_public_id_validation() {
        assert!(validate_public_id("CL-1709283600000-k3j9x2m1q").is_ok());
        assert!(validate_public_id("CL-1-a").is_ok());
        assert!(validate_public_id("cl-1709283600000-abc").is_err());
        assert!(validate_public_id("CL-17092a-abc").is_err());
        assert!(validate_public_id("CL-1709283600000-").is_err());
        assert!(validate_public_id("CL-1709283600000-ABC").is_err());
        assert!(validate_public_id("CL-1709283600000").is_err());
        assert!(validate_public_id(&format!("CL-1-{}", "a".repeat(70))).is_err());
    }

    #[test]
    fn test_photo_id_validation() {
        assert!(validate_photo_id("before_2024-03-01_abc").is_ok());
        assert!(validate_photo_id("").is_err());
        assert!(validate_photo_id("../etc/passwd").is_err());
        assert!(validate_photo_id("photo.jpg").is_err());
        assert!(validate_photo_id("-leading").is_err());
        assert!(validate_photo_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_photo_upload() {
        assert!(validate_photo_upload("image/jpeg", 1024, 10 * 1024 * 1024).is_ok());
        assert!(matches!(
            validate_photo_upload("image/jpeg", 0, 10 * 1024 * 1024),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_photo_upload("image/png", 20 * 1024 * 1024, 10 * 1024 * 1024),
            Err(ValidationError::FileTooLarge { max_mb: 10 })
        ));
        assert!(matches!(
            validate_photo_upload("application/pdf", 1024, 10 * 1024 * 1024),
            Err(ValidationError::InvalidFileType { .. })
        ));
    }

    #[test]
    fn test_validate_photo_content() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];
        assert!(validate_photo_content("image/png", &png).is_ok());
        assert!(validate_photo_content("image/jpeg", &jpeg).is_ok());
        assert!(matches!(
            validate_photo_content("image/jpeg", &png),
            Err(ValidationError::ContentMismatch { .. })
        ));
        assert!(validate_photo_content("image/png", b"<?php echo 1; ?>").is_err());
    }

    #[test]
    fn test_validate_filename_extensions() {
        assert!(validate_filename_extensions("pothole.jpg").is_ok());
        assert!(validate_filename_extensions("IMG_2041.HEIC").is_ok());
        assert!(validate_filename_extensions("shell.php").is_err());
        assert!(validate_filename_extensions("image.exe.jpg").is_err());
        assert!(validate_filename_extensions("vector.SVG").is_err());
    }

    #[test]
    fn test_validate_request_rules() {
        let short_password = RegisterRequest {
            username: "citizen".to_string(),
            password: "short".to_string(),
            display_name: None,
        };
        assert!(matches!(
            validate_request(&short_password),
            Err(ValidationError::Invalid(_))
        ));

        let bad_rating = FeedbackRequest {
            comment: "Fixed".to_string(),
            rating: Some(6),
            confirmed: true,
        };
        assert!(validate_request(&bad_rating).is_err());

        let no_rating = FeedbackRequest {
            comment: String::new(),
            rating: None,
            confirmed: false,
        };
        assert!(validate_request(&no_rating).is_ok());
    }
}
