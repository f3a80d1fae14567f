//! Upload Validation
//!
//! Rules for seller file uploads before a storage URL is handed out.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Teaser/preview files are capped at 50 MB
pub const MAX_TEASER_SIZE: u64 = 50 * 1024 * 1024;

/// Allowed MIME types and their file extensions
pub const ALLOWED_FILE_TYPES: &[(&str, &str)] = &[
    ("application/zip", ".zip"),
    ("application/pdf", ".pdf"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".docx",
    ),
    ("video/mp4", ".mp4"),
    ("audio/mpeg", ".mp3"),
    ("audio/mp3", ".mp3"),
];

/// A seller's request for an upload slot
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    #[serde(default)]
    pub is_teaser: bool,
}

/// Where to PUT the file and where it will be served from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub upload_url: String,
    pub file_url: String,
}

/// Extension registered for a MIME type
pub fn extension_for(file_type: &str) -> Option<&'static str> {
    ALLOWED_FILE_TYPES
        .iter()
        .find(|(mime, _)| *mime == file_type)
        .map(|(_, ext)| *ext)
}

/// Reduce a client file name to a storage-safe key
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

impl UploadRequest {
    pub fn validate(&self) -> Result<()> {
        if extension_for(&self.file_type).is_none() {
            return Err(CoreError::Validation("File type not allowed".into()));
        }
        if self.is_teaser && self.file_size > MAX_TEASER_SIZE {
            return Err(CoreError::Validation(
                "Teaser file size must be under 50MB".into(),
            ));
        }
        if sanitize_file_name(&self.file_name).is_empty() {
            return Err(CoreError::Validation("File name is required".into()));
        }
        Ok(())
    }

    /// Validate and build upload/serve URLs under `storage_base`
    pub fn target(&self, storage_base: &str, owner_id: &str) -> Result<UploadTarget> {
        self.validate()?;
        let base = storage_base.trim_end_matches('/');
        let key = format!(
            "{owner_id}/{}-{}",
            uuid::Uuid::new_v4().simple(),
            sanitize_file_name(&self.file_name)
        );
        Ok(UploadTarget {
            upload_url: format!("{base}/upload/{key}"),
            file_url: format!("{base}/files/{key}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(file_type: &str, file_size: u64, is_teaser: bool) -> UploadRequest {
        UploadRequest {
            file_name: "course.zip".into(),
            file_type: file_type.into(),
            file_size,
            is_teaser,
        }
    }

    #[test]
    fn test_allowed_types() {
        assert!(request("application/zip", 10, false).validate().is_ok());
        assert!(request("audio/mp3", 10, false).validate().is_ok());
        assert!(request("image/png", 10, false).validate().is_err());
    }

    #[test]
    fn test_teaser_size_limit() {
        assert!(request("video/mp4", MAX_TEASER_SIZE, true).validate().is_ok());
        assert!(request("video/mp4", MAX_TEASER_SIZE + 1, true).validate().is_err());
        // Full product files are not size-capped
        assert!(request("video/mp4", MAX_TEASER_SIZE * 10, false).validate().is_ok());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my song (final).mp3"), "my_song__final_.mp3");
        assert_eq!(sanitize_file_name("..."), "");
    }

    #[test]
    fn test_target_urls() {
        let target = request("application/zip", 10, false)
            .target("https://storage.example.com/", "usr_1")
            .unwrap();
        assert!(target.upload_url.starts_with("https://storage.example.com/upload/usr_1/"));
        assert!(target.file_url.starts_with("https://storage.example.com/files/usr_1/"));
        assert!(target.file_url.ends_with("-course.zip"));
    }
}
