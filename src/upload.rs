//! Upload validation and multipart extraction for `POST /api/generate`.

use std::fmt;

use axum::{
    extract::{Multipart, multipart::MultipartError},
    http::StatusCode,
};
use thiserror::Error;

use crate::{
    config::{ALLOWED_CONTENT_TYPES, MAX_UPLOAD_BYTES},
    error::ServiceError,
};

pub const CHILD_PHOTO_FIELD: &str = "child_photo";
pub const TEMPLATE_IMAGE_FIELD: &str = "template_image";

/// A file received in the request, fully buffered.
#[derive(Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRole {
    Face,
    Template,
}

impl UploadRole {
    fn type_prefix(self) -> &'static str {
        match self {
            UploadRole::Face => "",
            UploadRole::Template => "template ",
        }
    }

    fn size_prefix(self) -> &'static str {
        match self {
            UploadRole::Face => "File",
            UploadRole::Template => "Template file",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error(
        "Invalid {}file type. Allowed: {}",
        .role.type_prefix(),
        ALLOWED_CONTENT_TYPES.join(", ")
    )]
    UnsupportedType { role: UploadRole },
    #[error(
        "{} too large. Maximum size is {:.1}MB",
        .role.size_prefix(),
        MAX_UPLOAD_BYTES as f64 / 1024.0 / 1024.0
    )]
    TooLarge { role: UploadRole },
}

/// Content-type allow-list and size ceiling applied to every upload.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed_types: Vec<String>,
    max_bytes: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_types: ALLOWED_CONTENT_TYPES.iter().map(|t| t.to_string()).collect(),
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadPolicy {
    pub fn validate(&self, file: &UploadedFile, role: UploadRole) -> Result<(), ValidationError> {
        let normalized = normalize_mime_type(&file.content_type).to_lowercase();
        if !self.allowed_types.iter().any(|allowed| *allowed == normalized) {
            return Err(ValidationError::UnsupportedType { role });
        }
        if file.len() > self.max_bytes {
            return Err(ValidationError::TooLarge { role });
        }
        Ok(())
    }
}

/// Strips parameters so `image/png; charset=binary` compares as `image/png`.
fn normalize_mime_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or(content_type)
}

/// The two form fields of a generation request.
#[derive(Debug)]
pub struct GenerateUpload {
    pub child_photo: UploadedFile,
    pub template_image: Option<UploadedFile>,
}

impl GenerateUpload {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ServiceError> {
        let mut child_photo = None;
        let mut template_image = None;
        // Role blamed when the body limit trips between fields.
        let mut current_role = UploadRole::Face;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, current_role, "Failed to read multipart"))?
        {
            let name = field.name().map(str::to_string).unwrap_or_default();
            let role = match name.as_str() {
                CHILD_PHOTO_FIELD => UploadRole::Face,
                TEMPLATE_IMAGE_FIELD => UploadRole::Template,
                _ => continue,
            };
            current_role = role;

            let filename = field.file_name().map(str::to_string).unwrap_or_default();
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| multipart_error(e, role, "Failed to read file data"))?
                .to_vec();

            let file = UploadedFile::new(filename, content_type, data);
            if role == UploadRole::Face {
                child_photo = Some(file);
            } else if !(file.filename.is_empty() && file.is_empty()) {
                // Browsers submit an empty part for an untouched file input.
                template_image = Some(file);
            }
        }

        let child_photo = child_photo.ok_or(ServiceError::MissingField(CHILD_PHOTO_FIELD))?;
        Ok(Self {
            child_photo,
            template_image,
        })
    }
}

/// A body over the request limit is an oversize upload; anything else is malformed.
fn multipart_error(err: MultipartError, role: UploadRole, context: &str) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::TooLarge { role }.into()
    } else {
        ServiceError::BadRequest(format!("{context}: {err}"))
    }
}

/// Reduces a client-supplied filename to a safe single path component.
pub fn sanitize_filename(filename: &str) -> String {
    const MAX_FILENAME_LENGTH: usize = 128;

    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let sanitized: String = base
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Separators are gone, so only an all-dots name can still address a parent.
    if sanitized.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        sanitized
    }
}
