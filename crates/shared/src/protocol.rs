use serde::{Deserialize, Serialize};

use crate::{
    domain::{FaceMatch, GalleryPhoto},
    error::ResponseContractError,
};

pub const UPLOAD_GROUP_PHOTO_PATH: &str = "upload-group-photo";
pub const UPLOAD_BULK_GROUP_PHOTOS_PATH: &str = "upload-bulk-group-photos";
pub const LIST_GROUP_PHOTOS_PATH: &str = "list-group-photos";
pub const FIND_PERSON_PATH: &str = "find-person";
pub const DELETE_GROUP_PHOTO_PATH: &str = "delete-group-photo";

/// Multipart field carrying the image for single upload and find-person.
pub const FILE_FIELD: &str = "file";
/// Repeated multipart field carrying the images of a bulk upload.
pub const FILES_FIELD: &str = "files";
pub const TOLERANCE_FIELD: &str = "tolerance";

pub const DEFAULT_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadFailure {
    pub filename: String,
    pub error: String,
}

/// Bulk upload result. Returned with 200 when every file landed and with 207 when
/// only some did; `errors` lists the files that were refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkUploadResponse {
    pub total_uploaded: usize,
    #[serde(default)]
    pub uploaded_files: Vec<UploadedFile>,
    #[serde(default)]
    pub errors: Vec<UploadFailure>,
}

impl BulkUploadResponse {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPhotosResponse {
    pub count: usize,
    pub photos: Vec<GalleryPhoto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindPersonResponse {
    pub tolerance_used: f64,
    pub total_images_checked: u64,
    pub matches: Vec<FaceMatch>,
}

impl FindPersonResponse {
    /// Checks the per-match invariants that serde alone cannot express.
    pub fn validate(&self) -> Result<(), ResponseContractError> {
        for (index, face_match) in self.matches.iter().enumerate() {
            if !face_match.has_valid_confidence() {
                return Err(ResponseContractError::ConfidenceOutOfRange {
                    index,
                    filename: face_match.filename.clone(),
                    confidence: face_match.confidence,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePhotoResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
