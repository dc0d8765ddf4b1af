use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{FaceLocation, FaceMatch, GalleryPhoto},
    protocol::{
        BulkUploadResponse, FindPersonResponse, ListPhotosResponse, UploadFailure,
        UploadResponse, UploadedFile,
    },
};
use tokio::sync::{Mutex, Semaphore};

use crate::{
    selection::LocalFile,
    service::{PhotoService, RequestFailure, ServiceError},
};

pub(crate) fn image(name: &str, size: usize) -> LocalFile {
    LocalFile::new(name, Some("image/jpeg".to_string()), vec![0u8; size])
}

pub(crate) fn face_match(filename: &str, confidence: f64) -> FaceMatch {
    FaceMatch {
        filename: filename.to_string(),
        url: Some(format!("https://cdn.test/{filename}")),
        confidence,
        face_location: FaceLocation([10.0, 20.0, 64.0, 64.0]),
    }
}

pub(crate) fn photo(filename: &str) -> GalleryPhoto {
    GalleryPhoto::from_url(filename, format!("https://cdn.test/{filename}"))
}

fn status_failure(status: u16) -> RequestFailure {
    RequestFailure::Status {
        status,
        message: "service unavailable".to_string(),
    }
}

/// In-memory stand-in for the recognition service.
pub(crate) struct FakePhotoService {
    pub(crate) fail_with: Option<u16>,
    pub(crate) photos: Vec<GalleryPhoto>,
    pub(crate) matches: Vec<FaceMatch>,
    pub(crate) bulk_errors: Vec<UploadFailure>,
    pub(crate) gate: Option<Arc<Semaphore>>,
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
}

impl FakePhotoService {
    pub(crate) fn ok() -> Self {
        Self {
            fail_with: None,
            photos: Vec::new(),
            matches: Vec::new(),
            bulk_errors: Vec::new(),
            gate: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::ok()
        }
    }

    pub(crate) fn with_photos(mut self, photos: Vec<GalleryPhoto>) -> Self {
        self.photos = photos;
        self
    }

    pub(crate) fn with_matches(mut self, matches: Vec<FaceMatch>) -> Self {
        self.matches = matches;
        self
    }

    pub(crate) fn with_bulk_errors(mut self, errors: Vec<UploadFailure>) -> Self {
        self.bulk_errors = errors;
        self
    }

    /// Every call waits for a permit on the returned semaphore before answering.
    pub(crate) fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub(crate) async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn enter(&self, call: String) -> Result<(), RequestFailure> {
        self.calls.lock().await.push(call);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        match self.fail_with {
            Some(status) => Err(status_failure(status)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PhotoService for FakePhotoService {
    async fn upload_single(&self, file: &LocalFile) -> Result<UploadResponse, ServiceError> {
        self.enter(format!("upload_single:{}", file.name()))
            .await
            .map_err(ServiceError::Upload)?;
        Ok(UploadResponse {
            filename: format!("stored_{}", file.name()),
            url: Some(format!("https://cdn.test/stored_{}", file.name())),
            message: None,
        })
    }

    async fn upload_bulk(&self, files: &[LocalFile]) -> Result<BulkUploadResponse, ServiceError> {
        self.enter(format!("upload_bulk:{}", files.len()))
            .await
            .map_err(ServiceError::Upload)?;
        let uploaded_files = files
            .iter()
            .filter(|file| !self.bulk_errors.iter().any(|e| e.filename == file.name()))
            .map(|file| UploadedFile {
                filename: format!("stored_{}", file.name()),
                url: None,
            })
            .collect::<Vec<_>>();
        Ok(BulkUploadResponse {
            total_uploaded: uploaded_files.len(),
            uploaded_files,
            errors: self.bulk_errors.clone(),
        })
    }

    async fn list_photos(&self) -> Result<ListPhotosResponse, ServiceError> {
        self.enter("list_photos".to_string())
            .await
            .map_err(ServiceError::List)?;
        Ok(ListPhotosResponse {
            count: self.photos.len(),
            photos: self.photos.clone(),
        })
    }

    async fn find_person(
        &self,
        file: &LocalFile,
        tolerance: f64,
    ) -> Result<FindPersonResponse, ServiceError> {
        self.enter(format!("find_person:{}:{tolerance}", file.name()))
            .await
            .map_err(ServiceError::Search)?;
        Ok(FindPersonResponse {
            tolerance_used: tolerance,
            total_images_checked: 7,
            matches: self.matches.clone(),
        })
    }

    async fn delete_photo(&self, filename: &str) -> Result<(), ServiceError> {
        self.enter(format!("delete_photo:{filename}"))
            .await
            .map_err(ServiceError::Delete)
    }
}
