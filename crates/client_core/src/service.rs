//! Request/response exchanges with the remote recognition service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::{
    error::{ErrorBody, ResponseContractError},
    protocol::{
        BulkUploadResponse, FindPersonResponse, ListPhotosResponse, UploadResponse,
        DELETE_GROUP_PHOTO_PATH, FILES_FIELD, FILE_FIELD, FIND_PERSON_PATH,
        LIST_GROUP_PHOTOS_PATH, TOLERANCE_FIELD, UPLOAD_BULK_GROUP_PHOTOS_PATH,
        UPLOAD_GROUP_PHOTO_PATH,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::selection::LocalFile;

#[derive(Debug, Error)]
pub enum RequestFailure {
    #[error("service responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("response broke the service contract: {0}")]
    Contract(#[from] ResponseContractError),
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
    #[error("service url cannot carry path segments")]
    UnusableBaseUrl,
}

impl RequestFailure {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("upload failed: {0}")]
    Upload(#[source] RequestFailure),
    #[error("listing photos failed: {0}")]
    List(#[source] RequestFailure),
    #[error("finding person failed: {0}")]
    Search(#[source] RequestFailure),
    #[error("deleting photo failed: {0}")]
    Delete(#[source] RequestFailure),
}

impl ServiceError {
    pub fn failure(&self) -> &RequestFailure {
        match self {
            Self::Upload(failure)
            | Self::List(failure)
            | Self::Search(failure)
            | Self::Delete(failure) => failure,
        }
    }
}

/// The remote operations the workflows depend on. Calls share no mutable
/// state and may run concurrently.
#[async_trait]
pub trait PhotoService: Send + Sync {
    async fn upload_single(&self, file: &LocalFile) -> Result<UploadResponse, ServiceError>;

    /// A 207 response is a partial success, not a failure; inspect
    /// [`BulkUploadResponse::errors`] for the refused files.
    async fn upload_bulk(&self, files: &[LocalFile]) -> Result<BulkUploadResponse, ServiceError>;

    async fn list_photos(&self) -> Result<ListPhotosResponse, ServiceError>;

    /// `tolerance` is forwarded as given; range checks belong to the service.
    async fn find_person(
        &self,
        file: &LocalFile,
        tolerance: f64,
    ) -> Result<FindPersonResponse, ServiceError>;

    async fn delete_photo(&self, filename: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone)]
pub struct HttpPhotoService {
    http: Client,
    base_url: Url,
}

impl HttpPhotoService {
    pub fn new(base_url: &str) -> Result<Self, RequestFailure> {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, RequestFailure> {
        let http = Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, http)
    }

    pub fn with_client(base_url: &str, http: Client) -> Result<Self, RequestFailure> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(RequestFailure::UnusableBaseUrl);
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, RequestFailure> {
        Ok(self.base_url.join(path)?)
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, RequestFailure> {
        let response = self.http.post(self.endpoint(path)?).multipart(form).send().await?;
        decode(ensure_success(response).await?).await
    }
}

#[async_trait]
impl PhotoService for HttpPhotoService {
    async fn upload_single(&self, file: &LocalFile) -> Result<UploadResponse, ServiceError> {
        let result = async {
            let form = Form::new().part(FILE_FIELD, file_part(file)?);
            self.post_form::<UploadResponse>(UPLOAD_GROUP_PHOTO_PATH, form).await
        }
        .await;

        match result {
            Ok(body) => {
                info!(file_name = file.name(), stored_as = %body.filename, "service: photo uploaded");
                Ok(body)
            }
            Err(err) => {
                error!(file_name = file.name(), "service: error uploading group photo: {err}");
                Err(ServiceError::Upload(err))
            }
        }
    }

    async fn upload_bulk(&self, files: &[LocalFile]) -> Result<BulkUploadResponse, ServiceError> {
        let result = async {
            let mut form = Form::new();
            for file in files {
                form = form.part(FILES_FIELD, file_part(file)?);
            }
            let response = self
                .http
                .post(self.endpoint(UPLOAD_BULK_GROUP_PHOTOS_PATH)?)
                .multipart(form)
                .send()
                .await?;
            let partial = response.status() == StatusCode::MULTI_STATUS;
            let body: BulkUploadResponse = decode(ensure_success(response).await?).await?;
            Ok::<_, RequestFailure>((partial, body))
        }
        .await;

        match result {
            Ok((partial, body)) => {
                if partial || body.is_partial() {
                    warn!(
                        uploaded = body.total_uploaded,
                        failed = body.errors.len(),
                        "service: bulk upload partially succeeded"
                    );
                } else {
                    info!(uploaded = body.total_uploaded, "service: bulk upload complete");
                }
                Ok(body)
            }
            Err(err) => {
                error!(files = files.len(), "service: error uploading bulk group photos: {err}");
                Err(ServiceError::Upload(err))
            }
        }
    }

    async fn list_photos(&self) -> Result<ListPhotosResponse, ServiceError> {
        let result = async {
            let response = self
                .http
                .get(self.endpoint(LIST_GROUP_PHOTOS_PATH)?)
                .send()
                .await?;
            decode::<ListPhotosResponse>(ensure_success(response).await?).await
        }
        .await;

        result
            .inspect(|body| info!(count = body.count, "service: photos listed"))
            .map_err(|err| {
                error!("service: error listing group photos: {err}");
                ServiceError::List(err)
            })
    }

    async fn find_person(
        &self,
        file: &LocalFile,
        tolerance: f64,
    ) -> Result<FindPersonResponse, ServiceError> {
        let result = async {
            let form = Form::new()
                .part(FILE_FIELD, file_part(file)?)
                .text(TOLERANCE_FIELD, tolerance.to_string());
            let body: FindPersonResponse = self.post_form(FIND_PERSON_PATH, form).await?;
            body.validate()?;
            Ok::<_, RequestFailure>(body)
        }
        .await;

        result
            .inspect(|body| {
                info!(
                    tolerance,
                    matches = body.matches.len(),
                    checked = body.total_images_checked,
                    "service: find person complete"
                )
            })
            .map_err(|err| {
                error!(file_name = file.name(), "service: error finding person: {err}");
                ServiceError::Search(err)
            })
    }

    async fn delete_photo(&self, filename: &str) -> Result<(), ServiceError> {
        let result = async {
            let mut url = self.endpoint(DELETE_GROUP_PHOTO_PATH)?;
            url.path_segments_mut()
                .map_err(|()| RequestFailure::UnusableBaseUrl)?
                .push(filename);
            let response = self.http.delete(url).send().await?;
            ensure_success(response).await?;
            Ok::<_, RequestFailure>(())
        }
        .await;

        result
            .inspect(|_| info!(filename, "service: photo deleted"))
            .map_err(|err| {
                error!(filename, "service: error deleting group photo: {err}");
                ServiceError::Delete(err)
            })
    }
}

fn file_part(file: &LocalFile) -> Result<Part, RequestFailure> {
    let part = Part::bytes(file.bytes().to_vec()).file_name(file.name().to_string());
    match file.mime_type() {
        Some(mime_type) => Ok(part.mime_str(mime_type)?),
        None => Ok(part),
    }
}

async fn ensure_success(response: Response) -> Result<Response, RequestFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown status").to_string(),
    };
    Err(RequestFailure::Status {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RequestFailure> {
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
