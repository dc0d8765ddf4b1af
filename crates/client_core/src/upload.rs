//! Single and bulk submission of the staged batch.

use shared::protocol::{BulkUploadResponse, UploadResponse};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    notice::{Notice, NoticeQueue},
    progress::{ProgressSettings, SyntheticProgress, UploadProgressSimulator},
    selection::{FileSelectionStore, LocalFile, SelectedFile},
    service::{PhotoService, ServiceError},
    CompletionDisposition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Single,
    Bulk,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Single(UploadResponse),
    /// May be partial: check [`BulkUploadResponse::errors`].
    Bulk(BulkUploadResponse),
}

impl UploadOutcome {
    pub fn uploaded_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Bulk(body) => body.total_uploaded,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Bulk(body) if body.is_partial())
    }
}

#[derive(Debug)]
pub enum UploadState {
    Idle,
    Uploading,
    Uploaded(UploadOutcome),
    UploadFailed(ServiceError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejected {
    #[error("Please select a file to upload")]
    NoFile,
    #[error("Please select files to upload")]
    NoFiles,
    #[error("An upload is already in progress")]
    InFlight,
}

#[derive(Debug, Clone)]
enum UploadPayload {
    Single(LocalFile),
    Bulk(Vec<LocalFile>),
}

#[derive(Debug, Clone)]
pub struct UploadTicket {
    generation: u64,
    /// Store entries carried by the payload.
    submitted: Vec<Uuid>,
    payload: UploadPayload,
}

impl UploadTicket {
    pub fn mode(&self) -> UploadMode {
        match self.payload {
            UploadPayload::Single(_) => UploadMode::Single,
            UploadPayload::Bulk(_) => UploadMode::Bulk,
        }
    }

    pub fn file_count(&self) -> usize {
        match &self.payload {
            UploadPayload::Single(_) => 1,
            UploadPayload::Bulk(files) => files.len(),
        }
    }

    pub async fn run(self, service: &dyn PhotoService) -> UploadCompletion {
        let mode = self.mode();
        let outcome = match &self.payload {
            UploadPayload::Single(file) => service.upload_single(file).await.map(UploadOutcome::Single),
            UploadPayload::Bulk(files) => service.upload_bulk(files).await.map(UploadOutcome::Bulk),
        };
        UploadCompletion {
            generation: self.generation,
            submitted: self.submitted,
            mode,
            outcome,
        }
    }
}

#[derive(Debug)]
pub struct UploadCompletion {
    generation: u64,
    submitted: Vec<Uuid>,
    mode: UploadMode,
    outcome: Result<UploadOutcome, ServiceError>,
}

pub struct UploadWorkflow {
    state: UploadState,
    generation: u64,
    progress: UploadProgressSimulator,
    notices: NoticeQueue,
}

impl UploadWorkflow {
    pub fn new(progress: ProgressSettings) -> Self {
        Self {
            state: UploadState::Idle,
            generation: 0,
            progress: UploadProgressSimulator::new(progress),
            notices: NoticeQueue::default(),
        }
    }

    /// Snapshots the batch into a request and starts the synthetic progress.
    /// `Single` sends the first staged file only; `Bulk` sends the whole batch.
    /// Must be called inside a tokio runtime.
    pub fn begin_upload(
        &mut self,
        store: &FileSelectionStore,
        mode: UploadMode,
    ) -> Result<UploadTicket, UploadRejected> {
        if matches!(self.state, UploadState::Uploading) {
            return Err(UploadRejected::InFlight);
        }

        let entries: &[SelectedFile] = match mode {
            UploadMode::Single => store.batch().get(..1).unwrap_or_default(),
            UploadMode::Bulk => store.batch(),
        };
        if entries.is_empty() {
            let rejected = match mode {
                UploadMode::Single => UploadRejected::NoFile,
                UploadMode::Bulk => UploadRejected::NoFiles,
            };
            self.notices.push(Notice::error(rejected.to_string()));
            return Err(rejected);
        }

        let submitted = entries.iter().map(SelectedFile::entry_id).collect();
        let mut files = entries
            .iter()
            .map(|selected| selected.file().clone())
            .collect::<Vec<_>>();
        let payload = match mode {
            UploadMode::Single => UploadPayload::Single(files.swap_remove(0)),
            UploadMode::Bulk => UploadPayload::Bulk(files),
        };

        self.generation += 1;
        self.state = UploadState::Uploading;
        self.progress.start();
        let ticket = UploadTicket {
            generation: self.generation,
            submitted,
            payload,
        };
        debug!(
            generation = self.generation,
            files = ticket.file_count(),
            ?mode,
            "upload: request issued"
        );
        Ok(ticket)
    }

    /// Applies a finished upload. On success exactly the submitted entries
    /// leave the store; files staged after submission, and any not sent in
    /// `Single` mode, stay for the next upload.
    pub fn complete(
        &mut self,
        completion: UploadCompletion,
        store: &mut FileSelectionStore,
    ) -> CompletionDisposition {
        if completion.generation != self.generation
            || !matches!(self.state, UploadState::Uploading)
        {
            warn!(
                response_generation = completion.generation,
                current_generation = self.generation,
                "upload: discarding stale response"
            );
            return CompletionDisposition::Stale;
        }

        self.state = match completion.outcome {
            Ok(outcome) => {
                store.remove_entries(&completion.submitted);
                self.notices.push(Notice::success(success_message(&outcome)));
                if let UploadOutcome::Bulk(body) = &outcome {
                    if body.is_partial() {
                        self.notices.push(Notice::error(format!(
                            "{} {} could not be uploaded",
                            body.errors.len(),
                            if body.errors.len() == 1 { "photo" } else { "photos" }
                        )));
                    }
                }
                info!(uploaded = outcome.uploaded_count(), partial = outcome.is_partial(), "upload: complete");
                UploadState::Uploaded(outcome)
            }
            Err(err) => {
                warn!("upload: failed: {err}");
                self.progress.cancel();
                let message = match completion.mode {
                    UploadMode::Single => "Failed to upload photo. Please try again.",
                    UploadMode::Bulk => "Failed to upload photos. Please try again.",
                };
                self.notices.push(Notice::error(message));
                UploadState::UploadFailed(err)
            }
        };
        CompletionDisposition::Applied
    }

    pub async fn upload(
        &mut self,
        service: &dyn PhotoService,
        store: &mut FileSelectionStore,
        mode: UploadMode,
    ) -> Result<&UploadState, UploadRejected> {
        let ticket = self.begin_upload(store, mode)?;
        let completion = ticket.run(service).await;
        self.complete(completion, store);
        Ok(&self.state)
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.progress.cancel();
        self.state = UploadState::Idle;
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn progress(&self) -> SyntheticProgress {
        self.progress.current()
    }

    pub fn progress_simulator(&self) -> &UploadProgressSimulator {
        &self.progress
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.take()
    }
}

impl Default for UploadWorkflow {
    fn default() -> Self {
        Self::new(ProgressSettings::default())
    }
}

fn success_message(outcome: &UploadOutcome) -> String {
    match outcome {
        UploadOutcome::Single(_) => "Photo uploaded successfully!".to_string(),
        UploadOutcome::Bulk(body) => format!("{} photos uploaded successfully!", body.total_uploaded),
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
