//! Client-side orchestration for the FaceFind photo service: staged files and
//! their previews, synthetic progress, the service client, and the upload,
//! search and gallery workflows the presentation layer renders.

pub mod gallery;
pub mod notice;
pub mod preview;
pub mod progress;
pub mod search;
pub mod selection;
pub mod service;
pub mod upload;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

pub use gallery::{fallback_photos, DeleteFlow, FallbackPolicy, GalleryLoad, GalleryState, GalleryWorkflow};
pub use notice::{Notice, NoticeLevel};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use progress::{ProgressSettings, SyntheticProgress, UploadProgressSimulator};
pub use search::{SearchRejected, SearchResult, SearchState, SearchWorkflow};
pub use selection::{
    AcceptedTypes, AddFilesOutcome, FileSelectionStore, LocalFile, Rejection, RejectionReason,
    SelectedFile, SelectionOptions,
};
pub use service::{HttpPhotoService, PhotoService, RequestFailure, ServiceError};
pub use upload::{UploadMode, UploadOutcome, UploadRejected, UploadState, UploadWorkflow};

/// Whether a finished request was applied to its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionDisposition {
    Applied,
    /// The workflow moved on (new selection, reset, reload) after the request left.
    Stale,
}
