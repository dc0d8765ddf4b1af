//! Gallery listing with an explicit demo-data fallback and a confirm-before-
//! delete sub-flow.

use shared::domain::GalleryPhoto;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    notice::{Notice, NoticeQueue},
    service::{PhotoService, ServiceError},
};

pub const LOAD_FAILED_NOTICE: &str = "Failed to load photos";
pub const PHOTO_DELETED_NOTICE: &str = "Photo deleted successfully";
pub const DELETE_FAILED_NOTICE: &str = "Failed to delete photo. Please try again.";

const FALLBACK_PHOTO_IDS: [&str; 5] = ["3184398", "1181676", "3184317", "1587009", "6121448"];

/// Demo photos shown when the service cannot be reached.
pub fn fallback_photos() -> Vec<GalleryPhoto> {
    FALLBACK_PHOTO_IDS
        .iter()
        .map(|id| {
            GalleryPhoto::from_url(
                format!("pexels-photo-{id}.jpeg"),
                format!(
                    "https://images.pexels.com/photos/{id}/pexels-photo-{id}.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=1"
                ),
            )
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    DemoPhotos,
    Disabled,
}

#[derive(Debug)]
pub enum GalleryState {
    Loading,
    Loaded,
    /// The listing failed; the working set holds demo photos unless the
    /// fallback policy is disabled.
    LoadFailed(ServiceError),
}

/// How the current working set came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryLoad {
    Live { count: usize },
    Fallback { count: usize },
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteFlow {
    Idle,
    ConfirmPending(GalleryPhoto),
}

#[derive(Debug, Error)]
pub enum DeleteRejected {
    #[error("photos are still loading")]
    NotLoaded,
    #[error("no photo is awaiting confirmation")]
    NothingPending,
    #[error("photo {0} is not in the gallery")]
    UnknownPhoto(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Clone, Copy)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Debug)]
pub struct GalleryWorkflow {
    policy: FallbackPolicy,
    state: GalleryState,
    photos: Vec<GalleryPhoto>,
    delete: DeleteFlow,
    generation: u64,
    notices: NoticeQueue,
}

impl GalleryWorkflow {
    pub fn new(policy: FallbackPolicy) -> Self {
        Self {
            policy,
            state: GalleryState::Loading,
            photos: Vec::new(),
            delete: DeleteFlow::Idle,
            generation: 0,
            notices: NoticeQueue::default(),
        }
    }

    /// Enters `Loading`; a newer call supersedes results of older ones.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.state = GalleryState::Loading;
        self.delete = DeleteFlow::Idle;
        debug!(generation = self.generation, "gallery: loading");
        LoadTicket {
            generation: self.generation,
        }
    }

    /// Returns `None` when the ticket was superseded by a newer load.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        outcome: Result<Vec<GalleryPhoto>, ServiceError>,
    ) -> Option<GalleryLoad> {
        if ticket.generation != self.generation {
            warn!(
                response_generation = ticket.generation,
                current_generation = self.generation,
                "gallery: discarding stale listing"
            );
            return None;
        }

        let load = match outcome {
            Ok(photos) => {
                info!(count = photos.len(), "gallery: loaded");
                self.photos = photos;
                self.state = GalleryState::Loaded;
                GalleryLoad::Live {
                    count: self.photos.len(),
                }
            }
            Err(err) => {
                warn!("gallery: listing failed: {err}");
                self.notices.push(Notice::error(LOAD_FAILED_NOTICE));
                self.state = GalleryState::LoadFailed(err);
                match self.policy {
                    FallbackPolicy::DemoPhotos => {
                        self.photos = fallback_photos();
                        GalleryLoad::Fallback {
                            count: self.photos.len(),
                        }
                    }
                    FallbackPolicy::Disabled => {
                        self.photos.clear();
                        GalleryLoad::Failed
                    }
                }
            }
        };
        Some(load)
    }

    pub async fn load(&mut self, service: &dyn PhotoService) -> GalleryLoad {
        let ticket = self.begin_load();
        let outcome = service.list_photos().await.map(|body| body.photos);
        // The ticket is the latest one while `self` is borrowed for the call.
        self.complete_load(ticket, outcome)
            .unwrap_or(GalleryLoad::Failed)
    }

    pub fn request_delete(&mut self, photo: &GalleryPhoto) -> Result<(), DeleteRejected> {
        if matches!(self.state, GalleryState::Loading) {
            return Err(DeleteRejected::NotLoaded);
        }
        if !self.photos.contains(photo) {
            return Err(DeleteRejected::UnknownPhoto(photo.filename.clone()));
        }
        debug!(filename = %photo.filename, "gallery: delete requested");
        self.delete = DeleteFlow::ConfirmPending(photo.clone());
        Ok(())
    }

    /// Removes the pending photo from the working set only. No remote call.
    pub fn confirm_delete(&mut self) -> Result<GalleryPhoto, DeleteRejected> {
        let DeleteFlow::ConfirmPending(pending) = std::mem::replace(&mut self.delete, DeleteFlow::Idle)
        else {
            return Err(DeleteRejected::NothingPending);
        };
        Ok(self.remove_local(pending))
    }

    /// Deletes the pending photo on the service, then locally. On failure the
    /// confirmation stays pending so it can be retried or cancelled.
    pub async fn confirm_delete_remote(
        &mut self,
        service: &dyn PhotoService,
    ) -> Result<GalleryPhoto, DeleteRejected> {
        let DeleteFlow::ConfirmPending(pending) = &self.delete else {
            return Err(DeleteRejected::NothingPending);
        };
        let pending = pending.clone();
        if let Err(err) = service.delete_photo(&pending.filename).await {
            self.notices.push(Notice::error(DELETE_FAILED_NOTICE));
            return Err(err.into());
        }
        self.delete = DeleteFlow::Idle;
        Ok(self.remove_local(pending))
    }

    pub fn cancel_delete(&mut self) {
        if let DeleteFlow::ConfirmPending(photo) = &self.delete {
            debug!(filename = %photo.filename, "gallery: delete cancelled");
        }
        self.delete = DeleteFlow::Idle;
    }

    fn remove_local(&mut self, photo: GalleryPhoto) -> GalleryPhoto {
        if let Some(index) = self.photos.iter().position(|p| *p == photo) {
            self.photos.remove(index);
        }
        info!(filename = %photo.filename, remaining = self.photos.len(), "gallery: photo removed");
        self.notices.push(Notice::success(PHOTO_DELETED_NOTICE));
        photo
    }

    pub fn state(&self) -> &GalleryState {
        &self.state
    }

    pub fn photos(&self) -> &[GalleryPhoto] {
        &self.photos
    }

    pub fn delete_flow(&self) -> &DeleteFlow {
        &self.delete
    }

    pub fn pending_deletion(&self) -> Option<&GalleryPhoto> {
        match &self.delete {
            DeleteFlow::ConfirmPending(photo) => Some(photo),
            DeleteFlow::Idle => None,
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.take()
    }
}

impl Default for GalleryWorkflow {
    fn default() -> Self {
        Self::new(FallbackPolicy::DemoPhotos)
    }
}

#[cfg(test)]
#[path = "tests/gallery_tests.rs"]
mod tests;
