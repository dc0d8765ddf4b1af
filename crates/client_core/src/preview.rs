//! Revocable local preview handles for files that have not been uploaded yet.
//!
//! A [`PreviewRegistry`] hands out [`PreviewHandle`]s. Each handle is an owned
//! value that releases its registry entry exactly once, when it is dropped, so
//! every removal, reset, error and teardown path releases without extra code.

use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use tracing::trace;
use uuid::Uuid;

const PREVIEW_URL_PREFIX: &str = "blob:facefind/";

#[derive(Default)]
struct RegistryInner {
    live: Mutex<HashSet<Uuid>>,
    created: AtomicU64,
    released: AtomicU64,
}

#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<RegistryInner>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, file_name: &str) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.live_set().insert(id);
        self.inner.created.fetch_add(1, Ordering::SeqCst);
        trace!(file_name, %id, "preview: acquired");
        PreviewHandle {
            id,
            url: format!("{PREVIEW_URL_PREFIX}{id}"),
            registry: self.clone(),
        }
    }

    /// Number of handles acquired and not yet released.
    pub fn live_count(&self) -> usize {
        self.live_set().len()
    }

    pub fn created_count(&self) -> u64 {
        self.inner.created.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> u64 {
        self.inner.released.load(Ordering::SeqCst)
    }

    pub fn is_live(&self, url: &str) -> bool {
        url.strip_prefix(PREVIEW_URL_PREFIX)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .is_some_and(|id| self.live_set().contains(&id))
    }

    fn release(&self, id: Uuid) {
        if self.live_set().remove(&id) {
            self.inner.released.fetch_add(1, Ordering::SeqCst);
            trace!(%id, "preview: released");
        }
    }

    fn live_set(&self) -> std::sync::MutexGuard<'_, HashSet<Uuid>> {
        // A poisoned set is still a valid set of ids.
        self.inner
            .live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for PreviewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewRegistry")
            .field("live", &self.live_count())
            .field("created", &self.created_count())
            .field("released", &self.released_count())
            .finish()
    }
}

/// Scoped preview URL. Not `Clone`: the owner is the only reader, and dropping
/// it revokes the URL.
pub struct PreviewHandle {
    id: Uuid,
    url: String,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.url).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

#[cfg(test)]
#[path = "tests/preview_tests.rs"]
mod tests;
