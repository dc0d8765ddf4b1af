//! Locally chosen files staged for upload or search, with their previews.

use std::{fmt, path::Path, sync::Arc};

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::preview::{PreviewHandle, PreviewRegistry};

pub const DEFAULT_MAX_FILES: usize = 5;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Binary content picked by the user, not yet sent anywhere.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalFile {
    name: String,
    mime_type: Option<String>,
    bytes: Arc<[u8]>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, mime_type: Option<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime_type,
            bytes: bytes.into(),
        }
    }

    /// Builds a file whose MIME type is guessed from the name's extension.
    pub fn guessed(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first()
            .map(|mime| mime.essence_str().to_string());
        Self::new(name, mime_type, bytes)
    }

    pub async fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::guessed(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Accepts a file when its MIME type matches a pattern (`image/*` style
/// wildcards allowed) or its name ends with a listed extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedTypes {
    mime_patterns: Vec<String>,
    extensions: Vec<String>,
}

impl AcceptedTypes {
    pub fn new<P, E>(mime_patterns: P, extensions: E) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            mime_patterns: mime_patterns
                .into_iter()
                .map(|p| p.into().to_ascii_lowercase())
                .collect(),
            extensions: extensions
                .into_iter()
                .map(|e| {
                    let e = e.into().to_ascii_lowercase();
                    if e.starts_with('.') {
                        e
                    } else {
                        format!(".{e}")
                    }
                })
                .collect(),
        }
    }

    pub fn images() -> Self {
        Self::new(["image/*"], [".jpeg", ".jpg", ".png"])
    }

    pub fn accepts(&self, file: &LocalFile) -> bool {
        let name = file.name().to_ascii_lowercase();
        if self.extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
            return true;
        }
        let Some(mime) = file.mime_type().map(str::to_ascii_lowercase) else {
            return false;
        };
        self.mime_patterns.iter().any(|pattern| match pattern.strip_suffix("/*") {
            Some(top_level) => mime
                .split_once('/')
                .is_some_and(|(kind, _)| kind == top_level),
            None => *pattern == mime,
        })
    }
}

impl Default for AcceptedTypes {
    fn default() -> Self {
        Self::images()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOptions {
    pub multiple: bool,
    pub max_files: usize,
    pub max_size: u64,
    pub accepted_types: AcceptedTypes,
}

impl SelectionOptions {
    pub fn single() -> Self {
        Self::default()
    }

    pub fn bulk(max_files: usize) -> Self {
        Self {
            multiple: true,
            max_files,
            ..Self::default()
        }
    }
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            multiple: false,
            max_files: DEFAULT_MAX_FILES,
            max_size: DEFAULT_MAX_FILE_SIZE,
            accepted_types: AcceptedTypes::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("file is {size} bytes, larger than {max_size} bytes")]
    FileTooLarge { size: u64, max_size: u64 },
    #[error("file type {} is not accepted", mime_type.as_deref().unwrap_or("unknown"))]
    FileInvalidType { mime_type: Option<String> },
    #[error("too many files (at most {max_files})")]
    TooManyFiles { max_files: usize },
}

/// A file refused during selection. This is data for the view, not a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub file_name: String,
    pub reasons: Vec<RejectionReason>,
}

#[derive(Debug)]
pub struct SelectedFile {
    file: LocalFile,
    preview: PreviewHandle,
}

impl SelectedFile {
    pub fn file(&self) -> &LocalFile {
        &self.file
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    /// Identifies this entry for as long as it stays in the batch.
    pub fn entry_id(&self) -> Uuid {
        self.preview.id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddFilesOutcome {
    pub accepted: usize,
    pub rejected: Vec<Rejection>,
}

/// Owns the batch of staged files. Every preview it creates is released when
/// the file leaves the batch or when the store is dropped.
#[derive(Debug)]
pub struct FileSelectionStore {
    registry: PreviewRegistry,
    batch: Vec<SelectedFile>,
    generation: u64,
}

impl FileSelectionStore {
    pub fn new(registry: PreviewRegistry) -> Self {
        Self {
            registry,
            batch: Vec::new(),
            generation: 0,
        }
    }

    pub fn add_files(
        &mut self,
        incoming: impl IntoIterator<Item = LocalFile>,
        options: &SelectionOptions,
    ) -> AddFilesOutcome {
        let mut outcome = AddFilesOutcome::default();
        let mut valid = Vec::new();

        for file in incoming {
            let reasons = validate_file(&file, options);
            if reasons.is_empty() {
                valid.push(file);
            } else {
                outcome.rejected.push(Rejection {
                    file_name: file.name().to_string(),
                    reasons,
                });
            }
        }

        let capacity = if options.multiple {
            options.max_files.saturating_sub(self.batch.len())
        } else {
            usize::min(1, options.max_files)
        };
        if valid.len() > capacity {
            let max_files = if options.multiple { options.max_files } else { 1 };
            for file in valid.drain(capacity..) {
                outcome.rejected.push(Rejection {
                    file_name: file.name().to_string(),
                    reasons: vec![RejectionReason::TooManyFiles { max_files }],
                });
            }
        }

        if valid.is_empty() {
            debug!(rejected = outcome.rejected.len(), "selection: nothing accepted");
            return outcome;
        }

        if !options.multiple {
            self.batch.clear();
        }
        outcome.accepted = valid.len();
        for file in valid {
            let preview = self.registry.acquire(file.name());
            self.batch.push(SelectedFile { file, preview });
        }
        self.generation += 1;
        info!(
            accepted = outcome.accepted,
            rejected = outcome.rejected.len(),
            batch = self.batch.len(),
            "selection: files added"
        );
        outcome
    }

    /// Removes the file at `index` and releases only its preview. Out-of-range
    /// indexes leave the batch untouched.
    pub fn remove_file(&mut self, index: usize) -> Option<LocalFile> {
        if index >= self.batch.len() {
            return None;
        }
        let SelectedFile { file, preview } = self.batch.remove(index);
        drop(preview);
        self.generation += 1;
        debug!(index, file_name = file.name(), "selection: file removed");
        Some(file)
    }

    pub fn clear(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        self.batch.clear();
        self.generation += 1;
        debug!("selection: cleared");
    }

    /// Hands the staged files over for submission, releasing their previews.
    pub fn take_files(&mut self) -> Vec<LocalFile> {
        let files = self
            .batch
            .drain(..)
            .map(|selected| selected.file)
            .collect::<Vec<_>>();
        if !files.is_empty() {
            self.generation += 1;
        }
        files
    }

    /// Removes the entries listed in `entry_ids`, releasing their previews.
    /// Entries that already left the batch are skipped; everything else stays.
    pub fn remove_entries(&mut self, entry_ids: &[Uuid]) -> Vec<LocalFile> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.batch.len());
        for selected in self.batch.drain(..) {
            if entry_ids.contains(&selected.entry_id()) {
                removed.push(selected.file);
            } else {
                kept.push(selected);
            }
        }
        self.batch = kept;
        if !removed.is_empty() {
            self.generation += 1;
            debug!(
                removed = removed.len(),
                remaining = self.batch.len(),
                "selection: submitted entries removed"
            );
        }
        removed
    }

    /// Copies of the staged files, leaving the batch and its previews in place.
    pub fn files(&self) -> Vec<LocalFile> {
        self.batch.iter().map(|selected| selected.file.clone()).collect()
    }

    pub fn batch(&self) -> &[SelectedFile] {
        &self.batch
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Bumped on every change to the batch; used to spot stale submissions.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }
}

pub fn validate_file(file: &LocalFile, options: &SelectionOptions) -> Vec<RejectionReason> {
    let mut reasons = Vec::new();
    if !options.accepted_types.accepts(file) {
        reasons.push(RejectionReason::FileInvalidType {
            mime_type: file.mime_type().map(str::to_string),
        });
    }
    if file.size() > options.max_size {
        reasons.push(RejectionReason::FileTooLarge {
            size: file.size(),
            max_size: options.max_size,
        });
    }
    reasons
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
