//! Find-a-person flow: pick a reference image, query the service, project the
//! outcome into view state.

use shared::{
    domain::FaceMatch,
    protocol::{FindPersonResponse, DEFAULT_TOLERANCE},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    notice::{Notice, NoticeQueue},
    preview::{PreviewHandle, PreviewRegistry},
    selection::{validate_file, LocalFile, Rejection, SelectionOptions},
    service::{PhotoService, ServiceError},
    CompletionDisposition,
};

pub const SEARCH_SUCCEEDED_NOTICE: &str = "Search completed successfully!";
pub const SEARCH_FAILED_NOTICE: &str = "Failed to search for person. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// In service order.
    pub matches: Vec<FaceMatch>,
    pub tolerance_used: f64,
    pub total_images_checked: u64,
}

#[derive(Debug)]
pub enum SearchState {
    Idle,
    ReferenceSelected,
    Searching,
    ResultsReady(SearchResult),
    SearchFailed(ServiceError),
}

impl SearchState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ReferenceSelected => "reference_selected",
            Self::Searching => "searching",
            Self::ResultsReady(_) => "results_ready",
            Self::SearchFailed(_) => "search_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchRejected {
    #[error("Please upload a reference image")]
    NoReference,
    #[error("A search is already in progress")]
    InFlight,
    #[error("Search results are already shown; select a new reference to search again")]
    NotReady,
}

#[derive(Debug)]
struct ReferenceImage {
    file: LocalFile,
    preview: PreviewHandle,
}

/// Everything needed to run one find-person request, detached from the
/// workflow so the request can be awaited without holding it.
#[derive(Debug, Clone)]
pub struct SearchTicket {
    generation: u64,
    file: LocalFile,
    tolerance: f64,
}

impl SearchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn run(self, service: &dyn PhotoService) -> SearchCompletion {
        let outcome = service.find_person(&self.file, self.tolerance).await;
        SearchCompletion {
            generation: self.generation,
            outcome,
        }
    }
}

#[derive(Debug)]
pub struct SearchCompletion {
    generation: u64,
    outcome: Result<FindPersonResponse, ServiceError>,
}

#[derive(Debug)]
pub struct SearchWorkflow {
    registry: PreviewRegistry,
    options: SelectionOptions,
    tolerance: f64,
    state: SearchState,
    reference: Option<ReferenceImage>,
    generation: u64,
    notices: NoticeQueue,
}

impl SearchWorkflow {
    pub fn new(registry: PreviewRegistry) -> Self {
        Self {
            registry,
            options: SelectionOptions::single(),
            tolerance: DEFAULT_TOLERANCE,
            state: SearchState::Idle,
            reference: None,
            generation: 0,
            notices: NoticeQueue::default(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_options(mut self, options: SelectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the reference image, releasing the previous preview and
    /// dropping any earlier result. A response still in flight becomes stale.
    pub fn select_reference(&mut self, file: LocalFile) -> Result<(), Rejection> {
        let reasons = validate_file(&file, &self.options);
        if !reasons.is_empty() {
            debug!(file_name = file.name(), "search: reference rejected");
            return Err(Rejection {
                file_name: file.name().to_string(),
                reasons,
            });
        }

        self.reference = None;
        let preview = self.registry.acquire(file.name());
        info!(file_name = file.name(), preview = preview.url(), "search: reference selected");
        self.reference = Some(ReferenceImage { file, preview });
        self.generation += 1;
        self.state = SearchState::ReferenceSelected;
        Ok(())
    }

    /// Moves to `Searching` and returns the request to run. Only valid from
    /// `ReferenceSelected`; a second call while a request is pending is refused.
    /// Every refusal is also queued as an error notice.
    pub fn begin_search(&mut self) -> Result<SearchTicket, SearchRejected> {
        let checked = match (&self.reference, &self.state) {
            (Some(reference), SearchState::ReferenceSelected) => Ok(reference.file.clone()),
            (None, _) => Err(SearchRejected::NoReference),
            (Some(_), SearchState::Searching) => Err(SearchRejected::InFlight),
            (Some(_), _) => Err(SearchRejected::NotReady),
        };
        let file = match checked {
            Ok(file) => file,
            Err(rejected) => {
                debug!(state = self.state.name(), "search: request refused: {rejected}");
                self.notices.push(Notice::error(rejected.to_string()));
                return Err(rejected);
            }
        };

        self.generation += 1;
        self.state = SearchState::Searching;
        debug!(generation = self.generation, "search: request issued");
        Ok(SearchTicket {
            generation: self.generation,
            file,
            tolerance: self.tolerance,
        })
    }

    /// Applies a finished request, unless a newer selection or reset has
    /// superseded it.
    pub fn complete(&mut self, completion: SearchCompletion) -> CompletionDisposition {
        if completion.generation != self.generation
            || !matches!(self.state, SearchState::Searching)
        {
            warn!(
                response_generation = completion.generation,
                current_generation = self.generation,
                "search: discarding stale response"
            );
            return CompletionDisposition::Stale;
        }

        self.state = match completion.outcome {
            Ok(response) => {
                info!(matches = response.matches.len(), "search: results ready");
                self.notices.push(Notice::success(SEARCH_SUCCEEDED_NOTICE));
                SearchState::ResultsReady(SearchResult {
                    matches: response.matches,
                    tolerance_used: response.tolerance_used,
                    total_images_checked: response.total_images_checked,
                })
            }
            Err(err) => {
                warn!("search: failed: {err}");
                self.notices.push(Notice::error(SEARCH_FAILED_NOTICE));
                SearchState::SearchFailed(err)
            }
        };
        CompletionDisposition::Applied
    }

    pub async fn search(&mut self, service: &dyn PhotoService) -> Result<&SearchState, SearchRejected> {
        let ticket = self.begin_search()?;
        let completion = ticket.run(service).await;
        self.complete(completion);
        Ok(&self.state)
    }

    /// After a failure, re-arms the search with the same reference.
    pub fn retry(&mut self) -> bool {
        if !matches!(self.state, SearchState::SearchFailed(_)) || self.reference.is_none() {
            return false;
        }
        self.state = SearchState::ReferenceSelected;
        true
    }

    /// Back to `Idle` from any state; releases the reference preview.
    pub fn reset(&mut self) {
        self.reference = None;
        self.generation += 1;
        self.state = SearchState::Idle;
        debug!(generation = self.generation, "search: reset");
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn result(&self) -> Option<&SearchResult> {
        match &self.state {
            SearchState::ResultsReady(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ServiceError> {
        match &self.state {
            SearchState::SearchFailed(err) => Some(err),
            _ => None,
        }
    }

    pub fn reference_preview(&self) -> Option<&PreviewHandle> {
        self.reference.as_ref().map(|reference| &reference.preview)
    }

    pub fn reference_file(&self) -> Option<&LocalFile> {
        self.reference.as_ref().map(|reference| &reference.file)
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn is_searching(&self) -> bool {
        matches!(self.state, SearchState::Searching)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.take()
    }
}

#[cfg(test)]
#[path = "tests/search_tests.rs"]
mod tests;
