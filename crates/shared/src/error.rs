use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body the recognition service attaches to non-success responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// A response decoded fine but broke an invariant of the wire contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponseContractError {
    #[error("match {index} ({filename}) has confidence {confidence} outside [0, 100]")]
    ConfidenceOutOfRange {
        index: usize,
        filename: String,
        confidence: f64,
    },
}
