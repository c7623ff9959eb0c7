// src/domain/model/outcome.rs
// Result of one independent call made during aggregation

use crate::domain::errors::{SourceError, SourceResult};

#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome<T> {
    Success(T),
    Failure(SourceError),
}

impl<T> SourceOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, SourceOutcome::Success(_))
    }

    /// Drops the failure reason, keeping only the value if there was one.
    pub fn into_option(self) -> Option<T> {
        match self {
            SourceOutcome::Success(value) => Some(value),
            SourceOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&SourceError> {
        match self {
            SourceOutcome::Success(_) => None,
            SourceOutcome::Failure(reason) => Some(reason),
        }
    }
}

impl<T> From<SourceResult<T>> for SourceOutcome<T> {
    fn from(result: SourceResult<T>) -> Self {
        match result {
            Ok(value) => SourceOutcome::Success(value),
            Err(reason) => SourceOutcome::Failure(reason),
        }
    }
}
