use crate::services::{ApiError, StoreError};
use thiserror::Error;

/// User-facing failures of the search engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// Action blocked locally, nothing was sent
    #[error("{0}")]
    Validation(String),

    /// A remote call failed; already displayed data is kept
    #[error("{0}")]
    Request(String),

    /// Saved state could not be read or written
    #[error("{0}")]
    Persistence(String),

    /// Session lifecycle failure (login state, remote logout)
    #[error("{0}")]
    Session(String),
}

impl From<ApiError> for SearchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => SearchError::Session(err.to_string()),
            other => SearchError::Request(other.to_string()),
        }
    }
}

impl From<StoreError> for SearchError {
    fn from(err: StoreError) -> Self {
        SearchError::Persistence(err.to_string())
    }
}

impl From<validator::ValidationErrors> for SearchError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid {}", field),
                })
            })
            .collect();
        messages.sort();

        SearchError::Validation(messages.join("; "))
    }
}
