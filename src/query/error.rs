use leptos::ServerFnError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a query or mutation failed.
///
/// Stored in the cache next to successful values, so it has to be cloneable
/// and serializable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum QueryError {
    /// The producer's request failed.
    #[error("request failed: {0}")]
    Request(String),
    /// A producer could not read an input back out of its key.
    #[error("query key {key} has no usable part at index {index}")]
    InvalidKey { key: String, index: usize },
    /// Cached or dehydrated data could not be decoded.
    #[error("failed to decode cached data: {0}")]
    Decode(String),
}

impl From<ServerFnError> for QueryError {
    fn from(error: ServerFnError) -> Self {
        QueryError::Request(error.to_string())
    }
}

impl From<leptos::SerializationError> for QueryError {
    fn from(error: leptos::SerializationError) -> Self {
        QueryError::Decode(error.to_string())
    }
}

/// The value a query or mutation resolves to.
pub type QueryResponse<T> = Result<T, QueryError>;
