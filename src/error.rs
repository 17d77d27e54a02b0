//! Error taxonomy for the ingestion pipeline.

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors surfaced by a cycle, a batch write or startup.
///
/// Causes coming from the collaborators (HTTP client, SQLite) are kept as
/// `anyhow::Error` so their context chain is rendered in the message.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Fetching the parkings list failed (network, timeout, decode, archive read)
    #[error("parking source unavailable: {cause:#}")]
    SourceUnavailable { cause: anyhow::Error },

    /// A required field is absent from a station snapshot
    #[error("malformed snapshot for station {}: missing field '{field}'", .station.as_deref().unwrap_or("<unknown>"))]
    MalformedSnapshot {
        station: Option<String>,
        field: &'static str,
    },

    /// The store could not be opened, pinged or prepared
    #[error("storage unavailable: {cause:#}")]
    StorageUnavailable { cause: anyhow::Error },

    /// An insert or commit failed; `committed` rows from earlier batches are durable
    #[error("write failed after {committed} committed rows: {cause:#}")]
    Write {
        committed: usize,
        cause: anyhow::Error,
    },

    /// The record sink stopped accepting records before the cycle finished
    #[error("record sink closed before the cycle completed")]
    SinkClosed,
}

impl IngestError {
    pub fn source_unavailable(cause: impl Into<anyhow::Error>) -> Self {
        IngestError::SourceUnavailable {
            cause: cause.into(),
        }
    }

    pub fn storage_unavailable(cause: impl Into<anyhow::Error>) -> Self {
        IngestError::StorageUnavailable {
            cause: cause.into(),
        }
    }
}
