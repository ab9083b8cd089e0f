use thiserror::Error;

/// Error taxonomy for the gateway.  Each variant maps to one
/// machine-readable kind in error responses; the HTTP status mapping
/// lives with the handlers in the server binary.
#[derive(Error, Debug)]
pub enum RibbonError {
    // identifier has no recognizable prefix delimiter
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("not found: {0}")]
    DataNotFound(String),

    // the requested slim name has no defined categories
    #[error("no categories defined for subset: {0}")]
    UnknownSlim(String),

    // transport failure after exhausting retries
    #[error("{service} unavailable: {detail}")]
    UpstreamUnavailable {
        service: &'static str,
        detail: String,
    },

    // the backend responded but with a shape we can't use
    #[error("unexpected response from {service}: {detail}")]
    UpstreamData {
        service: &'static str,
        detail: String,
    },
}

impl RibbonError {
    pub fn kind(&self) -> &'static str {
        match self {
            RibbonError::InvalidIdentifier(_) => "invalid_identifier",
            RibbonError::DataNotFound(_) => "not_found",
            RibbonError::UnknownSlim(_) => "unknown_subset",
            RibbonError::UpstreamUnavailable { .. } => "upstream_unavailable",
            RibbonError::UpstreamData { .. } => "upstream_data_error",
        }
    }
}

pub type RibbonResult<T> = Result<T, RibbonError>;
