use reqwest::StatusCode;
use shared::domain::MakeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error("malformed response body: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Coarse category of a fetch failure, kept as data for callers that pick a
/// remedy without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The catalog could not be reached at all.
    Unreachable,
    /// The catalog answered with a non-success HTTP status.
    Rejected(u16),
    /// The body was not the expected envelope.
    Malformed,
}

impl From<&FetchFailure> for FailureKind {
    fn from(failure: &FetchFailure) -> Self {
        match failure {
            FetchFailure::Transport(err) => match err.status() {
                Some(status) => FailureKind::Rejected(status.as_u16()),
                None => FailureKind::Unreachable,
            },
            FetchFailure::Status(status) => FailureKind::Rejected(status.as_u16()),
            FetchFailure::Decode(_) => FailureKind::Malformed,
        }
    }
}

/// A single catalog request that did not produce a usable result list.
#[derive(Debug, Error)]
#[error("catalog request to {url} failed: {cause}")]
pub struct RemoteFetchError {
    pub url: String,
    #[source]
    pub cause: FetchFailure,
}

impl RemoteFetchError {
    pub fn transport(url: impl Into<String>, err: reqwest::Error) -> Self {
        Self {
            url: url.into(),
            cause: FetchFailure::Transport(err),
        }
    }

    pub fn status(url: impl Into<String>, status: StatusCode) -> Self {
        Self {
            url: url.into(),
            cause: FetchFailure::Status(status),
        }
    }

    pub fn decode(url: impl Into<String>, err: serde_json::Error) -> Self {
        Self {
            url: url.into(),
            cause: FetchFailure::Decode(err),
        }
    }

    pub fn kind(&self) -> FailureKind {
        FailureKind::from(&self.cause)
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        match &self.cause {
            FetchFailure::Status(status) => Some(*status),
            FetchFailure::Transport(err) => err.status(),
            FetchFailure::Decode(_) => None,
        }
    }
}

/// First failure observed in a model fan-out; the rest of the batch is discarded.
#[derive(Debug, Error)]
#[error("model lookup for make {} failed: {source}", .make_id.0)]
pub struct AggregationError {
    pub make_id: MakeId,
    pub source: RemoteFetchError,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("make {} is not offered for vehicle type '{vehicle_type}'", .make_id.0)]
    UnknownMake {
        make_id: MakeId,
        vehicle_type: String,
    },
}
