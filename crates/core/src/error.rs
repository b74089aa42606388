//! Error types for the session engine.

use netload_protocol::FailureKind;

/// Errors surfaced by session construction and caller-issued operations.
///
/// Failures of an in-flight request are not errors in this sense; they are
/// reported once through the session's `Complete` event. This enum covers
/// the synchronous surface: rejecting a malformed descriptor before any
/// session exists, and refusing operations against sessions that are gone
/// or in the wrong phase.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request descriptor is malformed; no session was created.
    #[error("malformed request: {0}")]
    Construction(String),

    /// The transport could not construct or start the underlying request.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The session was cancelled by the caller.
    #[error("session cancelled")]
    Cancelled,

    /// No live session carries this id.
    #[error("no session with id {id}")]
    UnknownSession { id: u32 },

    /// The session is not currently holding an authentication challenge.
    #[error("session {id} is not awaiting credentials")]
    NotAwaitingAuth { id: u32 },
}

impl Error {
    /// Returns `true` for caller-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<FailureKind> for Error {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Network { message } => Error::Transport(message),
            FailureKind::Aborted => Error::Transport("aborted by transport".to_string()),
            FailureKind::Cancelled => Error::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kind_maps_onto_error_taxonomy() {
        let err: Error = FailureKind::Network {
            message: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Transport(_)));

        let err: Error = FailureKind::Cancelled.into();
        assert!(err.is_cancelled());

        let err: Error = FailureKind::Aborted.into();
        assert!(!err.is_cancelled());
    }
}
