//! Terminal outcome of a session.

use serde::{Deserialize, Serialize};

/// Why a session failed.
///
/// Distinguishes intentional aborts from network trouble so callers can
/// react differently to each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection, DNS, or TLS level failure reported by the transport.
    Network { message: String },
    /// The transport tore the request down without a network diagnosis.
    Aborted,
    /// The caller cancelled the session.
    Cancelled,
}

/// How a session ended. Reported exactly once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure { kind: FailureKind },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Returns `true` when the session ended through caller cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Outcome::Failure {
                kind: FailureKind::Cancelled
            }
        )
    }
}
