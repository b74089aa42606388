//! Contract between a session and the transport that carries its request.
//!
//! The transport is an external collaborator: it owns DNS, TLS, sockets,
//! and HTTP wire semantics. A session consumes it through three pieces:
//!
//! * [`Transport::start_request`] constructs the underlying request and
//!   returns a [`TransportStream`]: a cancel capability plus a channel of
//!   [`TransportEvent`]s.
//! * The event channel delivers everything the transport observes, in the
//!   order it observed it. The response head precedes any data chunk, data
//!   chunks arrive in byte order, and completion is always last.
//! * One-shot capabilities ([`ResumeSignal`], [`RetrySignal`],
//!   [`AuthResponder`], [`RedirectResponder`]) ride on individual events.
//!   Dropping one unfired is meaningful: the transport must treat an
//!   unfulfilled resume as "stop, no more data will be consumed", and an
//!   unanswered responder as abandonment.

use std::fmt;

use tokio::sync::{mpsc, oneshot};

use netload_protocol::{
    AuthChallengeInfo, AuthDecision, FailureKind, RedirectDecision, RedirectInfo,
    RequestDescriptor, ResponseHead, SessionOptions,
};

use crate::error::Result;

/// Starts requests on behalf of sessions.
pub trait Transport: Send + Sync {
    /// Constructs and starts the underlying request.
    ///
    /// Fails fast when the request cannot be constructed at all; failures
    /// after construction are reported through a `Complete` event instead.
    fn start_request(
        &self,
        descriptor: &RequestDescriptor,
        options: &SessionOptions,
    ) -> Result<TransportStream>;
}

/// Live transport operation: the cancel capability and the event stream.
pub struct TransportStream {
    pub handle: Box<dyn RequestHandle>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Exclusive handle on the in-flight transport operation.
///
/// Consumed by `cancel`; dropping the handle without cancelling merely
/// releases the reference and lets the request run to completion.
pub trait RequestHandle: Send {
    /// Tears down the underlying request immediately.
    fn cancel(self: Box<Self>);
}

/// Everything the transport can tell a session, in delivery order.
#[derive(Debug)]
pub enum TransportEvent {
    /// A final (non-redirect, non-auth) response head arrived.
    ResponseStarted { head: ResponseHead },
    /// The server redirected; the transport holds the request until the
    /// responder is answered.
    Redirect {
        info: RedirectInfo,
        head: ResponseHead,
        responder: RedirectResponder,
    },
    /// The server or a proxy demanded credentials; the transport holds the
    /// request until the responder is answered.
    AuthRequired {
        challenge: AuthChallengeInfo,
        responder: AuthResponder,
    },
    /// One body chunk. The transport suspends until `resume` fires.
    Data { chunk: Vec<u8>, resume: ResumeSignal },
    UploadProgress { position: u64, total: u64 },
    DownloadProgress { current: u64 },
    /// The transport wants to retry after a transient failure and waits
    /// for permission.
    Retry { start: RetrySignal },
    /// The request finished. Always the last event; `error` classifies a
    /// failure and is ignored on success.
    Complete {
        success: bool,
        error: Option<FailureKind>,
    },
}

/// One-shot permission for the transport to deliver the next body chunk.
pub struct ResumeSignal {
    tx: oneshot::Sender<()>,
}

impl ResumeSignal {
    /// Creates the signal and the receiver the transport suspends on.
    ///
    /// The receiver resolves with an error when the signal is dropped
    /// unfired, which the transport must treat as "stop".
    pub fn pair() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Permits the next chunk.
    pub fn resume(self) {
        let _ = self.tx.send(());
    }
}

impl fmt::Debug for ResumeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResumeSignal")
    }
}

/// One-shot permission for the transport to retry the request.
pub struct RetrySignal {
    tx: oneshot::Sender<()>,
}

impl RetrySignal {
    pub fn pair() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Permits the retry.
    pub fn start(self) {
        let _ = self.tx.send(());
    }
}

impl fmt::Debug for RetrySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetrySignal")
    }
}

/// One-shot channel carrying the caller's answer to an auth challenge.
///
/// Held by the session while it is awaiting credentials; answered at most
/// once. Dropping it unanswered leaves the transport suspended, which is
/// the documented consequence of a caller never resolving a challenge.
pub struct AuthResponder {
    tx: oneshot::Sender<AuthDecision>,
}

impl AuthResponder {
    pub fn pair() -> (Self, oneshot::Receiver<AuthDecision>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Forwards the caller's decision to the transport.
    pub fn respond(self, decision: AuthDecision) {
        let _ = self.tx.send(decision);
    }
}

impl fmt::Debug for AuthResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthResponder")
    }
}

/// One-shot channel carrying the caller's redirect decision.
///
/// Rides on the redirect event all the way to the caller, who replies
/// before the transport re-issues the request.
pub struct RedirectResponder {
    tx: oneshot::Sender<RedirectDecision>,
}

impl RedirectResponder {
    pub fn pair() -> (Self, oneshot::Receiver<RedirectDecision>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Replies with an explicit decision.
    pub fn respond(self, decision: RedirectDecision) {
        let _ = self.tx.send(decision);
    }

    /// Follows the redirect with request headers unchanged.
    pub fn follow(self) {
        self.respond(RedirectDecision::follow());
    }
}

impl fmt::Debug for RedirectResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RedirectResponder")
    }
}
