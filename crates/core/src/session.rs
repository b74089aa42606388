//! Request session state machine and caller-facing handle.
//!
//! A [`RequestSession`] orchestrates exactly one request on top of a
//! [`Transport`]: it forwards transport events to the caller, withholds the
//! transport's resume capability until the caller acknowledges each body
//! chunk, and keeps itself alive until the request has settled.
//!
//! # Event Flow
//!
//! 1. Caller invokes [`RequestSession::start`] with a descriptor
//! 2. The descriptor is validated and the transport request constructed;
//!    either can fail before a session exists
//! 3. The session registers itself, pins itself, and spawns a dispatch
//!    task that drains the transport's event channel
//! 4. Each event is applied to the state machine under one lock and
//!    forwarded to the caller through the handle's event stream
//! 5. On completion, failure, or cancellation the session unpins,
//!    unregisters, and closes the event stream
//!
//! # Serialization
//!
//! Transport events and caller-issued operations (`acknowledge_chunk`,
//! `cancel`, `resolve_auth`) all serialize on the session's state lock, and
//! every event is emitted while that lock is held. No two callbacks for one
//! session observe each other mid-transition, and the caller sees events in
//! exactly the order the transport experienced them.
//!
//! # Example
//!
//! ```no_run
//! # use netload::session::{RequestSession, SessionEvent};
//! # use netload_protocol::{Method, RequestDescriptor, SessionOptions};
//! # async fn example(transport: &dyn netload::transport::Transport) -> netload::Result<()> {
//! let descriptor = RequestDescriptor::new(Method::Get, "https://example.com/data");
//! let mut handle = RequestSession::start(transport, descriptor, SessionOptions::default())?;
//!
//! while let Some(event) = handle.next_event().await {
//!     match event {
//!         SessionEvent::Data { chunk } => {
//!             // absorb the chunk, then let the transport continue
//!             handle.acknowledge_chunk();
//!             let _ = chunk;
//!         }
//!         SessionEvent::Complete { outcome } => {
//!             let _ = outcome;
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use netload_protocol::{
    AuthChallengeInfo, AuthDecision, FailureKind, Outcome, RedirectInfo, RequestDescriptor,
    ResponseHead, SessionOptions,
};

use crate::consumer::StreamingConsumer;
use crate::error::{Error, Result};
use crate::pin::LifetimePin;
use crate::registry::SessionRegistry;
use crate::transport::{
    AuthResponder, RedirectResponder, RequestHandle, ResumeSignal, RetrySignal, Transport,
    TransportEvent,
};

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Started,
    AwaitingAuth,
    Redirected,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl Phase {
    /// Terminal phases never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed | Phase::Cancelled)
    }
}

/// Events forwarded to the external caller, in transport order.
#[derive(Debug)]
pub enum SessionEvent {
    ResponseStarted {
        head: ResponseHead,
    },
    /// The caller must answer the responder before the transport follows.
    Redirect {
        info: RedirectInfo,
        head: ResponseHead,
        responder: RedirectResponder,
    },
    /// Resolved out-of-band through [`resolve_auth`] with the session id.
    AuthRequired {
        challenge: AuthChallengeInfo,
    },
    /// One body chunk; delivery of the next is held until
    /// [`SessionHandle::acknowledge_chunk`].
    Data {
        chunk: Vec<u8>,
    },
    UploadProgress {
        position: u64,
        total: u64,
    },
    DownloadProgress {
        current: u64,
    },
    /// Terminal. Reported exactly once per session.
    Complete {
        outcome: Outcome,
    },
}

struct SessionState {
    phase: Phase,
    // Some iff the phase is not terminal.
    handle: Option<Box<dyn RequestHandle>>,
    // Some iff the next body chunk is being withheld from the transport.
    pending_resume: Option<ResumeSignal>,
    // Some iff the phase is AwaitingAuth.
    pending_auth: Option<AuthResponder>,
    // None once terminal cleanup has closed the caller's event stream.
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    upload_bytes: u64,
    download_bytes: u64,
    retry_count: u32,
}

impl SessionState {
    fn emit(&mut self, event: SessionEvent) {
        if let Some(events) = &self.events {
            // The caller may have dropped its handle mid-flight; events are
            // then discarded while the session runs to its terminal state.
            let _ = events.send(event);
        }
    }
}

/// One request's end-to-end lifecycle object.
///
/// Callers normally interact through the [`SessionHandle`] returned by
/// [`RequestSession::start`]; the id-keyed functions in this module cover
/// resolution paths that arrive from outside the handle's call chain.
pub struct RequestSession {
    id: u32,
    options: SessionOptions,
    state: Mutex<SessionState>,
    pin: LifetimePin<RequestSession>,
}

impl RequestSession {
    /// Validates the descriptor, starts the transport request, and spawns
    /// the dispatch task.
    ///
    /// Fails fast with [`Error::Construction`] on a malformed descriptor
    /// and with the transport's error when the request cannot be
    /// constructed; in both cases no session is created or registered.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(
        transport: &dyn Transport,
        descriptor: RequestDescriptor,
        options: SessionOptions,
    ) -> Result<SessionHandle> {
        validate_descriptor(&descriptor)?;
        let stream = transport.start_request(&descriptor, &options)?;

        let id = SessionRegistry::global().allocate_id();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let session = Arc::new(RequestSession {
            id,
            options,
            state: Mutex::new(SessionState {
                phase: Phase::Created,
                handle: Some(stream.handle),
                pending_resume: None,
                pending_auth: None,
                events: Some(event_tx),
                upload_bytes: 0,
                download_bytes: 0,
                retry_count: 0,
            }),
            pin: LifetimePin::new(),
        });

        SessionRegistry::global().register(id, &session);
        session.pin.acquire(Arc::clone(&session));
        session.state.lock().phase = Phase::Started;
        debug!(target: "netload.session", id, url = %descriptor.url, "session started");

        Self::spawn_dispatch(Arc::downgrade(&session), stream.events);

        Ok(SessionHandle {
            session,
            events: event_rx,
        })
    }

    /// Resolves an id to a live session.
    pub fn from_id(id: u32) -> Option<Arc<RequestSession>> {
        SessionRegistry::global().lookup(id)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Bytes reported so far as `(uploaded, downloaded)`.
    pub fn progress(&self) -> (u64, u64) {
        let state = self.state.lock();
        (state.upload_bytes, state.download_bytes)
    }

    /// Releases the withheld resume capability, permitting the next body
    /// chunk. A call with no chunk pending is a benign no-op; callers and
    /// transport timing can race and the no-op must win.
    pub fn acknowledge_chunk(&self) {
        let mut state = self.state.lock();
        match state.pending_resume.take() {
            Some(resume) => resume.resume(),
            None => {
                debug!(target: "netload.session", id = self.id, "acknowledge with no pending chunk");
            }
        }
    }

    /// Forwards the caller's auth decision to the transport.
    ///
    /// Fails when the session is not currently holding a challenge, which
    /// also covers challenges that were cleared by completion or
    /// cancellation racing ahead of the caller.
    pub fn resolve_auth(&self, decision: AuthDecision) -> Result<()> {
        let mut state = self.state.lock();
        let Some(responder) = state.pending_auth.take() else {
            return Err(Error::NotAwaitingAuth { id: self.id });
        };
        state.phase = Phase::Started;
        debug!(target: "netload.session", id = self.id, "auth challenge resolved");
        responder.respond(decision);
        Ok(())
    }

    /// Tears down the transport request and settles the session as
    /// cancelled. Safe to call repeatedly; every call after the first is a
    /// no-op.
    ///
    /// A resume capability withheld at this moment is discarded without
    /// being fired, which the transport reads as "no more data will be
    /// consumed".
    pub fn cancel(&self) {
        {
            let mut state = self.state.lock();
            if state.phase.is_terminal() {
                return;
            }
            state.phase = Phase::Cancelled;
            state.pending_resume = None;
            state.pending_auth = None;
            if let Some(handle) = state.handle.take() {
                handle.cancel();
            }
            state.emit(SessionEvent::Complete {
                outcome: Outcome::Failure {
                    kind: FailureKind::Cancelled,
                },
            });
            state.events = None;
        }
        debug!(target: "netload.session", id = self.id, "session cancelled");
        self.finish();
    }

    fn spawn_dispatch(
        session: Weak<RequestSession>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                // Upgrading per event means each in-flight callback holds
                // its own strong reference; once the pin and the caller's
                // handle are both gone the loop winds down.
                let Some(session) = session.upgrade() else {
                    break;
                };
                session.dispatch(event);
                if session.phase().is_terminal() {
                    break;
                }
            }
        });
    }

    fn dispatch(&self, event: TransportEvent) {
        match event {
            TransportEvent::ResponseStarted { head } => self.on_response_started(head),
            TransportEvent::Redirect {
                info,
                head,
                responder,
            } => self.on_redirect(info, head, responder),
            TransportEvent::AuthRequired {
                challenge,
                responder,
            } => self.on_auth_required(challenge, responder),
            TransportEvent::Data { chunk, resume } => self.on_data_received(chunk, resume),
            TransportEvent::UploadProgress { position, total } => {
                self.on_upload_progress(position, total)
            }
            TransportEvent::DownloadProgress { current } => self.on_download_progress(current),
            TransportEvent::Retry { start } => self.on_retry(start),
            TransportEvent::Complete { success, error } => self.on_complete(success, error),
        }
    }

    fn on_response_started(&self, head: ResponseHead) {
        let mut state = self.state.lock();
        if state.phase.is_terminal() {
            return;
        }
        state.phase = Phase::Streaming;
        state.emit(SessionEvent::ResponseStarted { head });
    }

    fn on_redirect(&self, info: RedirectInfo, head: ResponseHead, responder: RedirectResponder) {
        let mut state = self.state.lock();
        if state.phase.is_terminal() {
            // Dropping the responder tells the transport to abandon the
            // redirect.
            return;
        }
        state.phase = Phase::Redirected;
        debug!(target: "netload.session", id = self.id, to = %info.new_url, "redirect intercepted");
        state.emit(SessionEvent::Redirect {
            info,
            head,
            responder,
        });
    }

    fn on_auth_required(&self, challenge: AuthChallengeInfo, responder: AuthResponder) {
        let mut state = self.state.lock();
        if state.phase.is_terminal() {
            return;
        }
        state.phase = Phase::AwaitingAuth;
        state.pending_auth = Some(responder);
        debug!(
            target: "netload.session",
            id = self.id,
            url = %challenge.url,
            is_proxy = challenge.is_proxy,
            "auth challenge intercepted"
        );
        state.emit(SessionEvent::AuthRequired { challenge });
    }

    fn on_upload_progress(&self, position: u64, total: u64) {
        let mut state = self.state.lock();
        if state.phase.is_terminal() || position < state.upload_bytes {
            return;
        }
        state.upload_bytes = position;
        state.emit(SessionEvent::UploadProgress { position, total });
    }

    fn on_download_progress(&self, current: u64) {
        let mut state = self.state.lock();
        if state.phase.is_terminal() || current < state.download_bytes {
            return;
        }
        state.download_bytes = current;
        state.emit(SessionEvent::DownloadProgress { current });
    }

    fn finish(&self) {
        SessionRegistry::global().unregister(self.id);
        self.pin.release();
        debug!(target: "netload.session", id = self.id, "session settled");
    }
}

impl StreamingConsumer for RequestSession {
    fn on_data_received(&self, chunk: Vec<u8>, resume: ResumeSignal) {
        let mut state = self.state.lock();
        if state.phase.is_terminal() {
            // Late chunk racing a cancellation; the dropped resume stops
            // the transport.
            return;
        }
        if state.phase != Phase::Streaming {
            warn!(
                target: "netload.session",
                id = self.id,
                phase = ?state.phase,
                "body data before response head; dropping"
            );
            return;
        }
        debug_assert!(
            state.pending_resume.is_none(),
            "transport delivered a chunk while one was unacknowledged"
        );
        state.pending_resume = Some(resume);
        state.emit(SessionEvent::Data { chunk });
    }

    fn on_complete(&self, success: bool, error: Option<FailureKind>) {
        {
            let mut state = self.state.lock();
            if state.phase.is_terminal() {
                return;
            }
            state.pending_resume = None;
            state.pending_auth = None;
            state.handle = None;
            let outcome = if success {
                state.phase = Phase::Completed;
                Outcome::Success
            } else {
                state.phase = Phase::Failed;
                Outcome::Failure {
                    kind: error.unwrap_or(FailureKind::Aborted),
                }
            };
            state.emit(SessionEvent::Complete { outcome });
            state.events = None;
        }
        self.finish();
    }

    fn on_retry(&self, start_retry: RetrySignal) {
        let mut state = self.state.lock();
        if state.phase.is_terminal() {
            debug!(target: "netload.session", id = self.id, "retry suppressed after teardown");
            return;
        }
        if !self.options.forward_retries {
            debug!(target: "netload.session", id = self.id, "retry suppressed by options");
            return;
        }
        state.retry_count += 1;
        debug!(target: "netload.session", id = self.id, count = state.retry_count, "transport retry");
        start_retry.start();
    }
}

/// External caller's grip on a session: its id, its event stream, and the
/// operations the caller issues against it.
///
/// Dropping the handle does not cancel the request; the session's pin
/// keeps it running until the transport settles it.
pub struct SessionHandle {
    session: Arc<RequestSession>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionHandle {
    pub fn id(&self) -> u32 {
        self.session.id()
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    /// Next session event, or `None` once the session has settled and the
    /// stream is drained.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn acknowledge_chunk(&self) {
        self.session.acknowledge_chunk();
    }

    pub fn cancel(&self) {
        self.session.cancel();
    }

    pub fn resolve_auth(&self, decision: AuthDecision) -> Result<()> {
        self.session.resolve_auth(decision)
    }
}

/// Releases the pending chunk of the session with this id, if any.
pub fn acknowledge_chunk(id: u32) {
    if let Some(session) = RequestSession::from_id(id) {
        session.acknowledge_chunk();
    }
}

/// Cancels the session with this id. Unknown and already-settled ids are
/// no-ops.
pub fn cancel(id: u32) {
    if let Some(session) = RequestSession::from_id(id) {
        session.cancel();
    }
}

/// Resolves a pending auth challenge by session id.
///
/// Reports failure, never panics, when the id is unknown or the session
/// has moved on; the registry is left untouched in both cases.
pub fn resolve_auth(id: u32, decision: AuthDecision) -> Result<()> {
    let Some(session) = RequestSession::from_id(id) else {
        return Err(Error::UnknownSession { id });
    };
    session.resolve_auth(decision)
}

fn validate_descriptor(descriptor: &RequestDescriptor) -> Result<()> {
    if descriptor.url.trim().is_empty() {
        return Err(Error::Construction("request target is empty".to_string()));
    }
    let url = Url::parse(&descriptor.url)
        .map_err(|e| Error::Construction(format!("malformed request target: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::Construction(format!(
                "unsupported scheme `{other}`"
            )));
        }
    }
    if descriptor.body.is_some() && !descriptor.method.allows_body() {
        return Err(Error::Construction(format!(
            "{} requests cannot carry a body",
            descriptor.method
        )));
    }
    Ok(())
}
