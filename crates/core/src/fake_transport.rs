//! Fake transport for unit testing sessions without a network stack.
//!
//! Provides an in-memory [`Transport`] whose controller injects transport
//! events and observes what the session did in return.
//!
//! # Example
//!
//! ```ignore
//! let (transport, controller) = FakeTransportBuilder::new().build();
//! let mut handle = RequestSession::start(&transport, descriptor, options)?;
//!
//! controller.respond(response_head(200, "https://example.com"));
//! let resumed = controller.chunk(b"hello");
//! // ... drive handle.next_event() / handle.acknowledge_chunk() ...
//! controller.complete(true);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use netload_protocol::{
    AuthChallengeInfo, AuthDecision, FailureKind, Method, RedirectDecision, RedirectInfo,
    RequestDescriptor, ResponseHead, SessionOptions,
};

use crate::error::{Error, Result};
use crate::transport::{
    AuthResponder, RedirectResponder, RequestHandle, ResumeSignal, RetrySignal, Transport,
    TransportEvent, TransportStream,
};

/// Builder for fake transport instances.
pub struct FakeTransportBuilder {
    fail_start: Option<String>,
}

impl FakeTransportBuilder {
    pub fn new() -> Self {
        Self { fail_start: None }
    }

    /// Makes `start_request` fail with a transport error, for exercising
    /// fail-fast construction paths.
    pub fn fail_start(mut self, message: &str) -> Self {
        self.fail_start = Some(message.to_string());
        self
    }

    /// Builds the transport and the controller that drives it.
    pub fn build(self) -> (FakeTransport, FakeTransportController) {
        let shared = Arc::new(Shared {
            event_tx: Mutex::new(None),
            started: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
            fail_start: self.fail_start,
        });
        (
            FakeTransport {
                shared: Arc::clone(&shared),
            },
            FakeTransportController { shared },
        )
    }
}

impl Default for FakeTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Shared {
    event_tx: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    started: Mutex<Vec<RequestDescriptor>>,
    cancelled: AtomicBool,
    fail_start: Option<String>,
}

/// In-memory transport; hand it to [`RequestSession::start`].
///
/// [`RequestSession::start`]: crate::session::RequestSession::start
pub struct FakeTransport {
    shared: Arc<Shared>,
}

impl Transport for FakeTransport {
    fn start_request(
        &self,
        descriptor: &RequestDescriptor,
        _options: &SessionOptions,
    ) -> Result<TransportStream> {
        if let Some(message) = &self.shared.fail_start {
            return Err(Error::Transport(message.clone()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.event_tx.lock() = Some(tx);
        self.shared.started.lock().push(descriptor.clone());
        Ok(TransportStream {
            handle: Box::new(FakeRequestHandle {
                shared: Arc::clone(&self.shared),
            }),
            events: rx,
        })
    }
}

struct FakeRequestHandle {
    shared: Arc<Shared>,
}

impl RequestHandle for FakeRequestHandle {
    fn cancel(self: Box<Self>) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Controller for injecting transport events and inspecting session
/// behavior.
///
/// The injection helpers that carry a one-shot capability return its
/// receiver so tests can observe whether the session fired or dropped it.
pub struct FakeTransportController {
    shared: Arc<Shared>,
}

impl FakeTransportController {
    /// Injects a raw transport event.
    pub fn send(&self, event: TransportEvent) {
        if let Some(tx) = &*self.shared.event_tx.lock() {
            let _ = tx.send(event);
        }
    }

    /// Delivers the final response head.
    pub fn respond(&self, head: ResponseHead) {
        self.send(TransportEvent::ResponseStarted { head });
    }

    /// Delivers a redirect; the receiver resolves with the caller's
    /// decision, or an error if the decision was abandoned.
    pub fn redirect(&self, new_url: &str, status: u16) -> oneshot::Receiver<RedirectDecision> {
        let (responder, rx) = RedirectResponder::pair();
        self.send(TransportEvent::Redirect {
            info: RedirectInfo {
                new_url: new_url.to_string(),
                new_method: Method::Get,
                status,
            },
            head: response_head(status, new_url),
            responder,
        });
        rx
    }

    /// Delivers an auth challenge; the receiver resolves with the
    /// caller's decision.
    pub fn challenge(&self, url: &str, is_proxy: bool) -> oneshot::Receiver<AuthDecision> {
        let (responder, rx) = AuthResponder::pair();
        self.send(TransportEvent::AuthRequired {
            challenge: AuthChallengeInfo {
                url: url.to_string(),
                first_attempt: true,
                is_proxy,
                scheme: "basic".to_string(),
                realm: String::new(),
            },
            responder,
        });
        rx
    }

    /// Delivers one body chunk; the receiver resolves when the session
    /// releases the resume capability, or errors when it is discarded.
    pub fn chunk(&self, bytes: &[u8]) -> oneshot::Receiver<()> {
        let (resume, rx) = ResumeSignal::pair();
        self.send(TransportEvent::Data {
            chunk: bytes.to_vec(),
            resume,
        });
        rx
    }

    pub fn upload_progress(&self, position: u64, total: u64) {
        self.send(TransportEvent::UploadProgress { position, total });
    }

    pub fn download_progress(&self, current: u64) {
        self.send(TransportEvent::DownloadProgress { current });
    }

    /// Announces a transport-level retry; the receiver resolves when the
    /// session permits it.
    pub fn retry(&self) -> oneshot::Receiver<()> {
        let (start, rx) = RetrySignal::pair();
        self.send(TransportEvent::Retry { start });
        rx
    }

    /// Finishes the request successfully or with an unclassified failure.
    pub fn complete(&self, success: bool) {
        self.send(TransportEvent::Complete {
            success,
            error: None,
        });
    }

    /// Finishes the request with a classified failure.
    pub fn fail(&self, kind: FailureKind) {
        self.send(TransportEvent::Complete {
            success: false,
            error: Some(kind),
        });
    }

    /// Whether the session tore down the request handle.
    pub fn was_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    /// Descriptors passed to `start_request`, in order.
    pub fn started_requests(&self) -> Vec<RequestDescriptor> {
        self.shared.started.lock().clone()
    }
}

/// Response head with the given status and no headers.
pub fn response_head(status: u16, final_url: &str) -> ResponseHead {
    ResponseHead {
        status,
        status_text: String::new(),
        final_url: final_url.to_string(),
        headers: Default::default(),
    }
}
