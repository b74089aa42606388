// netload: asynchronous, cancellable request sessions with streamed,
// backpressured bodies.
//
// The transport that actually moves bytes is an external collaborator
// consumed through the `transport` module's contract; everything here
// orchestrates one request's lifecycle on top of it.

pub mod consumer;
pub mod error;
pub mod fake_transport;
pub mod pin;
pub mod registry;
pub mod session;
pub mod transport;

pub use netload_protocol as protocol;

pub use consumer::StreamingConsumer;
pub use error::{Error, Result};
pub use fake_transport::{FakeTransport, FakeTransportBuilder, FakeTransportController};
pub use pin::LifetimePin;
pub use registry::SessionRegistry;
pub use session::{
    Phase, RequestSession, SessionEvent, SessionHandle, acknowledge_chunk, cancel, resolve_auth,
};
pub use transport::{
    AuthResponder, RedirectResponder, RequestHandle, ResumeSignal, RetrySignal, Transport,
    TransportEvent, TransportStream,
};
