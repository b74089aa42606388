//! Streaming contract a session fulfils toward the transport.

use netload_protocol::FailureKind;

use crate::transport::{ResumeSignal, RetrySignal};

/// Receiver side of a streamed response body.
///
/// Implementations must hold on to `resume` rather than firing it from
/// `on_data_received`; releasing it is the consumer's acknowledgment that
/// the chunk has been absorbed. Auto-resuming from inside the callback
/// would let the transport outrun the consumer and is forbidden.
pub trait StreamingConsumer: Send + Sync {
    /// One body chunk arrived. The transport is suspended until the resume
    /// signal fires or is dropped.
    fn on_data_received(&self, chunk: Vec<u8>, resume: ResumeSignal);

    /// The transfer finished. `error` classifies a failure and is absent
    /// on success. Always the final notification.
    fn on_complete(&self, success: bool, error: Option<FailureKind>);

    /// The transport hit a transient failure and asks permission to retry.
    fn on_retry(&self, start_retry: RetrySignal);
}
