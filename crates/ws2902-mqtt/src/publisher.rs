//! Outbound bus boundary.
//!
//! Sensors publish through the `Publisher` trait instead of holding an MQTT
//! client directly, so the ingest path is testable with a recording mock.

use thiserror::Error;

/// Errors from a publish call.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The client could not enqueue the message (event loop gone, queue closed).
    #[error("Publish failed on {topic}: {reason}")]
    SendFailed { topic: String, reason: String },
}

/// Fire-and-forget publish onto the message bus.
///
/// Returns once the message has been handed to the client; delivery is not
/// awaited. Implementations must be shareable across request handlers.
pub trait Publisher: Send + Sync + 'static {
    fn publish(
        &self,
        topic: &str,
        payload: String,
        retained: bool,
    ) -> impl std::future::Future<Output = Result<(), PublishError>> + Send;
}

// ── RecordingPublisher for testing ───────────────────────────────────────
