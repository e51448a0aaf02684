//! Streaming backpressure via bounded channels.
//!
//! Wraps a token stream in a bounded `tokio::sync::mpsc::channel` so that
//! the model side waits when the display falls behind. Without this, a fast
//! backend can fill unbounded memory while a slow terminal renders.
//!
//! Applied by the retrieval engine to every answer stream. The buffer size
//! defaults to [`DEFAULT_STREAM_BUFFER`] and can be set through
//! [`EngineSettings`](super::EngineSettings).

use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::types::EventStream;

/// Default number of events buffered between producer and consumer.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Wrap a stream in a bounded channel for backpressure.
///
/// Spawns a producer task that reads from `inner` and sends events through
/// a bounded `mpsc` channel. When the channel is full, the producer waits
/// until the consumer reads. If the consumer drops the stream, the
/// producer stops.
///
/// # Panics
///
/// Requires a tokio runtime context (called within an async fn).
pub fn bounded_stream(inner: EventStream, buffer_size: usize) -> EventStream {
    let (tx, rx) = tokio::sync::mpsc::channel(buffer_size.max(1));

    tokio::spawn(async move {
        let mut inner = inner;
        while let Some(item) = inner.next().await {
            if tx.send(item).await.is_err() {
                break; // receiver dropped
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}
