//! Drive upstream byte streams into outbound response streams.
//!
//! Each relay owns a [`CancellationToken`] (a child of the server's shutdown
//! token) and a per-chunk idle timeout. On a read error, a timeout or a
//! cancellation the outbound stream just ends, without a terminal chunk.

use crate::logging::{LogLevel, SharedLogger};
use crate::translate::streaming::ChunkRelay;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde_json::json;
use std::fmt::Display;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a relay stopped before the upstream finished.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    IdleTimeout,
    ReadError(String),
}

async fn next_chunk<S, E>(
    upstream: &mut S,
    cancel: &CancellationToken,
    idle_timeout: Duration,
) -> std::result::Result<Option<Bytes>, Interrupt>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        next = tokio::time::timeout(idle_timeout, upstream.next()) => match next {
            Err(_) => Err(Interrupt::IdleTimeout),
            Ok(None) => Ok(None),
            Ok(Some(Ok(bytes))) => Ok(Some(bytes)),
            Ok(Some(Err(e))) => Err(Interrupt::ReadError(e.to_string())),
        },
    }
}

fn log_interrupt(logger: &SharedLogger, component: &str, interrupt: &Interrupt, chunks: usize) {
    let (level, reason) = match interrupt {
        Interrupt::Cancelled => (LogLevel::Info, "cancelled".to_string()),
        Interrupt::IdleTimeout => (LogLevel::Warn, "idle timeout".to_string()),
        Interrupt::ReadError(e) => (LogLevel::Error, e.clone()),
    };
    logger.log_with_context(
        level,
        component,
        format!("Stream ended early: {reason}"),
        json!({ "chunks": chunks }),
    );
}

/// Relay an upstream text stream as OpenAI chunk payloads (the text after
/// `data: `), ending with the terminal chunk and `[DONE]` on success.
pub fn relay_chat_stream<S, E>(
    upstream: S,
    mut relay: ChunkRelay,
    cancel: CancellationToken,
    idle_timeout: Duration,
    logger: SharedLogger,
) -> impl Stream<Item = String> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let upstream = upstream;
        tokio::pin!(upstream);
        let mut chunks = 0usize;

        loop {
            match next_chunk(&mut upstream, &cancel, idle_timeout).await {
                Ok(Some(bytes)) => {
                    chunks += 1;
                    if let Some(payload) = relay.push(&bytes) {
                        yield payload;
                    }
                }
                Ok(None) => {
                    for payload in relay.finish() {
                        yield payload;
                    }
                    logger.log_with_context(
                        LogLevel::Info,
                        "stream",
                        "Stream completed",
                        json!({ "id": relay.id(), "chunks": chunks }),
                    );
                    break;
                }
                Err(interrupt) => {
                    relay.fail();
                    log_interrupt(&logger, "stream", &interrupt, chunks);
                    break;
                }
            }
        }
    }
}

/// Relay upstream bytes unmodified, under the same cancellation and idle rules.
pub fn passthrough_stream<S, E>(
    upstream: S,
    cancel: CancellationToken,
    idle_timeout: Duration,
    logger: SharedLogger,
) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let upstream = upstream;
        tokio::pin!(upstream);
        let mut chunks = 0usize;

        loop {
            match next_chunk(&mut upstream, &cancel, idle_timeout).await {
                Ok(Some(bytes)) => {
                    chunks += 1;
                    yield Ok(bytes);
                }
                Ok(None) => {
                    logger.log_with_context(
                        LogLevel::Info,
                        "stream",
                        "Passthrough stream completed",
                        json!({ "chunks": chunks }),
                    );
                    break;
                }
                Err(interrupt) => {
                    log_interrupt(&logger, "stream", &interrupt, chunks);
                    break;
                }
            }
        }
    }
}
