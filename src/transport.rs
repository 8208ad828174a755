//! Streaming transport
//!
//! Runs at most one streaming exchange at a time and turns its body into
//! decoded [`StreamEvent`]s. Each exchange runs in its own task, bounded by a
//! wall-clock deadline and a cancellation token, and reports back through a
//! channel of [`TransportSignal`]s tagged with the exchange id.

mod error;
mod framing;
mod http;
pub mod types;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub(crate) mod testing;

pub use error::{TransportError, TransportErrorKind};
pub use framing::RecordDecoder;
pub use http::HttpBackend;
pub use types::{ChatRequest, ChunkHit, ResultBatch, StreamEvent, Surface};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Hard limit on one exchange, measured from subscription
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_millis(300_000);

/// Stand-in deadline for timeouts too large to represent
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Identifies one exchange; assigned by the caller of `subscribe`
pub type ExchangeId = u64;

/// Raw body of an open exchange
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Opens streaming exchanges against the chat backend
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the request and return the response body once headers arrive
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;
}

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        (**self).open(request).await
    }
}

/// What the transport reports about an exchange
#[derive(Debug, Clone)]
pub enum TransportSignal {
    /// One decoded record, in arrival order
    Event {
        exchange: ExchangeId,
        event: StreamEvent,
    },
    /// Body ended, or the exchange was unsubscribed
    Completed { exchange: ExchangeId },
    /// Transport failure or deadline exceeded
    Failed {
        exchange: ExchangeId,
        error: TransportError,
    },
}

impl TransportSignal {
    pub fn exchange(&self) -> ExchangeId {
        match self {
            TransportSignal::Event { exchange, .. }
            | TransportSignal::Completed { exchange }
            | TransportSignal::Failed { exchange, .. } => *exchange,
        }
    }
}

struct ActiveExchange {
    id: ExchangeId,
    cancel: CancellationToken,
    sink: mpsc::UnboundedSender<TransportSignal>,
}

/// Owner of the single in-flight exchange
pub struct StreamTransport<B: ChatBackend + 'static> {
    backend: Arc<B>,
    timeout: Duration,
    active: Option<ActiveExchange>,
}

impl<B: ChatBackend + 'static> StreamTransport<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
            active: None,
        }
    }

    /// Override the exchange deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Id of the exchange currently running, if any
    pub fn active_exchange(&self) -> Option<ExchangeId> {
        self.active
            .as_ref()
            .filter(|active| !active.cancel.is_cancelled())
            .map(|active| active.id)
    }

    /// Start a new exchange, silently cancelling the previous one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(
        &mut self,
        exchange: ExchangeId,
        request: ChatRequest,
        sink: mpsc::UnboundedSender<TransportSignal>,
    ) {
        if let Some(previous) = self.active.take() {
            tracing::debug!(exchange = previous.id, "Preempting in-flight exchange");
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        self.active = Some(ActiveExchange {
            id: exchange,
            cancel: cancel.clone(),
            sink: sink.clone(),
        });

        let backend = Arc::clone(&self.backend);
        let now = Instant::now();
        let deadline = now
            .checked_add(self.timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let timeout = self.timeout;

        tokio::spawn(async move {
            tracing::info!(
                exchange,
                app_type = request.app_type,
                resuming = !request.conversation_id.is_empty(),
                "Opening chat stream"
            );
            let start = std::time::Instant::now();

            let outcome = tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::debug!(exchange, "Exchange cancelled");
                    return;
                }

                () = tokio::time::sleep_until(deadline) => {
                    cancel.cancel();
                    Err(TransportError::timeout(timeout))
                }

                result = pump_exchange(backend.as_ref(), &request, exchange, &sink) => result,
            };

            let duration = start.elapsed();
            let signal = match outcome {
                Ok(()) => {
                    tracing::info!(
                        exchange,
                        duration_ms = %duration.as_millis(),
                        "Chat stream completed"
                    );
                    TransportSignal::Completed { exchange }
                }
                Err(error) => {
                    tracing::error!(
                        exchange,
                        duration_ms = %duration.as_millis(),
                        error = %error.message,
                        timeout = error.is_timeout(),
                        "Chat stream failed"
                    );
                    TransportSignal::Failed { exchange, error }
                }
            };
            // Marks the exchange as over so a late unsubscribe stays silent
            cancel.cancel();
            let _ = sink.send(signal);
        });
    }

    /// Cancel the in-flight exchange and report it as completed.
    ///
    /// Safe to call when nothing is running. Returns whether an exchange was
    /// cancelled.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        if active.cancel.is_cancelled() {
            return false;
        }

        tracing::info!(exchange = active.id, "Unsubscribing from chat stream");
        active.cancel.cancel();
        let _ = active.sink.send(TransportSignal::Completed {
            exchange: active.id,
        });
        true
    }
}

impl<B: ChatBackend + 'static> Drop for StreamTransport<B> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

/// Read the body to its end, forwarding each decoded record
async fn pump_exchange<B: ChatBackend + ?Sized>(
    backend: &B,
    request: &ChatRequest,
    exchange: ExchangeId,
    sink: &mpsc::UnboundedSender<TransportSignal>,
) -> Result<(), TransportError> {
    let mut body = backend.open(request).await?;
    let mut decoder = RecordDecoder::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for event in decoder.feed(&chunk) {
            tracing::debug!(exchange, kind = event.kind(), "Decoded record");
            if forward(sink, exchange, event).is_break() {
                return Ok(());
            }
        }
    }

    for event in decoder.finish() {
        if forward(sink, exchange, event).is_break() {
            return Ok(());
        }
    }

    if decoder.discarded() > 0 {
        tracing::warn!(
            exchange,
            discarded = decoder.discarded(),
            "Some records could not be decoded"
        );
    }
    Ok(())
}

/// Send one event; break once the server ended the exchange or nobody listens
fn forward(
    sink: &mpsc::UnboundedSender<TransportSignal>,
    exchange: ExchangeId,
    event: StreamEvent,
) -> ControlFlow<()> {
    let terminal = event.is_terminal();
    if sink.send(TransportSignal::Event { exchange, event }).is_err() {
        return ControlFlow::Break(());
    }
    if terminal {
        tracing::debug!(exchange, "Server ended the exchange");
        return ControlFlow::Break(());
    }
    ControlFlow::Continue(())
}
