//! Events that can occur in a conversation

use crate::transport::{ExchangeId, StreamEvent, TransportError, TransportSignal};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserQuestion {
        text: String,
        reset_history: bool,
    },
    UserCancel,
    /// Forget the transcript and the server-side session
    NewConversation,

    // Transport events
    Stream {
        exchange: ExchangeId,
        event: StreamEvent,
    },
    StreamEnded {
        exchange: ExchangeId,
    },
    StreamFailed {
        exchange: ExchangeId,
        error: TransportError,
    },
}

impl From<TransportSignal> for Event {
    fn from(signal: TransportSignal) -> Self {
        match signal {
            TransportSignal::Event { exchange, event } => Event::Stream { exchange, event },
            TransportSignal::Completed { exchange } => Event::StreamEnded { exchange },
            TransportSignal::Failed { exchange, error } => Event::StreamFailed { exchange, error },
        }
    }
}
