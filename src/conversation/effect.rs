//! Effects produced by state transitions

use crate::transport::{ChatRequest, ExchangeId};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start streaming the answer to a question
    OpenStream {
        exchange: ExchangeId,
        request: ChatRequest,
    },

    /// Cancel the exchange in flight
    AbortStream,

    /// Show a transient notification next to the transcript
    Notify { message: String },
}

impl Effect {
    pub fn notify(message: impl Into<String>) -> Self {
        Effect::Notify {
            message: message.into(),
        }
    }
}
