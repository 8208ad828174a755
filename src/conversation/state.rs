//! Conversation state types

use super::think::ThinkTracker;
use crate::transport::{ExchangeId, ResultBatch, Surface};
use serde::{Deserialize, Serialize};

// ============================================================================
// Thinking Phase
// ============================================================================

/// Visible stage of the exchange in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingPhase {
    /// Question sent, waiting for the first answer fragment
    Searching,
    /// Answer text is inside an open `<think>` block
    Thinking,
    Answering,
    #[default]
    Idle,
    /// Server is waiting for the user to approve a tool run
    AwaitingToolConfirmation,
}

impl ThinkingPhase {
    /// Status line shown next to the open turn
    pub fn label(self) -> &'static str {
        match self {
            ThinkingPhase::Searching => "Searching for results",
            ThinkingPhase::Thinking => "Thinking",
            ThinkingPhase::Answering => "Answering",
            ThinkingPhase::Idle => "",
            ThinkingPhase::AwaitingToolConfirmation => "Waiting for tool confirmation",
        }
    }
}

// ============================================================================
// Transcript
// ============================================================================

/// One question and its answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

impl Turn {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: String::new(),
        }
    }
}

/// Chronological list of turns; only the last one may still be open
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transcript {
    closed: Vec<Turn>,
    open: Option<Turn>,
}

impl Transcript {
    /// All turns in order, the open one last
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.closed.iter().chain(self.open.as_ref())
    }

    pub fn len(&self) -> usize {
        self.closed.len() + usize::from(self.open.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn open_turn(&self) -> Option<&Turn> {
        self.open.as_ref()
    }

    /// Answer accumulated so far for the open turn
    pub fn open_answer(&self) -> &str {
        self.open.as_ref().map_or("", |turn| turn.answer.as_str())
    }

    pub fn last(&self) -> Option<&Turn> {
        self.open.as_ref().or_else(|| self.closed.last())
    }

    /// Move the open turn, with whatever answer it has, into history
    pub fn close_open_turn(&mut self) {
        if let Some(turn) = self.open.take() {
            self.closed.push(turn);
        }
    }

    /// Close the current turn and open a new one for `question`
    pub fn open_new_turn(&mut self, question: impl Into<String>) {
        self.close_open_turn();
        self.open = Some(Turn::new(question));
    }

    /// Append to the open turn's answer; no-op when nothing is open
    pub fn append_answer(&mut self, fragment: &str) {
        if let Some(turn) = self.open.as_mut() {
            turn.answer.push_str(fragment);
        }
    }

    pub fn clear(&mut self) {
        self.closed.clear();
        self.open = None;
    }
}

// ============================================================================
// Session Identifiers
// ============================================================================

/// Identifiers the backend hands out and expects back on the next question
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionIds {
    pub conversation_id: String,
    pub nonce: String,
}

impl SessionIds {
    pub fn is_established(&self) -> bool {
        !self.conversation_id.is_empty()
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Everything the presentation layer renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConversationState {
    pub transcript: Transcript,
    pub phase: ThinkingPhase,
    pub session: SessionIds,
    /// One batch per `chunk_result` event of the current exchange
    pub retrieval_results: Vec<ResultBatch>,
    /// Retrieval results may still arrive; cleared by the first answer
    /// fragment or the end of the exchange
    pub retrieval_loading: bool,
    /// Exchange whose events are currently applied
    pub in_flight: Option<ExchangeId>,
    /// Number of exchanges started by this session
    pub exchanges_started: u64,
    /// Think-marker progress of the open answer
    #[serde(skip)]
    pub think: ThinkTracker,
}

impl ConversationState {
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether `exchange` is the one whose events should be applied
    pub fn is_current(&self, exchange: ExchangeId) -> bool {
        self.in_flight == Some(exchange)
    }
}

/// Context for a conversation (immutable configuration)
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub kb_id: String,
    pub surface: Surface,
}

impl ConvContext {
    pub fn new(kb_id: impl Into<String>, surface: Surface) -> Self {
        Self {
            kb_id: kb_id.into(),
            surface,
        }
    }
}
