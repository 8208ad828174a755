//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same new
//! state and effects. All I/O happens in the controller that executes the
//! effects.

use super::{ConvContext, ConversationState, Effect, Event, ThinkingPhase};
use crate::transport::{ChatRequest, ExchangeId, StreamEvent};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Events the state machine refuses to apply
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A question is already being answered (cancel it first)")]
    Busy,
    #[error("Question is empty")]
    EmptyQuestion,
    #[error("Event belongs to exchange {0}, which is no longer in flight")]
    StaleExchange(ExchangeId),
}

/// Pure transition function
pub fn transition(
    state: &ConversationState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // User actions
        // ============================================================
        Event::UserQuestion { .. } if state.is_in_flight() => Err(TransitionError::Busy),

        Event::UserQuestion { text, .. } if text.trim().is_empty() => {
            Err(TransitionError::EmptyQuestion)
        }

        Event::UserQuestion {
            text,
            reset_history,
        } => {
            let mut next = state.clone();
            if reset_history {
                next.transcript.clear();
            }
            next.transcript.open_new_turn(text.clone());
            next.think.reset();
            if context.surface.collects_retrieval_results() {
                next.retrieval_results.clear();
                next.retrieval_loading = true;
            }
            next.phase = ThinkingPhase::Searching;
            next.exchanges_started += 1;
            let exchange = next.exchanges_started;
            next.in_flight = Some(exchange);

            let request = ChatRequest {
                message: text,
                nonce: next.session.nonce.clone(),
                conversation_id: next.session.conversation_id.clone(),
                app_type: context.surface.app_type(),
            };

            Ok(TransitionResult::new(next).with_effect(Effect::OpenStream { exchange, request }))
        }

        // Cancel keeps the open turn, identifiers and retrieval results
        Event::UserCancel => {
            let next = finish(state);
            Ok(TransitionResult::new(next).with_effect(Effect::AbortStream))
        }

        Event::NewConversation => {
            let next = ConversationState {
                exchanges_started: state.exchanges_started,
                ..ConversationState::default()
            };
            let abort = state.is_in_flight().then_some(Effect::AbortStream);
            Ok(TransitionResult::new(next).with_effects(abort))
        }

        // ============================================================
        // Stream events, applied only for the exchange in flight
        // ============================================================
        Event::Stream { exchange, .. }
        | Event::StreamEnded { exchange }
        | Event::StreamFailed { exchange, .. }
            if !state.is_current(exchange) =>
        {
            Err(TransitionError::StaleExchange(exchange))
        }

        Event::Stream { event, .. } => Ok(apply_stream_event(state, context, event)),

        Event::StreamEnded { .. } => Ok(TransitionResult::new(finish(state))),

        Event::StreamFailed { error, .. } => Ok(fail(state, &error.message)),
    }
}

fn apply_stream_event(
    state: &ConversationState,
    context: &ConvContext,
    event: StreamEvent,
) -> TransitionResult {
    match event {
        StreamEvent::ConversationId { content } => {
            let mut next = state.clone();
            next.session.conversation_id.push_str(&content);
            TransitionResult::new(next)
        }
        StreamEvent::Nonce { content } => {
            let mut next = state.clone();
            next.session.nonce.push_str(&content);
            TransitionResult::new(next)
        }
        StreamEvent::Data { content } => {
            let mut next = state.clone();
            next.transcript.append_answer(&content);
            next.retrieval_loading = false;
            next.phase = next.think.observe(next.transcript.open_answer());
            TransitionResult::new(next)
        }
        StreamEvent::ChunkResult { chunk_result } => {
            let mut next = state.clone();
            if context.surface.collects_retrieval_results() {
                next.retrieval_results.push(chunk_result);
            }
            TransitionResult::new(next)
        }
        StreamEvent::Error { content } => fail(state, &content),
        StreamEvent::Done => TransitionResult::new(finish(state)),
        StreamEvent::Unknown => TransitionResult::new(state.clone()),
    }
}

/// Exchange over; nothing else changes
fn finish(state: &ConversationState) -> ConversationState {
    let mut next = state.clone();
    next.in_flight = None;
    next.phase = ThinkingPhase::Idle;
    next.retrieval_loading = false;
    next
}

/// Exchange over with an error shown inline in the open turn
fn fail(state: &ConversationState, message: &str) -> TransitionResult {
    let mut next = finish(state);
    next.transcript.append_answer(&error_annotation(message));

    let notice = (!message.is_empty()).then(|| Effect::notify(message));
    TransitionResult::new(next).with_effects(notice)
}

/// Inline marker appended to an answer that ended in an error
pub fn error_annotation(message: &str) -> String {
    if message.is_empty() {
        "\n\nAn error occurred while answering, please try again".to_string()
    } else {
        format!("\n\nAn error occurred while answering: <error>{message}</error>")
    }
}
