//! Property-based tests for the conversation state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::think::{CLOSE_MARKER, OPEN_MARKER};
use super::*;
use crate::transport::{StreamEvent, Surface};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ConvContext {
    ConvContext::new("kb-test", Surface::Full)
}

fn apply(state: &ConversationState, event: Event) -> ConversationState {
    match transition(state, &test_context(), event) {
        Ok(result) => result.new_state,
        Err(_) => state.clone(),
    }
}

fn ask(state: &ConversationState, text: &str, reset_history: bool) -> ConversationState {
    apply(
        state,
        Event::UserQuestion {
            text: text.to_string(),
            reset_history,
        },
    )
}

/// Phase rule evaluated from scratch on the whole answer
fn phase_from_scratch(answer: &str) -> ThinkingPhase {
    if answer.contains(CLOSE_MARKER) {
        ThinkingPhase::Answering
    } else if answer.contains(OPEN_MARKER) {
        ThinkingPhase::Thinking
    } else {
        ThinkingPhase::Answering
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Fragments that often cut through a marker
fn arb_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{0,8}",
        "[\u{4e00}-\u{4e10}]{1,4}",
        Just("<think>".to_string()),
        Just("</think>".to_string()),
        Just("<thi".to_string()),
        Just("nk>".to_string()),
        Just("</th".to_string()),
        Just("<".to_string()),
        Just("/".to_string()),
    ]
}

fn arb_stream_event() -> impl Strategy<Value = StreamEvent> {
    prop_oneof![
        4 => arb_fragment().prop_map(|content| StreamEvent::Data { content }),
        1 => "[a-z0-9]{0,4}".prop_map(|content| StreamEvent::ConversationId { content }),
        1 => "[a-z0-9]{0,4}".prop_map(|content| StreamEvent::Nonce { content }),
        1 => Just(StreamEvent::ChunkResult { chunk_result: vec![] }),
        1 => Just(StreamEvent::Unknown),
    ]
}

#[derive(Debug, Clone)]
enum Action {
    Ask { text: String, reset: bool },
    Cancel,
    Event(StreamEvent),
    /// Event tagged with an exchange that is not in flight
    StaleEvent(StreamEvent),
    Done,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        2 => ("[a-z ]{0,6}", any::<bool>()).prop_map(|(text, reset)| Action::Ask { text, reset }),
        1 => Just(Action::Cancel),
        6 => arb_stream_event().prop_map(Action::Event),
        1 => arb_stream_event().prop_map(Action::StaleEvent),
        1 => Just(Action::Done),
    ]
}

fn run_action(state: &ConversationState, action: Action) -> ConversationState {
    match action {
        Action::Ask { text, reset } => ask(state, &text, reset),
        Action::Cancel => apply(state, Event::UserCancel),
        Action::Event(event) => match state.in_flight {
            Some(exchange) => apply(state, Event::Stream { exchange, event }),
            None => state.clone(),
        },
        Action::StaleEvent(event) => apply(
            state,
            Event::Stream {
                exchange: state.exchanges_started + 100,
                event,
            },
        ),
        Action::Done => match state.in_flight {
            Some(exchange) => apply(
                state,
                Event::Stream {
                    exchange,
                    event: StreamEvent::Done,
                },
            ),
            None => state.clone(),
        },
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_answer_is_concatenation_of_data(fragments in proptest::collection::vec(arb_fragment(), 0..20)) {
        let mut state = ask(&ConversationState::default(), "q", false);
        for fragment in &fragments {
            state = apply(&state, Event::Stream {
                exchange: 1,
                event: StreamEvent::Data { content: fragment.clone() },
            });
        }
        prop_assert_eq!(state.transcript.open_answer(), fragments.concat());
    }

    #[test]
    fn prop_incremental_phase_matches_from_scratch_rule(fragments in proptest::collection::vec(arb_fragment(), 1..20)) {
        let mut state = ask(&ConversationState::default(), "q", false);
        for fragment in fragments {
            state = apply(&state, Event::Stream {
                exchange: 1,
                event: StreamEvent::Data { content: fragment },
            });
            prop_assert_eq!(state.phase, phase_from_scratch(state.transcript.open_answer()));
        }
    }

    #[test]
    fn prop_identifiers_never_reset_without_new_conversation(
        actions in proptest::collection::vec(arb_action(), 0..40)
    ) {
        let mut state = ConversationState::default();
        for action in actions {
            let before = state.session.clone();
            state = run_action(&state, action);
            prop_assert!(state.session.conversation_id.starts_with(&before.conversation_id));
            prop_assert!(state.session.nonce.starts_with(&before.nonce));
        }
    }

    #[test]
    fn prop_in_flight_iff_not_idle(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let mut state = ConversationState::default();
        for action in actions {
            state = run_action(&state, action);
            prop_assert_eq!(state.is_in_flight(), state.phase != ThinkingPhase::Idle);
            prop_assert!(!state.retrieval_loading || state.is_in_flight());
        }
    }

    #[test]
    fn prop_only_last_turn_changes(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let mut state = ConversationState::default();
        for action in actions {
            let resetting = matches!(action, Action::Ask { reset: true, .. });
            let before: Vec<Turn> = state.transcript.turns().cloned().collect();
            state = run_action(&state, action);
            let after: Vec<Turn> = state.transcript.turns().cloned().collect();

            if !resetting {
                // Every turn except the previously open one is untouched
                let stable = before.len().saturating_sub(1);
                prop_assert!(after.len() >= stable);
                prop_assert_eq!(&after[..stable], &before[..stable]);
            }
        }
    }

    #[test]
    fn prop_stale_events_never_apply(
        actions in proptest::collection::vec(arb_action(), 0..20),
        stale in arb_stream_event(),
    ) {
        let mut state = ConversationState::default();
        for action in actions {
            state = run_action(&state, action);
        }
        let exchange = state.exchanges_started + 1;
        let result = transition(&state, &test_context(), Event::Stream { exchange, event: stale });
        prop_assert_eq!(result.unwrap_err(), TransitionError::StaleExchange(exchange));
    }

    #[test]
    fn prop_second_question_while_busy_is_rejected(first in "[a-z]{1,8}", second in "[a-z]{1,8}") {
        let state = ask(&ConversationState::default(), &first, false);
        let result = transition(&state, &test_context(), Event::UserQuestion {
            text: second,
            reset_history: false,
        });
        prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
        prop_assert_eq!(state.transcript.len(), 1);
        prop_assert_eq!(state.exchanges_started, 1);
    }
}
