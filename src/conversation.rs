//! Conversation state machine
//!
//! Folds user actions and stream events into the visible conversation state
//! with pure transitions; effects are executed by the controller.

mod effect;
pub mod event;
pub mod state;
pub mod think;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConvContext, ConversationState, SessionIds, ThinkingPhase, Transcript, Turn};
pub use think::{ThinkStage, ThinkTracker};
pub use transition::{error_annotation, transition, TransitionError, TransitionResult};
