//! wiki-chat - streaming knowledge-base chat client
//!
//! Opens a streaming chat exchange against a knowledge-base server, decodes
//! the `data:`-framed event stream and folds it into a conversation
//! transcript with a visible thinking phase.

// Error and panic conditions are described on the types they return
#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

pub mod config;
pub mod controller;
pub mod conversation;
pub mod scroll;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use controller::{ConversationController, Notice};
pub use conversation::{ConversationState, ThinkingPhase, TransitionError};
pub use transport::{ChatBackend, HttpBackend, StreamEvent, Surface, TransportError};
