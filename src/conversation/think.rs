//! Think-marker automaton
//!
//! Models reasoning output wrapped in `<think>...</think>` as three stages
//! over the cumulative answer text:
//!
//! | stage      | sees `<think>` | sees `</think>` |
//! |------------|----------------|-----------------|
//! | `NoMarker` | `Opened`       | `Closed`        |
//! | `Opened`   | `Opened`       | `Closed`        |
//! | `Closed`   | `Closed`       | `Closed`        |
//!
//! A closing marker always wins, including when both markers show up in the
//! same fragment. Markers split across fragments are still found because the
//! scan resumes a marker-length short of the previously scanned end.

use super::state::ThinkingPhase;

pub const OPEN_MARKER: &str = "<think>";
pub const CLOSE_MARKER: &str = "</think>";

/// Progress through the think block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThinkStage {
    #[default]
    NoMarker,
    Opened,
    Closed,
}

impl ThinkStage {
    /// One step of the transition table
    pub fn step(self, saw_open: bool, saw_close: bool) -> Self {
        match (self, saw_open, saw_close) {
            (_, _, true) | (ThinkStage::Closed, _, _) => ThinkStage::Closed,
            (_, true, false) | (ThinkStage::Opened, false, false) => ThinkStage::Opened,
            (ThinkStage::NoMarker, false, false) => ThinkStage::NoMarker,
        }
    }

    /// Phase shown once answer content has arrived
    pub fn phase(self) -> ThinkingPhase {
        match self {
            ThinkStage::Opened => ThinkingPhase::Thinking,
            ThinkStage::NoMarker | ThinkStage::Closed => ThinkingPhase::Answering,
        }
    }
}

/// Incremental scanner over an append-only answer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThinkTracker {
    stage: ThinkStage,
    /// Byte length of the answer at the previous scan
    scanned: usize,
}

impl ThinkTracker {
    pub fn stage(&self) -> ThinkStage {
        self.stage
    }

    /// Scan the text appended since the last call and return the new phase.
    ///
    /// `answer` must extend the text passed previously.
    pub fn observe(&mut self, answer: &str) -> ThinkingPhase {
        let overlap = CLOSE_MARKER.len() - 1;
        let mut from = self.scanned.saturating_sub(overlap).min(answer.len());
        while !answer.is_char_boundary(from) {
            from -= 1;
        }
        let window = answer.get(from..).unwrap_or(answer);

        self.stage = self
            .stage
            .step(window.contains(OPEN_MARKER), window.contains(CLOSE_MARKER));
        self.scanned = answer.len();
        self.stage.phase()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
