//! Auto-scroll follow policy for transcript views
//!
//! The view keeps the newest answer text in sight while it streams, unless the
//! user scrolled up to read something. Follow resumes once the user scrolls
//! back to the bottom, and always when a new question is submitted.

/// Near-bottom distance used to resume follow mode.
const FOLLOW_RESUME_THRESHOLD: f32 = 24.0;
/// Small delta used to ignore floating-point scroll jitter.
const SCROLL_DELTA_EPSILON: f32 = 1.0;

/// Geometry of a scrollable transcript, in the view's own units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Distance scrolled from the top
    pub offset: f32,
    /// Visible height
    pub height: f32,
    /// Full height of the rendered transcript
    pub content_height: f32,
}

impl Viewport {
    pub fn new(offset: f32, height: f32, content_height: f32) -> Self {
        Self {
            offset,
            height,
            content_height,
        }
    }

    /// Largest meaningful offset
    pub fn max_offset(&self) -> f32 {
        (self.content_height - self.height).max(0.0)
    }

    /// Gap between the visible bottom edge and the end of the content
    pub fn distance_to_bottom(&self) -> f32 {
        (self.max_offset() - self.offset).max(0.0)
    }

    pub fn is_near_bottom(&self) -> bool {
        self.distance_to_bottom() <= FOLLOW_RESUME_THRESHOLD
    }
}

/// Decides whether the view should stick to the bottom
#[derive(Debug, Clone)]
pub struct ScrollFollow {
    follow_bottom: bool,
    last: Viewport,
}

impl ScrollFollow {
    pub fn new() -> Self {
        Self {
            follow_bottom: true,
            last: Viewport::default(),
        }
    }

    pub fn is_following_bottom(&self) -> bool {
        self.follow_bottom
    }

    /// Re-enable follow; called when a question is submitted
    pub fn reset(&mut self) {
        self.follow_bottom = true;
    }

    /// Record new viewport geometry after a scroll or a content change
    pub fn update(&mut self, viewport: Viewport) {
        let offset_delta = viewport.offset - self.last.offset;
        let max_delta = (viewport.max_offset() - self.last.max_offset()).abs();
        let content_size_changed = max_delta > SCROLL_DELTA_EPSILON;
        let user_scrolled_up = offset_delta < -SCROLL_DELTA_EPSILON && !content_size_changed;
        let moved_down = offset_delta > SCROLL_DELTA_EPSILON;
        let at_bottom = viewport.distance_to_bottom() <= SCROLL_DELTA_EPSILON;

        if self.follow_bottom {
            // Growing content moves the bottom away without any user action
            if user_scrolled_up && !at_bottom {
                self.follow_bottom = false;
            }
        } else if moved_down && viewport.is_near_bottom() {
            self.follow_bottom = true;
        }

        self.last = viewport;
    }

    /// Offset to scroll to after the transcript grew, if following
    pub fn scroll_target(&self, viewport: Viewport) -> Option<f32> {
        self.follow_bottom.then(|| viewport.max_offset())
    }
}

impl Default for ScrollFollow {
    fn default() -> Self {
        Self::new()
    }
}
