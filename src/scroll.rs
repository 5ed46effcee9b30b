//! Auto-scroll policy for the chat log container.
//!
//! A reader scrolled up into history is not pulled down by background
//! chatter, but always sees their own freshly sent message.

use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;

pub const DEFAULT_SCROLL_THRESHOLD_PX: f64 = 50.0;

/// Whether the user is currently reading away from the bottom of the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollState {
    pub is_user_scrolling: bool,
}

/// Geometry of the log container, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl Viewport {
    /// An empty container of the given visible height.
    pub fn new(client_height: f64) -> Self {
        Self {
            scroll_top: 0.0,
            scroll_height: client_height,
            client_height,
        }
    }

    pub fn max_scroll_top(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }

    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - self.scroll_top - self.client_height).max(0.0)
    }

    pub fn is_at_bottom(&self) -> bool {
        self.distance_from_bottom() == 0.0
    }

    /// Move to `top`, clamped to the scrollable range.
    pub fn scroll_to(&mut self, top: f64) {
        self.scroll_top = top.clamp(0.0, self.max_scroll_top());
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_top = self.max_scroll_top();
    }

    /// Resize the content. The content is never shorter than the container.
    pub fn set_content_height(&mut self, height: f64) {
        self.scroll_height = height.max(self.client_height);
        self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll_top());
    }
}

/// Decides whether an append should move the view to the bottom.
#[derive(Debug, Clone, Copy)]
pub struct ScrollPolicy {
    threshold_px: f64,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_THRESHOLD_PX)
    }
}

impl ScrollPolicy {
    pub fn new(threshold_px: f64) -> Self {
        Self { threshold_px }
    }

    /// Recompute scroll intent from the current position.
    pub fn on_user_scroll(&self, viewport: &Viewport) -> ScrollState {
        ScrollState {
            is_user_scrolling: viewport.distance_from_bottom() > self.threshold_px,
        }
    }

    pub fn should_auto_scroll(&self, message: &ChatMessage, state: ScrollState) -> bool {
        !state.is_user_scrolling || message.is_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageStore, NewMessage};
    use rstest::rstest;

    fn tall_viewport() -> Viewport {
        let mut vp = Viewport::new(400.0);
        vp.set_content_height(2_000.0);
        vp
    }

    #[rstest]
    #[case(1_600.0, false)]
    #[case(1_560.0, false)]
    #[case(1_550.0, false)]
    #[case(1_549.0, true)]
    #[case(0.0, true)]
    fn threshold_is_fifty_pixels(#[case] top: f64, #[case] scrolling: bool) {
        let mut vp = tall_viewport();
        vp.scroll_to(top);
        let state = ScrollPolicy::default().on_user_scroll(&vp);
        assert_eq!(state.is_user_scrolling, scrolling, "top={top}");
    }

    #[test]
    fn scroll_to_clamps_range() {
        let mut vp = tall_viewport();
        vp.scroll_to(-20.0);
        assert_eq!(vp.scroll_top, 0.0);
        vp.scroll_to(9_999.0);
        assert_eq!(vp.scroll_top, 1_600.0);
        assert!(vp.is_at_bottom());
    }

    #[test]
    fn content_never_shorter_than_container() {
        let mut vp = Viewport::new(400.0);
        vp.set_content_height(100.0);
        assert_eq!(vp.scroll_height, 400.0);
        assert_eq!(vp.max_scroll_top(), 0.0);
    }

    #[test]
    fn shrinking_content_clamps_scroll_top() {
        let mut vp = tall_viewport();
        vp.scroll_to_bottom();
        vp.set_content_height(800.0);
        assert_eq!(vp.scroll_top, 400.0);
    }

    #[test]
    fn background_message_respects_reader() {
        let mut store = MessageStore::new();
        let msg = store.append(NewMessage::attendee("Emma", "hi")).clone();
        let policy = ScrollPolicy::default();
        assert!(!policy.should_auto_scroll(&msg, ScrollState { is_user_scrolling: true }));
        assert!(policy.should_auto_scroll(&msg, ScrollState { is_user_scrolling: false }));
    }

    #[test]
    fn own_message_always_scrolls() {
        let mut store = MessageStore::new();
        let msg = store.append(NewMessage::local("hello")).clone();
        let policy = ScrollPolicy::default();
        assert!(policy.should_auto_scroll(&msg, ScrollState { is_user_scrolling: true }));
    }
}
