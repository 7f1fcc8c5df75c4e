//! Auto-scroll decisions for the open conversation.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Viewport geometry reported by the UI when the user scrolls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    /// Distance from the top of the content to the top of the viewport.
    pub offset: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

impl ScrollPosition {
    pub fn distance_from_bottom(&self) -> f64 {
        (self.content_height - self.offset - self.viewport_height).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDecision {
    ScrollToBottom,
    Suppressed,
}

/// Tracks whether the user is reading older messages.
///
/// The reading state clears itself once no manual scroll was seen for the
/// grace period, re-enabling auto-scroll.
#[derive(Debug, Clone)]
pub struct ScrollCoordinator {
    threshold: f64,
    grace: Duration,
    scrolled_away_at: Option<Instant>,
    forced: bool,
}

impl ScrollCoordinator {
    pub fn new(threshold: f64, grace: Duration) -> Self {
        Self {
            threshold,
            grace,
            scrolled_away_at: None,
            forced: false,
        }
    }

    pub fn user_scrolled(&mut self, position: ScrollPosition) {
        if position.distance_from_bottom() > self.threshold {
            self.scrolled_away_at = Some(Instant::now());
        } else {
            self.scrolled_away_at = None;
        }
    }

    pub fn is_user_scrolling(&self) -> bool {
        self.scrolled_away_at
            .is_some_and(|since| since.elapsed() < self.grace)
    }

    /// Decide what an accepted message update does to the viewport.
    pub fn on_messages_changed(&mut self) -> ScrollDecision {
        if std::mem::take(&mut self.forced) || !self.is_user_scrolling() {
            ScrollDecision::ScrollToBottom
        } else {
            ScrollDecision::Suppressed
        }
    }

    /// A committed fetch brought nothing new. A pending forced scroll only
    /// covers the first load, so it lapses here.
    pub fn on_messages_unchanged(&mut self) {
        self.forced = false;
    }

    /// Scroll on the next update regardless of the reading state.
    pub fn force_once(&mut self) {
        self.forced = true;
    }

    /// Scroll right away regardless of the reading state.
    pub fn force_now(&mut self) -> ScrollDecision {
        self.forced = false;
        self.scrolled_away_at = None;
        ScrollDecision::ScrollToBottom
    }

    pub fn reset(&mut self) {
        self.scrolled_away_at = None;
        self.forced = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(offset: f64) -> ScrollPosition {
        ScrollPosition {
            offset,
            viewport_height: 400.0,
            content_height: 1_000.0,
        }
    }

    fn coordinator() -> ScrollCoordinator {
        ScrollCoordinator::new(50.0, Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn test_near_bottom_keeps_auto_scroll() {
        let mut scroll = coordinator();
        scroll.user_scrolled(position(560.0));

        assert!(!scroll.is_user_scrolling());
        assert_eq!(scroll.on_messages_changed(), ScrollDecision::ScrollToBottom);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reading_history_suppresses_until_grace_expires() {
        let mut scroll = coordinator();
        scroll.user_scrolled(position(100.0));

        assert!(scroll.is_user_scrolling());
        assert_eq!(scroll.on_messages_changed(), ScrollDecision::Suppressed);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(scroll.on_messages_changed(), ScrollDecision::Suppressed);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!scroll.is_user_scrolling());
        assert_eq!(scroll.on_messages_changed(), ScrollDecision::ScrollToBottom);
    }

    #[tokio::test(start_paused = true)]
    async fn test_further_scrolling_extends_grace() {
        let mut scroll = coordinator();
        scroll.user_scrolled(position(100.0));
        tokio::time::advance(Duration::from_millis(1_500)).await;
        scroll.user_scrolled(position(120.0));
        tokio::time::advance(Duration::from_millis(1_500)).await;

        assert!(scroll.is_user_scrolling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_returning_to_bottom_clears_immediately() {
        let mut scroll = coordinator();
        scroll.user_scrolled(position(100.0));
        scroll.user_scrolled(position(600.0));

        assert!(!scroll.is_user_scrolling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_scroll_applies_once() {
        let mut scroll = coordinator();
        scroll.user_scrolled(position(0.0));
        scroll.force_once();

        assert_eq!(scroll.on_messages_changed(), ScrollDecision::ScrollToBottom);
        assert_eq!(scroll.on_messages_changed(), ScrollDecision::Suppressed);

        assert_eq!(scroll.force_now(), ScrollDecision::ScrollToBottom);
        assert!(!scroll.is_user_scrolling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_scroll_lapses_after_unchanged_load() {
        let mut scroll = coordinator();
        scroll.force_once();
        scroll.on_messages_unchanged();

        scroll.user_scrolled(position(0.0));
        assert_eq!(scroll.on_messages_changed(), ScrollDecision::Suppressed);
    }

    #[test]
    fn test_distance_from_bottom_never_negative() {
        assert_eq!(position(700.0).distance_from_bottom(), 0.0);
        assert_eq!(position(500.0).distance_from_bottom(), 100.0);
    }
}
