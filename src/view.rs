// Shared view state
//
// The input loop writes these values on key and mouse events; the render
// loop and the status components read them once per frame. Plain integers
// and flags are atomics; the search fields move together, so they sit behind
// one small lock.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Incremental search state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    /// Search prompt is active (typed keys edit the needle)
    pub enabled: bool,
    /// Current needle as typed
    pub needle: String,
    /// Position in the match list, `None` until the first find
    pub match_index: Option<usize>,
    /// Number of matching history lines for the last search
    pub match_count: usize,
}

/// State shared between the render loop, the input loop and components
#[derive(Debug, Default)]
pub struct ViewState {
    /// Lines scrolled back from the live tail (0 = following)
    scroll: AtomicUsize,
    help: AtomicBool,
    search: Mutex<SearchState>,
    /// Published by the history store after every flush
    history_len: AtomicUsize,
    /// Published by the render loop every frame
    view_height: AtomicUsize,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll(&self) -> usize {
        self.scroll.load(Ordering::Acquire)
    }

    pub fn set_scroll(&self, cursor: usize) {
        self.scroll.store(cursor, Ordering::Release);
    }

    /// Move the scroll cursor; positive goes back in history.
    ///
    /// Only the lower bound is enforced here, the history store clamps the
    /// upper bound when it computes the next window.
    pub fn scroll_by(&self, delta: isize) {
        let _ = self
            .scroll
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                Some(cur.saturating_add_signed(delta))
            });
    }

    /// Pull the cursor down to `max` if it is past it; returns the result.
    ///
    /// Atomic with respect to `scroll_by`, so a scroll landing mid-clamp is
    /// kept.
    pub fn clamp_scroll(&self, max: usize) -> usize {
        match self
            .scroll
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (cur > max).then_some(max)
            }) {
            Ok(_) => max,
            Err(cur) => cur,
        }
    }

    /// True when the view follows new output
    pub fn is_live(&self) -> bool {
        self.scroll() == 0
    }

    pub fn help_enabled(&self) -> bool {
        self.help.load(Ordering::Acquire)
    }

    pub fn set_help(&self, enabled: bool) {
        self.help.store(enabled, Ordering::Release);
    }

    /// Flip the help overlay, returning the new state
    pub fn toggle_help(&self) -> bool {
        !self.help.fetch_xor(true, Ordering::AcqRel)
    }

    /// Snapshot of the search fields
    pub fn search(&self) -> SearchState {
        self.search_guard().clone()
    }

    /// Mutate the search fields under their lock
    pub fn update_search<R>(&self, f: impl FnOnce(&mut SearchState) -> R) -> R {
        f(&mut self.search_guard())
    }

    fn search_guard(&self) -> MutexGuard<'_, SearchState> {
        self.search.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn history_len(&self) -> usize {
        self.history_len.load(Ordering::Acquire)
    }

    pub(crate) fn publish_history_len(&self, len: usize) {
        self.history_len.store(len, Ordering::Release);
    }

    /// Height of the scrollback region as of the last frame
    pub fn view_height(&self) -> usize {
        self.view_height.load(Ordering::Acquire)
    }

    pub(crate) fn publish_view_height(&self, height: usize) {
        self.view_height.store(height, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_by_saturates_at_tail() {
        let view = ViewState::new();
        view.scroll_by(3);
        assert_eq!(view.scroll(), 3);
        view.scroll_by(-10);
        assert_eq!(view.scroll(), 0);
        assert!(view.is_live());
    }

    #[test]
    fn test_clamp_scroll() {
        let view = ViewState::new();
        view.set_scroll(usize::MAX);
        assert_eq!(view.clamp_scroll(12), 12);
        assert_eq!(view.scroll(), 12);
        assert_eq!(view.clamp_scroll(40), 12);
        assert_eq!(view.scroll(), 12);
    }

    #[test]
    fn test_clamp_keeps_concurrent_scrolls() {
        let view = std::sync::Arc::new(ViewState::new());
        let scroller = {
            let view = view.clone();
            std::thread::spawn(move || {
                for _ in 0..10_000 {
                    view.scroll_by(1);
                }
            })
        };
        for _ in 0..10_000 {
            view.clamp_scroll(1_000_000);
        }
        scroller.join().unwrap();
        assert_eq!(view.scroll(), 10_000);
    }

    #[test]
    fn test_toggle_help_reports_new_state() {
        let view = ViewState::new();
        assert!(view.toggle_help());
        assert!(view.help_enabled());
        assert!(!view.toggle_help());
        assert!(!view.help_enabled());
    }

    #[test]
    fn test_update_search() {
        let view = ViewState::new();
        view.update_search(|s| {
            s.enabled = true;
            s.needle.push_str("err");
        });
        let snapshot = view.search();
        assert!(snapshot.enabled);
        assert_eq!(snapshot.needle, "err");
        assert_eq!(snapshot.match_index, None);
    }
}
