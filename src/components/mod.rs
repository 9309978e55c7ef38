//! Live data components
//!
//! A component is a named unit of periodically recomputed display text.
//! Rows reference components by name; the scheduler ticks them and gates
//! their output on a dirty flag so unchanged values are never redrawn.
//!
//! # Scheduling modes
//!
//! - [`Scheduling::TickDriven`] components are ticked by the
//!   [`ComponentScheduler`] worker with a shared tick count, so they can
//!   throttle themselves ("update every 20th tick").
//! - [`Scheduling::Custom`] components run their own worker (started in
//!   [`Component::setup`], stopped in [`Component::dispose`]) and are never
//!   ticked.
//!
//! Either way the contract seen by the layout engine is the same:
//! `has_updates` then `render`.

mod builtin;
mod scheduler;

pub use builtin::{
    ClockComponent, FnComponent, ScrollbackComponent, SearchStatusComponent, UptimeComponent,
    VersionComponent,
};
pub use scheduler::{ComponentFactory, ComponentScheduler};

use crate::view::ViewState;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How a component gets its updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    /// Ticked by the shared scheduler
    TickDriven,
    /// Owns its own update worker
    Custom,
}

/// What the engine hands a component when it is registered
#[derive(Debug, Clone)]
pub struct HostHandle {
    /// Scroll, search and help state shared with the input loop
    pub view: Arc<ViewState>,
    /// Period of the scheduler's tick loop
    pub tick_interval: Duration,
}

/// Contract every live component satisfies
///
/// # Example
///
/// ```ignore
/// struct Counter {
///     value: LiveValue,
/// }
///
/// impl Component for Counter {
///     fn tick(&mut self, count: u64) {
///         self.value.set(count.to_string());
///     }
///     fn render(&mut self, _param: Option<&str>) -> String {
///         self.value.get()
///     }
///     fn has_updates(&self) -> bool {
///         self.value.is_dirty()
///     }
///     fn mark_rendered(&mut self) {
///         self.value.mark_clean();
///     }
/// }
/// ```
pub trait Component: Send {
    /// Called once at registration, before any tick
    fn setup(&mut self, _name: &str, _host: &HostHandle) {}

    /// Advance with the scheduler's shared tick count
    fn tick(&mut self, _count: u64) {}

    /// Current display text. `param` comes from the row item referencing
    /// the component.
    fn render(&mut self, param: Option<&str>) -> String;

    /// True while there is a value that has not been rendered yet
    fn has_updates(&self) -> bool;

    /// Clear the dirty flag after a render
    fn mark_rendered(&mut self);

    fn scheduling(&self) -> Scheduling {
        Scheduling::TickDriven
    }

    /// Release resources (stop own workers) at shutdown
    fn dispose(&mut self) {}
}

#[derive(Debug, Default)]
struct LiveState {
    value: String,
    dirty: bool,
}

/// Last rendered value plus its dirty flag.
///
/// Clones share the same value, so a component's own worker can update it
/// while the scheduler renders it.
#[derive(Debug, Clone, Default)]
pub struct LiveValue {
    inner: Arc<Mutex<LiveState>>,
}

impl LiveValue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LiveState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a value; a value that differs from the last one marks the
    /// component dirty. Returns whether it changed.
    pub fn set(&self, value: impl Into<String>) -> bool {
        let value = value.into();
        let mut state = self.state();
        if state.value == value {
            return false;
        }
        state.value = value;
        state.dirty = true;
        true
    }

    pub fn get(&self) -> String {
        self.state().value.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.state().dirty
    }

    pub fn mark_clean(&self) {
        self.state().dirty = false;
    }

    /// Force a redraw of an unchanged value
    pub fn mark_dirty(&self) {
        self.state().dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_value_dirty_on_change_only() {
        let live = LiveValue::new();
        assert!(!live.is_dirty());

        assert!(live.set("42"));
        assert!(live.is_dirty());
        live.mark_clean();

        assert!(!live.set("42"));
        assert!(!live.is_dirty());

        assert!(live.set("43"));
        assert!(live.is_dirty());
        assert_eq!(live.get(), "43");
    }

    #[test]
    fn test_live_value_clones_share_state() {
        let live = LiveValue::new();
        let writer = live.clone();
        writer.set("from worker");
        assert!(live.is_dirty());
        assert_eq!(live.get(), "from worker");
    }
}
