// Built-in components
//
// Clock, version, uptime, scrollback position, search status, and a
// closure adapter for quick user components. OS probes (CPU, memory, disk,
// network) are left to the embedding application.

use super::{Component, HostHandle, LiveValue, Scheduling};
use crate::engine::{join_bounded, Shutdown};
use crate::view::ViewState;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

/// Format a timestamp, falling back to the raw pattern if it is not a valid
/// strftime string.
fn format_time(now: DateTime<Local>, pattern: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", now.format(pattern)).is_err() {
        return pattern.to_string();
    }
    out
}

/// Forward the dirty-flag half of the contract to a `LiveValue` field
macro_rules! live_value_updates {
    ($field:ident) => {
        fn has_updates(&self) -> bool {
            self.$field.is_dirty()
        }

        fn mark_rendered(&mut self) {
            self.$field.mark_clean();
        }
    };
}

// ═══════════════════════════════════════════════════════════════════════════
// Clock
// ═══════════════════════════════════════════════════════════════════════════

/// Local wall-clock time, recomputed every `every` ticks.
///
/// A row item parameter replaces the format for that item.
pub struct ClockComponent {
    format: String,
    every: u64,
    value: LiveValue,
}

impl ClockComponent {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            every: 10,
            value: LiveValue::new(),
        }
    }

    /// Recompute every `ticks` ticks instead of every 10th
    pub fn every(mut self, ticks: u64) -> Self {
        self.every = ticks.max(1);
        self
    }
}

impl Default for ClockComponent {
    fn default() -> Self {
        Self::new("%H:%M:%S")
    }
}

impl Component for ClockComponent {
    fn tick(&mut self, count: u64) {
        if count % self.every == 0 {
            self.value.set(format_time(Local::now(), &self.format));
        }
    }

    fn render(&mut self, param: Option<&str>) -> String {
        match param {
            Some(pattern) if !pattern.is_empty() => format_time(Local::now(), pattern),
            _ => self.value.get(),
        }
    }

    live_value_updates!(value);
}

// ═══════════════════════════════════════════════════════════════════════════
// Version
// ═══════════════════════════════════════════════════════════════════════════

/// Static text, dirty exactly once
pub struct VersionComponent {
    value: LiveValue,
}

impl VersionComponent {
    pub fn new(text: impl Into<String>) -> Self {
        let value = LiveValue::new();
        value.set(text);
        Self { value }
    }
}

impl Default for VersionComponent {
    fn default() -> Self {
        Self::new(format!("v{}", crate::config::VERSION))
    }
}

impl Component for VersionComponent {
    fn render(&mut self, _param: Option<&str>) -> String {
        self.value.get()
    }

    live_value_updates!(value);
}

// ═══════════════════════════════════════════════════════════════════════════
// Uptime (custom scheduling)
// ═══════════════════════════════════════════════════════════════════════════

/// Time since registration, updated once a second by its own worker
pub struct UptimeComponent {
    value: LiveValue,
    period: Duration,
    shutdown: Arc<Shutdown>,
    worker: Option<JoinHandle<()>>,
}

impl UptimeComponent {
    pub fn new() -> Self {
        Self::with_period(Duration::from_secs(1))
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            value: LiveValue::new(),
            period,
            shutdown: Arc::new(Shutdown::new()),
            worker: None,
        }
    }
}

impl Default for UptimeComponent {
    fn default() -> Self {
        Self::new()
    }
}

/// `1h 02m 03s`, dropping leading zero units
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

impl Component for UptimeComponent {
    fn setup(&mut self, name: &str, _host: &HostHandle) {
        let value = self.value.clone();
        let shutdown = self.shutdown.clone();
        let period = self.period;
        let started = Instant::now();
        value.set(format_uptime(Duration::ZERO));

        let spawned = std::thread::Builder::new()
            .name(format!("headsup-{name}"))
            .spawn(move || loop {
                if shutdown.wait_timeout(period) {
                    break;
                }
                value.set(format_uptime(started.elapsed()));
            });

        match spawned {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => debug!(component = name, "Uptime worker not started: {}", e),
        }
    }

    fn render(&mut self, _param: Option<&str>) -> String {
        self.value.get()
    }

    live_value_updates!(value);

    fn scheduling(&self) -> Scheduling {
        Scheduling::Custom
    }

    fn dispose(&mut self) {
        self.shutdown.trigger();
        if let Some(handle) = self.worker.take() {
            join_bounded(handle, self.period + Duration::from_millis(500), "uptime");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// View state readers
// ═══════════════════════════════════════════════════════════════════════════

/// Lines held and how far the view is scrolled back
#[derive(Default)]
pub struct ScrollbackComponent {
    view: Option<Arc<ViewState>>,
    value: LiveValue,
}

impl ScrollbackComponent {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for ScrollbackComponent {
    fn setup(&mut self, _name: &str, host: &HostHandle) {
        self.view = Some(host.view.clone());
    }

    fn tick(&mut self, _count: u64) {
        let Some(view) = &self.view else {
            return;
        };
        let lines = view.history_len();
        // Home parks the cursor at usize::MAX until the next frame clamps it
        let max_back = lines.saturating_sub(view.view_height());
        let text = match view.scroll().min(max_back) {
            0 => format!("{lines} lines"),
            back => format!("{lines} lines, {back} back"),
        };
        self.value.set(text);
    }

    fn render(&mut self, _param: Option<&str>) -> String {
        self.value.get()
    }

    live_value_updates!(value);
}

/// Search prompt while typing, then the match position
#[derive(Default)]
pub struct SearchStatusComponent {
    view: Option<Arc<ViewState>>,
    value: LiveValue,
}

impl SearchStatusComponent {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for SearchStatusComponent {
    fn setup(&mut self, _name: &str, host: &HostHandle) {
        self.view = Some(host.view.clone());
    }

    fn tick(&mut self, _count: u64) {
        let Some(view) = &self.view else {
            return;
        };
        let search = view.search();
        let text = if search.enabled {
            format!("/{}_", search.needle)
        } else if search.needle.is_empty() {
            String::new()
        } else if search.match_count == 0 {
            format!("{}: no matches", search.needle)
        } else {
            let position = search
                .match_index
                .map(|i| (i + 1).to_string())
                .unwrap_or_else(|| "-".to_string());
            format!("{}: match {}/{}", search.needle, position, search.match_count)
        };
        self.value.set(text);
    }

    fn render(&mut self, _param: Option<&str>) -> String {
        self.value.get()
    }

    live_value_updates!(value);
}

// ═══════════════════════════════════════════════════════════════════════════
// Closure adapter
// ═══════════════════════════════════════════════════════════════════════════

/// Wraps a closure evaluated on every `every`th tick
pub struct FnComponent<F> {
    every: u64,
    f: F,
    value: LiveValue,
}

impl<F> FnComponent<F>
where
    F: FnMut(u64) -> String + Send,
{
    pub fn new(every: u64, f: F) -> Self {
        Self {
            every: every.max(1),
            f,
            value: LiveValue::new(),
        }
    }
}

impl<F> Component for FnComponent<F>
where
    F: FnMut(u64) -> String + Send,
{
    fn tick(&mut self, count: u64) {
        if count % self.every == 0 {
            self.value.set((self.f)(count));
        }
    }

    fn render(&mut self, _param: Option<&str>) -> String {
        self.value.get()
    }

    live_value_updates!(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostHandle {
        HostHandle {
            view: Arc::new(ViewState::new()),
            tick_interval: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_clock_updates_every_tenth_tick() {
        let mut clock = ClockComponent::default();
        clock.tick(3);
        assert!(!clock.has_updates());

        clock.tick(0);
        assert!(clock.has_updates());
        let text = clock.render(None);
        assert_eq!(text.len(), 8, "HH:MM:SS, got {:?}", text);
    }

    #[test]
    fn test_clock_param_overrides_format() {
        let mut clock = ClockComponent::new("%H:%M");
        let year = clock.render(Some("%Y"));
        assert_eq!(year.len(), 4);
        assert!(year.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_version_dirty_once() {
        let mut version = VersionComponent::new("v9");
        assert!(version.has_updates());
        assert_eq!(version.render(None), "v9");
        version.mark_rendered();
        version.tick(0);
        assert!(!version.has_updates());
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(5)), "5s");
        assert_eq!(format_uptime(Duration::from_secs(65)), "1m 05s");
        assert_eq!(format_uptime(Duration::from_secs(3723)), "1h 02m 03s");
    }

    #[test]
    fn test_uptime_runs_own_worker() {
        let mut uptime = UptimeComponent::with_period(Duration::from_millis(5));
        assert_eq!(uptime.scheduling(), Scheduling::Custom);
        uptime.setup("uptime", &host());
        assert!(uptime.has_updates());
        assert_eq!(uptime.render(None), "0s");
        uptime.dispose();
        assert!(uptime.worker.is_none());
    }

    #[test]
    fn test_scrollback_reports_position() {
        let host = host();
        let mut scrollback = ScrollbackComponent::new();
        scrollback.setup("scroll", &host);

        host.view.publish_history_len(120);
        scrollback.tick(0);
        assert_eq!(scrollback.render(None), "120 lines");
        scrollback.mark_rendered();

        host.view.set_scroll(7);
        scrollback.tick(1);
        assert!(scrollback.has_updates());
        assert_eq!(scrollback.render(None), "120 lines, 7 back");
    }

    #[test]
    fn test_scrollback_clamps_unsettled_cursor() {
        let host = host();
        let mut scrollback = ScrollbackComponent::new();
        scrollback.setup("scroll", &host);

        host.view.publish_history_len(120);
        host.view.publish_view_height(20);
        host.view.set_scroll(usize::MAX);
        scrollback.tick(0);
        assert_eq!(scrollback.render(None), "120 lines, 100 back");
    }

    #[test]
    fn test_search_status_text() {
        let host = host();
        let mut status = SearchStatusComponent::new();
        status.setup("search", &host);

        host.view.update_search(|s| {
            s.enabled = true;
            s.needle = "err".to_string();
        });
        status.tick(0);
        assert_eq!(status.render(None), "/err_");

        host.view.update_search(|s| {
            s.enabled = false;
            s.match_count = 3;
            s.match_index = Some(1);
        });
        status.tick(1);
        assert_eq!(status.render(None), "err: match 2/3");
    }

    #[test]
    fn test_fn_component_throttles() {
        let mut component = FnComponent::new(5, |count| format!("n={count}"));
        component.tick(3);
        assert!(!component.has_updates());
        component.tick(5);
        assert_eq!(component.render(None), "n=5");
    }
}
