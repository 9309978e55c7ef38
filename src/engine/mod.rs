//! Dashboard façade
//!
//! Owns the shared screen state and the three workers (render, ticks,
//! input) and exposes the host-facing API. Everything a host calls is
//! `&self`, so a dashboard can sit behind an `Arc` and be fed from any
//! number of producer threads.
//!
//! Lock order: the screen lock may be taken while holding nothing else or
//! while holding the lifecycle lock. Producers only touch the output inbox.

mod signal;

pub use signal::{join_bounded, FrameSignal, Shutdown};

use crate::components::{
    ClockComponent, Component, ComponentFactory, ComponentScheduler, HostHandle,
    ScrollbackComponent, SearchStatusComponent, UptimeComponent, VersionComponent,
};
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::history::{HistoryStore, LineFormat, LogEntry, OutputInbox};
use crate::input::{
    CrosstermInput, InputDispatcher, InputEvent, InputLoop, InputSource, InputTarget, KeyBindings,
    Subscribers,
};
use crate::layout::{RowContentItem, RowLayout, RowSpec};
use crate::render::{
    help_block, lock_screen, DirectOutputEntry, OutputMode, RenderLoop, RenderSettings,
    RenderShared, Renderer, Screen, SharedScreen,
};
use crate::surface::{CrosstermSurface, Surface};
use crate::text::TextBlock;
use crate::theme::Theme;
use crate::view::ViewState;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Names the built-in components are registered under
pub mod names {
    pub const CLOCK: &str = "clock";
    pub const VERSION: &str = "version";
    pub const UPTIME: &str = "uptime";
    pub const SCROLLBACK: &str = "scrollback";
    pub const SEARCH: &str = "search";
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared state
// ─────────────────────────────────────────────────────────────────────────────

/// Fails when the surface cannot host a dashboard
fn check_environment(surface: &dyn Surface) -> EngineResult<()> {
    if surface.is_output_redirected() {
        return Err(EngineError::EnvironmentUnavailable(
            "output is not a terminal".to_string(),
        ));
    }
    Ok(())
}

/// State reachable from the input worker
struct Shared {
    screen: SharedScreen,
    inbox: Arc<OutputInbox>,
    view: Arc<ViewState>,
    /// Fired by the quit key or by `close`
    close_requested: Shutdown,
    /// No terminal: writes pass through to `passthrough`
    inert: AtomicBool,
    passthrough: Mutex<Box<dyn Write + Send>>,
}

impl Shared {
    fn stage(&self, text: &str) -> io::Result<()> {
        if self.inert.load(Ordering::Acquire) {
            let mut out = lock(&self.passthrough);
            out.write_all(text.as_bytes())?;
            return out.flush();
        }
        self.inbox.push(text);
        Ok(())
    }

    /// Stage host output; a failed passthrough write is logged, not returned
    fn stage_logged(&self, text: &str) {
        if let Err(e) = self.stage(text) {
            warn!("Failed to write output: {}", e);
        }
    }
}

impl InputTarget for Shared {
    fn search(&self, needle: &str) {
        lock_screen(&self.screen).history.search(needle);
    }

    fn find_next(&self) {
        let height = self.view.view_height();
        lock_screen(&self.screen).history.find_next(height);
    }

    fn find_previous(&self) {
        let height = self.view.view_height();
        lock_screen(&self.screen).history.find_previous(height);
    }

    fn request_redraw(&self) {
        lock_screen(&self.screen).full_redraw = true;
    }

    fn shutdown(&self) {
        debug!("Close requested from input");
        self.close_requested.trigger();
    }
}

enum Lifecycle {
    /// Built, workers not started yet
    Ready {
        renderer: Renderer,
        input: Box<dyn InputSource>,
    },
    Running {
        render: RenderLoop,
        input: InputLoop,
    },
    /// No usable terminal: output passes straight through to stdout
    Inert,
    Closed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Declares rows, components and help text before anything is drawn
pub struct DashboardBuilder {
    config: Config,
    surface: Option<Box<dyn Surface>>,
    input: Option<Box<dyn InputSource>>,
    rows: Vec<RowSpec>,
    items: Vec<(String, RowContentItem)>,
    components: Vec<(String, ComponentFactory)>,
    help: TextBlock,
    builtin_components: bool,
}

impl DashboardBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            surface: None,
            input: None,
            rows: Vec::new(),
            items: Vec::new(),
            components: Vec::new(),
            help: TextBlock::new(),
            builtin_components: true,
        }
    }

    /// Draw somewhere other than the real terminal
    pub fn surface(mut self, surface: impl Surface + 'static) -> Self {
        self.surface = Some(Box::new(surface));
        self
    }

    /// Read events from somewhere other than the real terminal
    pub fn input(mut self, input: impl InputSource + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    pub fn row(mut self, spec: RowSpec) -> Self {
        self.rows.push(spec);
        self
    }

    /// Add an item to a row declared with [`row`](Self::row)
    pub fn item(mut self, row: &str, item: RowContentItem) -> Self {
        self.items.push((row.to_string(), item));
        self
    }

    pub fn component<C, F>(mut self, name: &str, factory: F) -> Self
    where
        C: Component + 'static,
        F: FnOnce() -> C + Send + 'static,
    {
        let boxed: ComponentFactory = Box::new(move || Box::new(factory()) as Box<dyn Component>);
        self.components.push((name.to_string(), boxed));
        self
    }

    /// Extra text shown below the key list on the help screen
    pub fn help_screen(mut self, text: TextBlock) -> Self {
        self.help = text;
        self
    }

    /// Skip registering clock, version, uptime, scrollback and search
    pub fn without_builtin_components(mut self) -> Self {
        self.builtin_components = false;
        self
    }

    /// Validate the declarations and assemble the dashboard.
    ///
    /// Duplicate or unknown names fail here, before any worker exists.
    pub fn build(self) -> EngineResult<Dashboard> {
        let config = self.config;
        let view = Arc::new(ViewState::new());
        let host = HostHandle {
            view: view.clone(),
            tick_interval: config.tick_interval(),
        };
        let scheduler = Arc::new(ComponentScheduler::new(host, config.join_timeout()));

        if self.builtin_components {
            scheduler.register(names::CLOCK, ClockComponent::default)?;
            scheduler.register(names::VERSION, VersionComponent::default)?;
            scheduler.register(names::UPTIME, UptimeComponent::default)?;
            scheduler.register(names::SCROLLBACK, ScrollbackComponent::new)?;
            scheduler.register(names::SEARCH, SearchStatusComponent::new)?;
        }
        for (name, factory) in self.components {
            scheduler.register_boxed(&name, factory)?;
        }

        let mut rows = RowLayout::new();
        for spec in self.rows {
            rows.add_row(spec)?;
        }
        for (row, item) in self.items {
            rows.add_item(&row, item, &scheduler)?;
        }

        let surface = self
            .surface
            .unwrap_or_else(|| Box::new(CrosstermSurface::new()));
        let input = self
            .input
            .unwrap_or_else(|| Box::new(CrosstermInput::new()));
        let unavailable = check_environment(surface.as_ref()).err();

        let inset = usize::from(config.window_frame);
        let format = LineFormat {
            width: (surface.size().0 as usize).saturating_sub(2 * inset),
            show_class_prefix: config.show_class_prefix,
            raw_marker: config.raw_marker.clone(),
        };
        let history = HistoryStore::new(config.max_history_lines, format, view.clone());

        let theme = Theme::from_config(&config);
        let help = help_block(config.quit_key, &self.help, theme.highlight);
        let screen = Arc::new(Mutex::new(Screen::new(history, rows, help)));

        let settings = RenderSettings {
            fade_lines: config.fade_lines,
            fade_step: config.fade_step,
            item_spacing: config.item_spacing,
            window_frame: config.window_frame,
            frame_title: config.frame_title.clone(),
        };

        let inert = unavailable.is_some();
        let lifecycle = if let Some(reason) = unavailable {
            info!("{}; dashboard disabled", reason);
            Lifecycle::Inert
        } else {
            Lifecycle::Ready {
                renderer: Renderer::new(surface, theme, settings),
                input,
            }
        };

        Ok(Dashboard {
            config,
            shared: Arc::new(Shared {
                screen,
                inbox: Arc::new(OutputInbox::new()),
                view,
                close_requested: Shutdown::new(),
                inert: AtomicBool::new(inert),
                passthrough: Mutex::new(Box::new(io::stdout())),
            }),
            scheduler,
            subscribers: Arc::new(Subscribers::new()),
            frames: Arc::new(FrameSignal::new()),
            workers_stop: Arc::new(Shutdown::new()),
            lifecycle: Mutex::new(lifecycle),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dashboard
// ─────────────────────────────────────────────────────────────────────────────

/// A live terminal dashboard: pinned rows around a scrollback region
pub struct Dashboard {
    config: Config,
    shared: Arc<Shared>,
    scheduler: Arc<ComponentScheduler>,
    subscribers: Arc<Subscribers>,
    frames: Arc<FrameSignal>,
    /// Stops the render and input workers
    workers_stop: Arc<Shutdown>,
    lifecycle: Mutex<Lifecycle>,
}

impl Dashboard {
    pub fn builder(config: Config) -> DashboardBuilder {
        DashboardBuilder::new(config)
    }

    /// Take over the terminal and start the workers.
    ///
    /// A terminal that cannot be entered is not an error: the dashboard
    /// goes inert and output passes through to stdout.
    pub fn start(&self) -> EngineResult<()> {
        let mut lifecycle = lock(&self.lifecycle);
        let (mut renderer, source) = match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
            Lifecycle::Ready { renderer, input } => (renderer, input),
            other => {
                *lifecycle = other;
                return Ok(());
            }
        };

        if let Err(e) = renderer.enter() {
            let reason = EngineError::EnvironmentUnavailable(e.to_string());
            warn!("{}, running without dashboard", reason);
            self.shared.inert.store(true, Ordering::Release);
            *lifecycle = Lifecycle::Inert;
            return Ok(());
        }

        let render = RenderLoop::spawn(
            renderer,
            RenderShared {
                screen: self.shared.screen.clone(),
                inbox: self.shared.inbox.clone(),
                scheduler: self.scheduler.clone(),
                view: self.shared.view.clone(),
                frames: self.frames.clone(),
                shutdown: self.workers_stop.clone(),
            },
            self.config.redraw_interval(),
            self.config.join_timeout(),
        )?;

        self.scheduler.start(self.config.tick_interval())?;

        let dispatcher = InputDispatcher::new(
            KeyBindings::new(self.config.builtin_keys, self.config.quit_key),
            self.shared.view.clone(),
            self.shared.clone(),
            self.subscribers.clone(),
        );
        let input = InputLoop::spawn(
            source,
            dispatcher,
            self.config.input_poll_interval(),
            self.workers_stop.clone(),
            self.config.join_timeout(),
        )?;

        info!(
            redraw_ms = self.config.redraw_interval_ms,
            tick_ms = self.config.tick_interval_ms,
            "Dashboard started"
        );
        *lifecycle = Lifecycle::Running { render, input };
        Ok(())
    }

    /// True when there is no terminal to draw on
    pub fn is_inert(&self) -> bool {
        self.shared.inert.load(Ordering::Acquire)
    }

    fn is_running(&self) -> bool {
        matches!(*lock(&self.lifecycle), Lifecycle::Running { .. })
    }

    // ── Output ──────────────────────────────────────────────────────────────

    /// Append one line to the scrollback
    pub fn write_line(&self, text: &str) {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        self.shared.stage_logged(&line);
    }

    /// Append raw text; it becomes visible once a newline completes the line
    pub fn write_raw(&self, text: &str) {
        self.shared.stage_logged(text);
    }

    /// `io::Write` adapter over [`write_raw`](Self::write_raw)
    pub fn writer(&self) -> DashboardWriter {
        DashboardWriter {
            shared: self.shared.clone(),
        }
    }

    /// Pin text at an absolute cell
    pub fn write_at(&self, x: u16, y: u16, text: &str, mode: OutputMode) {
        lock_screen(&self.shared.screen).write_at(DirectOutputEntry::new(x, y, text, mode));
    }

    /// Replace a row's contents with a single text item
    pub fn write_row(&self, row: &str, text: &str) -> EngineResult<()> {
        lock_screen(&self.shared.screen)
            .rows
            .replace_items(row, vec![RowContentItem::text(text)])
    }

    /// Add an item to an existing row
    pub fn add_row_content(&self, row: &str, item: RowContentItem) -> EngineResult<()> {
        lock_screen(&self.shared.screen)
            .rows
            .add_item(row, item, &self.scheduler)
    }

    /// Register a component after build
    pub fn register_component<C, F>(&self, name: &str, factory: F) -> EngineResult<()>
    where
        C: Component + 'static,
        F: FnOnce() -> C,
    {
        self.scheduler.register(name, factory)
    }

    /// Empty the scrollback and direct output
    pub fn clear(&self) {
        let mut screen = lock_screen(&self.shared.screen);
        self.shared.inbox.take();
        screen.clear();
    }

    /// Erase direct output on lines `from_y..=to_y`
    pub fn clear_range(&self, from_y: u16, to_y: u16) {
        lock_screen(&self.shared.screen).clear_range(from_y, to_y);
    }

    /// Block until everything written so far has been drawn.
    ///
    /// Returns false if no frame completed within the flush timeout. Before
    /// `start` (or when inert) staged lines are formatted synchronously.
    pub fn flush(&self) -> bool {
        if self.is_running() {
            let ticket = self.frames.request();
            return self.frames.wait_drawn(ticket, self.config.flush_timeout());
        }
        if self.is_inert() {
            return lock(&self.shared.passthrough).flush().is_ok();
        }
        let mut screen = lock_screen(&self.shared.screen);
        self.shared.inbox.drain_into(&mut screen.history);
        screen.history.flush();
        true
    }

    // ── Navigation ──────────────────────────────────────────────────────────

    /// Matching lines for `needle` by buffer index; empty clears the search
    pub fn search(&self, needle: &str) -> BTreeMap<usize, LogEntry> {
        lock_screen(&self.shared.screen).history.search(needle)
    }

    /// Scroll to the next match (wrapping). Returns its buffer index.
    pub fn find_next(&self) -> Option<usize> {
        let height = self.shared.view.view_height();
        lock_screen(&self.shared.screen).history.find_next(height)
    }

    pub fn find_previous(&self) -> Option<usize> {
        let height = self.shared.view.view_height();
        lock_screen(&self.shared.screen).history.find_previous(height)
    }

    /// Lines back from the live tail; 0 follows new output
    pub fn scroll_to(&self, cursor: usize) {
        self.shared.view.set_scroll(cursor);
    }

    pub fn set_help(&self, enabled: bool) {
        self.shared.view.set_help(enabled);
    }

    pub fn view(&self) -> &ViewState {
        &self.shared.view
    }

    pub fn scheduler(&self) -> &ComponentScheduler {
        &self.scheduler
    }

    /// Snapshot of the formatted scrollback, oldest first
    pub fn history_lines(&self) -> Vec<String> {
        let screen = lock_screen(&self.shared.screen);
        (0..screen.history.len())
            .filter_map(|i| screen.history.get(i))
            .map(|entry| entry.formatted_line.clone())
            .collect()
    }

    /// Receive every input event after the built-in bindings ran
    pub fn subscribe(&self, subscriber: impl Fn(&InputEvent) + Send + Sync + 'static) {
        self.subscribers.add(Arc::new(subscriber));
    }

    // ── Shutdown ────────────────────────────────────────────────────────────

    /// Block until the quit key is pressed (or `close` is called elsewhere),
    /// then close.
    pub fn wait_for_close(&self) {
        self.shared.close_requested.wait();
        self.close();
    }

    /// Draw the shutdown message, stop every worker and restore the
    /// terminal. Safe to call more than once.
    pub fn close(&self) {
        let mut lifecycle = lock(&self.lifecycle);
        match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
            Lifecycle::Running {
                mut render,
                mut input,
            } => {
                {
                    let mut screen = lock_screen(&self.shared.screen);
                    if !self.config.shutdown_message.is_empty() {
                        screen.farewell = Some(self.config.shutdown_message.clone());
                    }
                }
                let ticket = self.frames.request();
                self.workers_stop.trigger();
                if !self.frames.wait_drawn(ticket, self.config.flush_timeout()) {
                    warn!("Final frame not drawn before timeout");
                }
                input.join();
                render.join();
                self.scheduler.dispose();
                info!("Dashboard closed");
            }
            Lifecycle::Ready { .. } | Lifecycle::Inert => {
                self.scheduler.dispose();
                debug!("Dashboard closed before it was drawn");
            }
            Lifecycle::Closed => {}
        }
        self.shared.close_requested.trigger();
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.close();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Writer
// ─────────────────────────────────────────────────────────────────────────────

/// Feeds bytes into the scrollback; invalid UTF-8 is replaced
#[derive(Clone)]
pub struct DashboardWriter {
    shared: Arc<Shared>,
}

impl Write for DashboardWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.shared.stage(&String::from_utf8_lossy(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
