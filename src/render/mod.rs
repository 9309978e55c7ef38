//! Render loop
//!
//! One worker redraws the screen on a fixed period. Each frame:
//!
//! 1. reset the color budget
//! 2. under the history lock: move the producers' inbox into the history,
//!    flush staged output, take the visible window,
//!    redraw dirty rows, the scrollback region (with the fade on the newest
//!    lines), the help overlay, the window frame and direct output
//! 3. flush the surface and report the frame as drawn
//!
//! A resize or an explicit request forces a full redraw; otherwise only what
//! changed is written.

mod overlay;

pub use overlay::{draw_frame, draw_help, help_block};

use crate::components::ComponentScheduler;
use crate::engine::{join_bounded, FrameSignal, Shutdown};
use crate::error::EngineResult;
use crate::history::{HistoryStore, HistoryWindow, OutputInbox};
use crate::layout::{DrawContext, RowLayout};
use crate::surface::Surface;
use crate::text::TextBlock;
use crate::theme::{fade, ColorBudget, Theme};
use crate::util::{display_width, fit_to_width, truncate_to_width};
use crate::view::ViewState;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Direct output
// ─────────────────────────────────────────────────────────────────────────────

/// How pinned text interacts with later writes to the same cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Stays until cleared explicitly
    Static,
    /// Replaced (and erased) by the next write at the same cell
    ClearOnChange,
}

/// Text pinned to an absolute cell, outside rows and history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectOutputEntry {
    pub x: u16,
    pub y: u16,
    pub text: String,
    pub mode: OutputMode,
    /// Erased on the next frame, then dropped
    pub cleared: bool,
    drawn: bool,
}

impl DirectOutputEntry {
    pub fn new(x: u16, y: u16, text: impl Into<String>, mode: OutputMode) -> Self {
        Self {
            x,
            y,
            text: text.into(),
            mode,
            cleared: false,
            drawn: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Screen state
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the frame reads, guarded by the one history lock
pub struct Screen {
    pub history: HistoryStore,
    pub rows: RowLayout,
    pub direct: Vec<DirectOutputEntry>,
    pub help: TextBlock,
    /// Repaint everything on the next frame
    pub full_redraw: bool,
    /// Final line to show before the loop exits
    pub farewell: Option<String>,
}

impl Screen {
    pub fn new(history: HistoryStore, rows: RowLayout, help: TextBlock) -> Self {
        Self {
            history,
            rows,
            direct: Vec::new(),
            help,
            full_redraw: true,
            farewell: None,
        }
    }

    /// Pin text; a `ClearOnChange` write replaces whatever was at that cell
    pub fn write_at(&mut self, entry: DirectOutputEntry) {
        if entry.mode == OutputMode::ClearOnChange {
            for old in &mut self.direct {
                if old.x == entry.x && old.y == entry.y {
                    old.cleared = true;
                }
            }
        }
        self.direct.push(entry);
    }

    /// Drop direct output on lines `from_y..=to_y` and repaint
    pub fn clear_range(&mut self, from_y: u16, to_y: u16) {
        for entry in &mut self.direct {
            if (from_y..=to_y).contains(&entry.y) {
                entry.cleared = true;
            }
        }
        self.full_redraw = true;
    }

    /// Empty history and direct output
    pub fn clear(&mut self) {
        self.history.clear();
        self.direct.clear();
        self.full_redraw = true;
    }
}

pub type SharedScreen = Arc<Mutex<Screen>>;

pub(crate) fn lock_screen(screen: &Mutex<Screen>) -> MutexGuard<'_, Screen> {
    screen.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Renderer
// ─────────────────────────────────────────────────────────────────────────────

/// Drawing options fixed at build time
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub fade_lines: usize,
    pub fade_step: u8,
    pub item_spacing: usize,
    pub window_frame: bool,
    pub frame_title: String,
}

/// What was on screen in the scrollback region last frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowKey {
    generation: u64,
    start: usize,
    cursor: usize,
    lines: usize,
}

/// Owns the surface and draws frames
pub struct Renderer {
    surface: Box<dyn Surface>,
    budget: ColorBudget,
    theme: Theme,
    settings: RenderSettings,
    last_size: Option<(u16, u16)>,
    last_window: Option<WindowKey>,
    help_shown: bool,
}

impl Renderer {
    pub fn new(surface: Box<dyn Surface>, theme: Theme, settings: RenderSettings) -> Self {
        Self {
            surface,
            budget: ColorBudget::new(),
            theme,
            settings,
            last_size: None,
            last_window: None,
            help_shown: false,
        }
    }

    fn inset(&self) -> u16 {
        u16::from(self.settings.window_frame)
    }

    pub fn enter(&mut self) -> EngineResult<()> {
        self.surface.enter()?;
        Ok(())
    }

    pub fn leave(&mut self) -> EngineResult<()> {
        self.surface.leave()?;
        Ok(())
    }

    /// Screen lines available to the scrollback, top to bottom
    fn history_lines(&self, rows: &RowLayout, height: u16) -> Vec<u16> {
        let inset = self.inset();
        let reserved = rows.reserved_lines(height, inset);
        (inset..height.saturating_sub(inset))
            .filter(|y| !reserved.contains(y))
            .collect()
    }

    /// Draw one frame
    pub fn frame(
        &mut self,
        screen: &mut Screen,
        scheduler: &ComponentScheduler,
        view: &ViewState,
    ) -> EngineResult<()> {
        self.budget.reset();

        let size = self.surface.size();
        let mut full = screen.full_redraw || self.last_size != Some(size);
        if self.last_size.is_some_and(|last| last != size) {
            debug!(width = size.0, height = size.1, "Terminal resized");
        }
        let (width, height) = size;
        let inset = self.inset();

        let help = view.help_enabled();
        if self.help_shown && !help {
            full = true;
        }

        if full {
            self.surface.reset_colors()?;
            self.surface.clear()?;
            screen.rows.force_all();
            self.last_window = None;
            for entry in &mut screen.direct {
                entry.drawn = false;
            }
        }

        // Erased cells may have covered history or row text
        if self.erase_cleared(screen, full, width)? {
            screen.rows.force_all();
            self.last_window = None;
        }
        let mut painted = false;

        let inner_width = (width as usize).saturating_sub(2 * inset as usize);
        screen.history.set_width(inner_width);
        screen.history.flush();

        let lines = self.history_lines(&screen.rows, height);
        view.publish_view_height(lines.len());
        let window = screen.history.visible_window(lines.len());

        {
            let mut ctx = DrawContext {
                surface: self.surface.as_mut(),
                budget: &mut self.budget,
                scheduler,
                theme: &self.theme,
                spacing: self.settings.item_spacing,
                inset,
            };
            painted |= screen.rows.draw(&mut ctx)? > 0;
        }

        if help {
            // Help stays on top of rows redrawn underneath it
            if full || !self.help_shown || painted {
                draw_help(self.surface.as_mut(), &mut self.budget, &self.theme, &screen.help)?;
                painted = true;
            }
        } else {
            let key = WindowKey {
                generation: screen.history.generation(),
                start: window.start,
                cursor: window.cursor,
                lines: lines.len(),
            };
            if self.last_window != Some(key) {
                self.draw_history(&window, &lines, inner_width)?;
                self.last_window = Some(key);
                painted = true;
            }
        }
        self.help_shown = help;

        // Rows and history may have painted over pinned text. While help
        // is up pinned text waits; closing help forces a full redraw.
        if painted {
            for entry in &mut screen.direct {
                entry.drawn = false;
            }
        }
        if !help {
            self.draw_direct(screen, width)?;
        }

        if full && self.settings.window_frame {
            draw_frame(
                self.surface.as_mut(),
                &mut self.budget,
                &self.theme,
                &self.settings.frame_title,
            )?;
        }

        self.surface.reset_colors()?;
        self.surface.flush()?;
        screen.full_redraw = false;
        self.last_size = Some(size);
        Ok(())
    }

    /// Rewrite the scrollback region, oldest visible line at the top
    fn draw_history(&mut self, window: &HistoryWindow, lines: &[u16], width: usize) -> EngineResult<()> {
        let newest = window.total.saturating_sub(1);
        let x = self.inset();

        for (i, &y) in lines.iter().enumerate() {
            let text = match window.entries.get(i) {
                Some(entry) => {
                    let distance = newest - (window.start + i);
                    let fg = if distance < self.settings.fade_lines {
                        fade(self.theme.highlight, distance, self.settings.fade_step)
                    } else {
                        self.theme.foreground
                    };
                    self.budget.apply_foreground(self.surface.as_mut(), fg)?;
                    fit_to_width(&entry.formatted_line, width)
                }
                None => " ".repeat(width),
            };
            self.budget
                .apply_background(self.surface.as_mut(), self.theme.background)?;
            self.surface.set_cursor(x, y)?;
            self.surface.write(&text)?;
        }
        Ok(())
    }

    /// Blank out cleared direct output and drop it. A full redraw has
    /// already wiped the screen. Returns true when cells were blanked.
    fn erase_cleared(&mut self, screen: &mut Screen, full: bool, width: u16) -> EngineResult<bool> {
        let mut erased = false;
        if !full {
            for entry in screen.direct.iter().filter(|e| e.cleared && e.drawn) {
                let room = (width as usize).saturating_sub(entry.x as usize);
                let blank = " ".repeat(display_width(&entry.text).min(room));
                self.surface.reset_colors()?;
                self.surface.set_cursor(entry.x, entry.y)?;
                self.surface.write(&blank)?;
                erased = true;
            }
        }
        screen.direct.retain(|e| !e.cleared);
        Ok(erased)
    }

    /// Draw direct output not yet on screen, in write order
    fn draw_direct(&mut self, screen: &mut Screen, width: u16) -> EngineResult<()> {
        for entry in screen.direct.iter_mut().filter(|e| !e.drawn) {
            let room = (width as usize).saturating_sub(entry.x as usize);
            if room == 0 {
                continue;
            }
            self.budget
                .apply_foreground(self.surface.as_mut(), self.theme.foreground)?;
            self.surface.set_cursor(entry.x, entry.y)?;
            self.surface.write(truncate_to_width(&entry.text, room))?;
            entry.drawn = true;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to the running render worker
pub struct RenderLoop {
    worker: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

/// Shared pieces the render worker reads every frame
pub struct RenderShared {
    pub screen: SharedScreen,
    pub inbox: Arc<OutputInbox>,
    pub scheduler: Arc<ComponentScheduler>,
    pub view: Arc<ViewState>,
    pub frames: Arc<FrameSignal>,
    pub shutdown: Arc<Shutdown>,
}

/// Draw one frame, isolating panics and logging errors.
///
/// The frame ticket is read before drawing so a ticket is only reported
/// once a frame started after it was issued has completed.
fn draw_frame_guarded(renderer: &mut Renderer, shared: &RenderShared) {
    let ticket = shared.frames.requested();
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut screen = lock_screen(&shared.screen);
        shared.inbox.drain_into(&mut screen.history);
        renderer.frame(&mut screen, &shared.scheduler, &shared.view)
    }));
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Frame failed: {}", e),
        Err(_) => error!("Render loop panicked while drawing a frame"),
    }
    shared.frames.mark_drawn(ticket);
}

impl RenderLoop {
    pub fn spawn(
        mut renderer: Renderer,
        shared: RenderShared,
        interval: Duration,
        join_timeout: Duration,
    ) -> EngineResult<Self> {
        let worker = std::thread::Builder::new()
            .name("headsup-render".to_string())
            .spawn(move || {
                debug!(?interval, "Render loop started");
                loop {
                    let stopping = shared.shutdown.wait_timeout(interval);
                    if stopping {
                        let mut screen = lock_screen(&shared.screen);
                        if let Some(message) = screen.farewell.take() {
                            shared.inbox.drain_into(&mut screen.history);
                            screen.history.append_raw(&message);
                            screen.history.append_raw("\n");
                            shared.view.set_scroll(0);
                            shared.view.set_help(false);
                        }
                    }

                    draw_frame_guarded(&mut renderer, &shared);

                    if stopping {
                        break;
                    }
                }
                if let Err(e) = renderer.leave() {
                    warn!("Failed to restore terminal: {}", e);
                }
                debug!("Render loop stopped");
            })?;

        Ok(Self {
            worker: Some(worker),
            join_timeout,
        })
    }

    /// Bounded join; the shutdown signal must already be triggered
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            join_bounded(handle, self.join_timeout, "render");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{HostHandle, VersionComponent};
    use crate::history::LineFormat;
    use crate::layout::{RowContentItem, RowSpec};
    use crate::surface::{MemoryHandle, MemorySurface};
    use crossterm::style::Color;

    struct Fixture {
        renderer: Renderer,
        screen: Screen,
        scheduler: ComponentScheduler,
        view: Arc<ViewState>,
        handle: MemoryHandle,
    }

    fn settings() -> RenderSettings {
        RenderSettings {
            fade_lines: 3,
            fade_step: 50,
            item_spacing: 2,
            window_frame: false,
            frame_title: String::new(),
        }
    }

    fn fixture(width: u16, height: u16, settings: RenderSettings) -> Fixture {
        let surface = MemorySurface::new(width, height);
        let handle = surface.handle();
        let view = Arc::new(ViewState::new());
        let format = LineFormat {
            show_class_prefix: false,
            ..LineFormat::default()
        };
        let history = HistoryStore::new(100, format, view.clone());
        let host = HostHandle {
            view: view.clone(),
            tick_interval: Duration::from_millis(100),
        };
        let theme = Theme {
            highlight: Color::Rgb {
                r: 200,
                g: 200,
                b: 200,
            },
            ..Theme::default()
        };
        Fixture {
            renderer: Renderer::new(Box::new(surface), theme, settings),
            screen: Screen::new(history, RowLayout::new(), TextBlock::from("help text")),
            scheduler: ComponentScheduler::new(host, Duration::from_secs(1)),
            view,
            handle,
        }
    }

    impl Fixture {
        fn frame(&mut self) {
            self.renderer
                .frame(&mut self.screen, &self.scheduler, &self.view)
                .unwrap();
        }
    }

    #[test]
    fn test_history_region_excludes_rows() {
        let mut f = fixture(30, 6, settings());
        f.screen.rows.add_row(RowSpec::top("head", 0)).unwrap();
        f.screen.rows.add_row(RowSpec::bottom("foot", 0)).unwrap();
        f.screen
            .rows
            .add_item("head", RowContentItem::text("HEAD"), &f.scheduler)
            .unwrap();
        f.screen
            .rows
            .add_item("foot", RowContentItem::text("FOOT"), &f.scheduler)
            .unwrap();

        for i in 1..=10 {
            f.screen.history.append_raw(&format!("line {i}\n"));
        }
        f.frame();

        assert_eq!(f.view.view_height(), 4);
        assert_eq!(
            f.handle.text(),
            "HEAD\nline 7\nline 8\nline 9\nline 10\nFOOT"
        );
    }

    #[test]
    fn test_fade_on_newest_lines() {
        let mut f = fixture(20, 5, settings());
        for i in 1..=5 {
            f.screen.history.append_raw(&format!("l{i}\n"));
        }
        f.frame();

        let rgb = |v: u8| Color::Rgb { r: v, g: v, b: v };
        assert_eq!(f.handle.cell(0, 4).fg, rgb(200));
        assert_eq!(f.handle.cell(0, 3).fg, rgb(150));
        assert_eq!(f.handle.cell(0, 2).fg, rgb(100));
        assert_eq!(f.handle.cell(0, 1).fg, Color::Reset);
    }

    #[test]
    fn test_unchanged_frame_writes_nothing_new() {
        let mut f = fixture(20, 5, settings());
        f.screen.history.append_raw("a\nb\n");
        f.frame();
        let writes = f.handle.write_count();

        f.frame();
        assert_eq!(f.handle.write_count(), writes);

        f.screen.history.append_raw("c\n");
        f.frame();
        assert!(f.handle.write_count() > writes);
    }

    #[test]
    fn test_scrolled_view_shows_older_lines() {
        let mut f = fixture(20, 3, settings());
        for i in 1..=10 {
            f.screen.history.append_raw(&format!("line {i}\n"));
        }
        f.frame();
        f.view.set_scroll(2);
        f.frame();
        assert_eq!(f.handle.text(), "line 6\nline 7\nline 8");

        // New output keeps the same lines on screen
        f.screen.history.append_raw("line 11\n");
        f.frame();
        assert_eq!(f.view.scroll(), 3);
        assert_eq!(f.handle.text(), "line 6\nline 7\nline 8");
    }

    #[test]
    fn test_help_overlay_and_close() {
        let mut f = fixture(40, 10, settings());
        f.screen.history.append_raw("under the help\n");
        f.frame();

        f.view.set_help(true);
        f.frame();
        assert!(f.handle.text().contains("help text"));

        f.view.set_help(false);
        f.frame();
        assert!(!f.handle.text().contains("help text"));
        assert!(f.handle.text().contains("under the help"));
    }

    #[test]
    fn test_resize_forces_full_redraw() {
        let mut f = fixture(20, 4, settings());
        f.scheduler
            .register("version", || VersionComponent::new("v1"))
            .unwrap();
        f.screen.rows.add_row(RowSpec::top("head", 0)).unwrap();
        f.screen
            .rows
            .add_item("head", RowContentItem::component("version"), &f.scheduler)
            .unwrap();
        f.frame();
        assert_eq!(f.handle.line(0).trim_end(), "v1");

        f.handle.resize(30, 6);
        f.frame();
        assert_eq!(f.handle.line(0).trim_end(), "v1");
    }

    #[test]
    fn test_window_frame_insets_content() {
        let mut with_frame = settings();
        with_frame.window_frame = true;
        with_frame.frame_title = "demo".to_string();
        let mut f = fixture(20, 5, with_frame);
        f.screen.history.append_raw("inside\n");
        f.frame();

        assert_eq!(f.view.view_height(), 3);
        assert!(f.handle.line(0).contains("demo"));
        assert_eq!(f.handle.line(1), "│inside            │");
    }

    #[test]
    fn test_direct_output_modes() {
        let mut f = fixture(20, 3, settings());
        f.screen
            .write_at(DirectOutputEntry::new(5, 1, "first", OutputMode::ClearOnChange));
        f.frame();
        assert_eq!(f.handle.line(1).trim_end(), "     first");

        f.screen
            .write_at(DirectOutputEntry::new(5, 1, "2nd", OutputMode::ClearOnChange));
        f.frame();
        assert_eq!(f.handle.line(1).trim_end(), "     2nd");
        assert_eq!(f.screen.direct.len(), 1);

        f.screen.write_at(DirectOutputEntry::new(0, 2, "pin", OutputMode::Static));
        f.screen.clear_range(1, 1);
        f.frame();
        assert_eq!(f.handle.line(1).trim_end(), "");
        assert_eq!(f.handle.line(2).trim_end(), "pin");
    }

    #[test]
    fn test_help_covers_direct_output() {
        let mut f = fixture(40, 10, settings());
        f.screen
            .write_at(DirectOutputEntry::new(14, 4, "PINNED", OutputMode::Static));
        f.view.set_help(true);
        f.frame();
        assert!(f.handle.text().contains("help text"));
        assert!(!f.handle.text().contains("PINNED"));

        // Already on screen when help opens
        f.view.set_help(false);
        f.frame();
        assert!(f.handle.text().contains("PINNED"));
        f.view.set_help(true);
        f.frame();
        f.frame();
        assert!(!f.handle.text().contains("PINNED"));

        f.view.set_help(false);
        f.frame();
        assert!(f.handle.text().contains("PINNED"));
    }

    #[test]
    fn test_help_redrawn_over_changed_rows() {
        let mut f = fixture(20, 5, settings());
        f.screen.help = TextBlock::from("h");
        f.screen.rows.add_row(RowSpec::top("mid", 2)).unwrap();
        f.screen
            .rows
            .add_item("mid", RowContentItem::text("ROWROWROWROWROW"), &f.scheduler)
            .unwrap();
        f.view.set_help(true);
        f.frame();
        assert!(f.handle.line(2).contains("│ h │"));

        f.screen.rows.force_all();
        f.frame();
        assert!(f.handle.line(2).contains("│ h │"));
    }

    #[test]
    fn test_erased_direct_output_restores_history() {
        let mut f = fixture(30, 3, settings());
        f.screen
            .history
            .append_raw("aaaaaaaaaa\nbbbbbbbbbb\ncccccccccc\n");
        f.screen
            .write_at(DirectOutputEntry::new(0, 1, "XXXXXX", OutputMode::ClearOnChange));
        f.frame();
        assert_eq!(f.handle.line(1).trim_end(), "XXXXXXbbbb");

        f.screen
            .write_at(DirectOutputEntry::new(0, 1, "Y", OutputMode::ClearOnChange));
        f.frame();
        assert_eq!(f.handle.line(1).trim_end(), "Ybbbbbbbbb");
        assert_eq!(f.handle.line(0).trim_end(), "aaaaaaaaaa");
    }

    #[test]
    fn test_crowded_palette_falls_back_to_default() {
        let mut f = fixture(120, 3, settings());
        f.screen.rows.add_row(RowSpec::top("colors", 0)).unwrap();
        for i in 0..20u8 {
            let item = RowContentItem::text(format!("c{i}")).fg(Color::Rgb {
                r: i * 10,
                g: 0,
                b: 0,
            });
            f.screen.rows.add_item("colors", item, &f.scheduler).unwrap();
        }

        f.renderer
            .frame(&mut f.screen, &f.scheduler, &f.view)
            .unwrap();

        let line = f.handle.line(0);
        assert!(line.contains("c0"));
        assert!(line.contains("c19"));
        let last = line.find("c19").unwrap() as u16;
        assert_eq!(f.handle.cell(last, 0).fg, Color::Reset);
    }
}
