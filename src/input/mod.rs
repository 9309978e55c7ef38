//! Input loop
//!
//! A worker polls an [`InputSource`] for keyboard and mouse events, applies
//! the built-in bindings to the shared view state, then forwards every event
//! to subscribers. Anything that needs the history (search, jump to match,
//! shutdown) goes through an [`InputTarget`], which the dashboard implements
//! under its history lock.

mod bindings;

pub use bindings::{help_entries, Action, KeyBindings, Mode};

use crate::engine::{join_bounded, Shutdown};
use crate::error::EngineResult;
use crate::view::ViewState;
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, trace};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelDirection {
    Up,
    Down,
}

/// Typed input, independent of the terminal backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key {
        code: KeyCode,
        modifiers: KeyModifiers,
        kind: KeyEventKind,
    },
    MouseMove {
        x: u16,
        y: u16,
    },
    MouseButton {
        x: u16,
        y: u16,
        button: MouseButton,
        pressed: bool,
        modifiers: KeyModifiers,
    },
    MouseWheel {
        direction: WheelDirection,
        x: u16,
        y: u16,
    },
}

impl InputEvent {
    /// Plain key press, mostly for scripted input
    pub fn key(code: KeyCode) -> Self {
        Self::Key {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
        }
    }

    pub fn ctrl(c: char) -> Self {
        Self::Key {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
        }
    }

    /// Convert a crossterm event; resize, focus and paste events are dropped
    pub fn from_crossterm(event: Event) -> Option<Self> {
        match event {
            Event::Key(key) => Some(Self::Key {
                code: key.code,
                modifiers: key.modifiers,
                kind: key.kind,
            }),
            Event::Mouse(mouse) => {
                let (x, y) = (mouse.column, mouse.row);
                match mouse.kind {
                    MouseEventKind::ScrollUp => Some(Self::MouseWheel {
                        direction: WheelDirection::Up,
                        x,
                        y,
                    }),
                    MouseEventKind::ScrollDown => Some(Self::MouseWheel {
                        direction: WheelDirection::Down,
                        x,
                        y,
                    }),
                    MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                        Some(Self::MouseMove { x, y })
                    }
                    MouseEventKind::Down(button) | MouseEventKind::Up(button) => {
                        Some(Self::MouseButton {
                            x,
                            y,
                            button,
                            pressed: matches!(mouse.kind, MouseEventKind::Down(_)),
                            modifiers: mouse.modifiers,
                        })
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// Non-blocking source of input events
pub trait InputSource: Send {
    /// Everything that arrived since the last call; empty when idle
    fn poll_events(&mut self) -> Vec<InputEvent>;
}

/// Reads the real terminal through crossterm
#[derive(Debug, Default)]
pub struct CrosstermInput;

impl CrosstermInput {
    pub fn new() -> Self {
        Self
    }
}

impl InputSource for CrosstermInput {
    fn poll_events(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();
        while event::poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(ev) => events.extend(InputEvent::from_crossterm(ev)),
                Err(e) => {
                    trace!("Input read failed: {}", e);
                    break;
                }
            }
        }
        events
    }
}

/// Replays queued events; push more through its handle at any time
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    queue: Arc<Mutex<VecDeque<InputEvent>>>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: InputEvent) {
        lock(&self.queue).push_back(event);
    }

    pub fn push_all(&self, events: impl IntoIterator<Item = InputEvent>) {
        lock(&self.queue).extend(events);
    }

    /// Events not yet polled
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }
}

impl InputSource for ScriptedInput {
    fn poll_events(&mut self) -> Vec<InputEvent> {
        lock(&self.queue).drain(..).collect()
    }
}

/// Operations the bindings need from the dashboard
pub trait InputTarget: Send + Sync {
    fn search(&self, needle: &str);
    fn find_next(&self);
    fn find_previous(&self);
    /// Repaint everything on the next frame
    fn request_redraw(&self);
    fn shutdown(&self);
}

pub type Subscriber = Arc<dyn Fn(&InputEvent) + Send + Sync>;

/// Callbacks that receive every input event
#[derive(Default)]
pub struct Subscribers {
    list: Mutex<Vec<Subscriber>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subscriber: Subscriber) {
        lock(&self.list).push(subscriber);
    }

    pub fn len(&self) -> usize {
        lock(&self.list).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every subscriber; a panicking one is logged and skipped
    pub fn notify(&self, event: &InputEvent) {
        let subscribers = lock(&self.list).clone();
        for subscriber in subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(event))).is_err() {
                error!("Input subscriber panicked");
            }
        }
    }
}

/// Applies bindings, then forwards events
pub struct InputDispatcher {
    bindings: KeyBindings,
    view: Arc<ViewState>,
    target: Arc<dyn InputTarget>,
    subscribers: Arc<Subscribers>,
}

impl InputDispatcher {
    pub fn new(
        bindings: KeyBindings,
        view: Arc<ViewState>,
        target: Arc<dyn InputTarget>,
        subscribers: Arc<Subscribers>,
    ) -> Self {
        Self {
            bindings,
            view,
            target,
            subscribers,
        }
    }

    pub fn dispatch(&mut self, event: InputEvent) {
        let mode = Mode {
            searching: self.view.search().enabled,
            help: self.view.help_enabled(),
        };
        if let Some(action) = self.bindings.action_for(&event, mode) {
            trace!(?action, "Built-in binding");
            self.apply(action);
        }
        self.subscribers.notify(&event);
    }

    fn apply(&self, action: Action) {
        match action {
            Action::ScrollOldest => self.view.set_scroll(usize::MAX),
            Action::ScrollTail => self.view.set_scroll(0),
            Action::ScrollLines(n) => self.view.scroll_by(n),
            Action::ScrollPages(n) => {
                let page = self.view.view_height().max(1) as isize;
                self.view.scroll_by(n.saturating_mul(page));
            }
            Action::StartSearch => self.view.update_search(|s| {
                s.enabled = true;
                s.needle.clear();
            }),
            Action::SearchInput(c) => self.view.update_search(|s| s.needle.push(c)),
            Action::SearchBackspace => self.view.update_search(|s| {
                s.needle.pop();
            }),
            Action::SearchSubmit => {
                let needle = self.view.update_search(|s| {
                    s.enabled = false;
                    s.needle.clone()
                });
                self.target.search(&needle);
                self.target.find_next();
            }
            Action::SearchCancel => {
                self.view.update_search(|s| s.enabled = false);
                self.target.search("");
            }
            Action::FindNext => self.target.find_next(),
            Action::FindPrevious => self.target.find_previous(),
            Action::ToggleHelp => {
                self.view.toggle_help();
                self.target.request_redraw();
            }
            Action::Quit => self.target.shutdown(),
        }
    }
}

/// Handle to the running input worker
pub struct InputLoop {
    worker: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl InputLoop {
    /// Start polling `source` every `interval` until `shutdown` fires
    pub fn spawn(
        mut source: Box<dyn InputSource>,
        mut dispatcher: InputDispatcher,
        interval: Duration,
        shutdown: Arc<Shutdown>,
        join_timeout: Duration,
    ) -> EngineResult<Self> {
        let worker = std::thread::Builder::new()
            .name("headsup-input".to_string())
            .spawn(move || {
                debug!("Input loop started");
                while !shutdown.wait_timeout(interval) {
                    for event in source.poll_events() {
                        dispatcher.dispatch(event);
                    }
                }
                debug!("Input loop stopped");
            })?;

        Ok(Self {
            worker: Some(worker),
            join_timeout,
        })
    }

    /// Bounded join; the shutdown signal must already be triggered
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            join_bounded(handle, self.join_timeout, "input");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            lock(&self.calls).clone()
        }
    }

    impl InputTarget for Recorder {
        fn search(&self, needle: &str) {
            lock(&self.calls).push(format!("search:{needle}"));
        }
        fn find_next(&self) {
            lock(&self.calls).push("next".to_string());
        }
        fn find_previous(&self) {
            lock(&self.calls).push("prev".to_string());
        }
        fn request_redraw(&self) {
            lock(&self.calls).push("redraw".to_string());
        }
        fn shutdown(&self) {
            lock(&self.calls).push("shutdown".to_string());
        }
    }

    fn dispatcher() -> (InputDispatcher, Arc<ViewState>, Arc<Recorder>, Arc<Subscribers>) {
        let view = Arc::new(ViewState::new());
        let target = Arc::new(Recorder::default());
        let subscribers = Arc::new(Subscribers::new());
        let dispatcher = InputDispatcher::new(
            KeyBindings::new(true, 'q'),
            view.clone(),
            target.clone(),
            subscribers.clone(),
        );
        (dispatcher, view, target, subscribers)
    }

    #[test]
    fn test_home_end_move_cursor() {
        let (mut d, view, _, _) = dispatcher();
        d.dispatch(InputEvent::key(KeyCode::Home));
        assert_eq!(view.scroll(), usize::MAX);
        d.dispatch(InputEvent::key(KeyCode::End));
        assert_eq!(view.scroll(), 0);
    }

    #[test]
    fn test_page_uses_view_height() {
        let (mut d, view, _, _) = dispatcher();
        view.publish_view_height(20);
        d.dispatch(InputEvent::key(KeyCode::PageUp));
        assert_eq!(view.scroll(), 20);
    }

    #[test]
    fn test_search_flow() {
        let (mut d, view, target, _) = dispatcher();
        d.dispatch(InputEvent::key(KeyCode::Char('/')));
        assert!(view.search().enabled);

        for c in "errx".chars() {
            d.dispatch(InputEvent::key(KeyCode::Char(c)));
        }
        d.dispatch(InputEvent::key(KeyCode::Backspace));
        assert_eq!(view.search().needle, "err");

        d.dispatch(InputEvent::key(KeyCode::Enter));
        assert!(!view.search().enabled);
        assert_eq!(target.calls(), vec!["search:err", "next"]);

        d.dispatch(InputEvent::key(KeyCode::Char('N')));
        assert_eq!(target.calls().last().map(String::as_str), Some("prev"));
    }

    #[test]
    fn test_help_toggle_requests_redraw() {
        let (mut d, view, target, _) = dispatcher();
        d.dispatch(InputEvent::key(KeyCode::F(1)));
        assert!(view.help_enabled());
        assert_eq!(target.calls(), vec!["redraw"]);
    }

    #[test]
    fn test_quit_and_subscribers() {
        let (mut d, _, target, subscribers) = dispatcher();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        subscribers.add(Arc::new(move |_: &InputEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        d.dispatch(InputEvent::MouseMove { x: 3, y: 4 });
        d.dispatch(InputEvent::ctrl('c'));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(target.calls(), vec!["shutdown"]);
    }

    #[test]
    fn test_panicking_subscriber_isolated() {
        let (mut d, _, _, subscribers) = dispatcher();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        subscribers.add(Arc::new(|_: &InputEvent| panic!("bad subscriber")));
        subscribers.add(Arc::new(move |_: &InputEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        d.dispatch(InputEvent::key(KeyCode::Char('z')));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_loop_drains_scripted_input() {
        let (d, view, _, _) = dispatcher();
        let script = ScriptedInput::new();
        script.push(InputEvent::key(KeyCode::Up));
        script.push(InputEvent::key(KeyCode::Char('?')));

        let shutdown = Arc::new(Shutdown::new());
        let mut input = InputLoop::spawn(
            Box::new(script.clone()),
            d,
            Duration::from_millis(1),
            shutdown.clone(),
            Duration::from_secs(1),
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        shutdown.trigger();
        input.join();

        assert_eq!(script.pending(), 0);
        assert_eq!(view.scroll(), 1);
        assert!(view.help_enabled());
    }

    #[test]
    fn test_crossterm_conversion() {
        use crossterm::event::{KeyEvent, MouseEvent};

        let key = Event::Key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::SHIFT));
        assert_eq!(
            InputEvent::from_crossterm(key),
            Some(InputEvent::Key {
                code: KeyCode::Char('a'),
                modifiers: KeyModifiers::SHIFT,
                kind: KeyEventKind::Press,
            })
        );

        let wheel = Event::Mouse(MouseEvent {
            kind: MouseEventKind::ScrollDown,
            column: 2,
            row: 5,
            modifiers: KeyModifiers::NONE,
        });
        assert_eq!(
            InputEvent::from_crossterm(wheel),
            Some(InputEvent::MouseWheel {
                direction: WheelDirection::Down,
                x: 2,
                y: 5,
            })
        );

        assert_eq!(InputEvent::from_crossterm(Event::Resize(10, 10)), None);
    }
}
