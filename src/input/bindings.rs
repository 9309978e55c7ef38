// Built-in key bindings
//
// Keys map to actions in two modes: normal navigation and the search prompt.
// A held key fires once; scroll keys start repeating after a delay. Some
// terminals never report releases, so any other key fires again once it has
// been quiet for a short gap. Text typed into the search prompt always fires.

use crossterm::event::{KeyCode, KeyEventKind, KeyModifiers};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{InputEvent, WheelDirection};

/// What a built-in binding does to the view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Jump to the oldest line
    ScrollOldest,
    /// Back to the live tail
    ScrollTail,
    /// Positive scrolls back in history
    ScrollLines(isize),
    /// Whole view pages; positive scrolls back
    ScrollPages(isize),
    StartSearch,
    SearchInput(char),
    SearchBackspace,
    /// Run the typed search and jump to the first match
    SearchSubmit,
    SearchCancel,
    FindNext,
    FindPrevious,
    ToggleHelp,
    Quit,
}

/// Gap after which a held non-repeating key counts as pressed again
const REPRESS_GAP: Duration = Duration::from_millis(150);

/// `(delay, interval)` for keys that auto-repeat while held
fn repeat_timing(code: KeyCode) -> Option<(Duration, Duration)> {
    match code {
        KeyCode::Up | KeyCode::Down => {
            Some((Duration::from_millis(500), Duration::from_millis(50)))
        }
        KeyCode::PageUp | KeyCode::PageDown => {
            Some((Duration::from_millis(300), Duration::from_millis(30)))
        }
        _ => None,
    }
}

/// A key seen pressed and not yet released
#[derive(Debug, Clone, Copy)]
struct Held {
    since: Instant,
    fired: Instant,
}

/// Which binding table applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mode {
    pub searching: bool,
    pub help: bool,
}

/// Maps input events to built-in actions
pub struct KeyBindings {
    enabled: bool,
    quit_key: char,
    held: HashMap<KeyCode, Held>,
}

impl KeyBindings {
    pub fn new(enabled: bool, quit_key: char) -> Self {
        Self {
            enabled,
            quit_key,
            held: HashMap::new(),
        }
    }

    /// Whether a press of `code` at `now` fires its action
    fn fires(&mut self, code: KeyCode, now: Instant) -> bool {
        let held = match self.held.entry(code) {
            Entry::Vacant(slot) => {
                slot.insert(Held { since: now, fired: now });
                return true;
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };
        let since_fired = now.saturating_duration_since(held.fired);
        let ready = match repeat_timing(code) {
            Some((delay, interval)) => {
                now.saturating_duration_since(held.since) >= delay && since_fired >= interval
            }
            None => since_fired >= REPRESS_GAP,
        };
        if ready {
            held.fired = now;
        }
        ready
    }

    /// Action for `event`, if any. Ctrl+C quits even with built-ins off.
    pub fn action_for(&mut self, event: &InputEvent, mode: Mode) -> Option<Action> {
        match *event {
            InputEvent::Key {
                code,
                modifiers,
                kind,
            } => {
                if kind == KeyEventKind::Release {
                    self.held.remove(&code);
                    return None;
                }
                let ctrl = modifiers.contains(KeyModifiers::CONTROL);
                if ctrl && code == KeyCode::Char('c') {
                    return Some(Action::Quit);
                }
                if !self.enabled {
                    return None;
                }
                if mode.searching {
                    return search_action(code, ctrl);
                }
                let action = self.navigation_action(code, ctrl, mode)?;
                self.fires(code, Instant::now()).then_some(action)
            }
            InputEvent::MouseWheel { direction, .. } if self.enabled => Some(match direction {
                WheelDirection::Up => Action::ScrollLines(-1),
                WheelDirection::Down => Action::ScrollLines(1),
            }),
            _ => None,
        }
    }

    fn navigation_action(&self, code: KeyCode, ctrl: bool, mode: Mode) -> Option<Action> {
        let action = match code {
            KeyCode::Char('f') if ctrl => Action::StartSearch,
            _ if ctrl => return None,
            KeyCode::Home => Action::ScrollOldest,
            KeyCode::End => Action::ScrollTail,
            KeyCode::Esc if mode.help => Action::ToggleHelp,
            KeyCode::Esc => Action::ScrollTail,
            KeyCode::Up => Action::ScrollLines(1),
            KeyCode::Down => Action::ScrollLines(-1),
            KeyCode::PageUp => Action::ScrollPages(1),
            KeyCode::PageDown => Action::ScrollPages(-1),
            KeyCode::F(1) | KeyCode::Char('?') => Action::ToggleHelp,
            KeyCode::Char('/') => Action::StartSearch,
            KeyCode::Char('n') => Action::FindNext,
            KeyCode::Char('N') => Action::FindPrevious,
            KeyCode::Char(c) if c == self.quit_key => Action::Quit,
            _ => return None,
        };
        Some(action)
    }
}

fn search_action(code: KeyCode, ctrl: bool) -> Option<Action> {
    match code {
        KeyCode::Esc => Some(Action::SearchCancel),
        KeyCode::Enter => Some(Action::SearchSubmit),
        KeyCode::Backspace => Some(Action::SearchBackspace),
        KeyCode::Char(c) if !ctrl => Some(Action::SearchInput(c)),
        _ => None,
    }
}

/// Lines shown in the help overlay: (keys, description)
pub fn help_entries(quit_key: char) -> Vec<(String, String)> {
    [
        ("Home", "oldest line"),
        ("End / Esc", "follow new output"),
        ("Up / Down", "scroll one line"),
        ("PgUp / PgDn", "scroll one page"),
        ("/  Ctrl+F", "search"),
        ("n / N", "next / previous match"),
        ("F1 / ?", "toggle this help"),
    ]
    .into_iter()
    .map(|(k, d)| (k.to_string(), d.to_string()))
    .chain(std::iter::once((
        format!("{quit_key}  Ctrl+C"),
        "quit".to_string(),
    )))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> InputEvent {
        InputEvent::Key {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
        }
    }

    fn release(code: KeyCode) -> InputEvent {
        InputEvent::Key {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
        }
    }

    fn ctrl(c: char) -> InputEvent {
        InputEvent::Key {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_held_key_fires_once_until_quiet() {
        let mut keys = KeyBindings::new(true, 'q');
        let t0 = Instant::now();

        assert!(keys.fires(KeyCode::Home, t0));
        assert!(!keys.fires(KeyCode::Home, t0 + ms(10)));
        assert!(!keys.fires(KeyCode::Home, t0 + ms(140)));
        assert!(keys.fires(KeyCode::Home, t0 + ms(200)));
    }

    #[test]
    fn test_scroll_keys_repeat_after_delay() {
        let mut keys = KeyBindings::new(true, 'q');
        let t0 = Instant::now();

        assert!(keys.fires(KeyCode::Down, t0));
        assert!(!keys.fires(KeyCode::Down, t0 + ms(200)));
        assert!(keys.fires(KeyCode::Down, t0 + ms(510)));
        assert!(!keys.fires(KeyCode::Down, t0 + ms(530)));
        assert!(keys.fires(KeyCode::Down, t0 + ms(565)));

        // Paging repeats sooner
        assert!(keys.fires(KeyCode::PageUp, t0));
        assert!(keys.fires(KeyCode::PageUp, t0 + ms(310)));
    }

    #[test]
    fn test_navigation_bindings() {
        let mut keys = KeyBindings::new(true, 'q');
        let mode = Mode::default();

        assert_eq!(keys.action_for(&press(KeyCode::Home), mode), Some(Action::ScrollOldest));
        assert_eq!(keys.action_for(&press(KeyCode::End), mode), Some(Action::ScrollTail));
        assert_eq!(keys.action_for(&press(KeyCode::Esc), mode), Some(Action::ScrollTail));
        assert_eq!(keys.action_for(&press(KeyCode::Up), mode), Some(Action::ScrollLines(1)));
        assert_eq!(
            keys.action_for(&press(KeyCode::PageDown), mode),
            Some(Action::ScrollPages(-1))
        );
        assert_eq!(keys.action_for(&press(KeyCode::Char('q')), mode), Some(Action::Quit));
        assert_eq!(keys.action_for(&press(KeyCode::Char('z')), mode), None);
    }

    #[test]
    fn test_released_key_triggers_again() {
        let mut keys = KeyBindings::new(true, 'q');
        let mode = Mode::default();

        assert!(keys.action_for(&press(KeyCode::Home), mode).is_some());
        assert!(keys.action_for(&press(KeyCode::Home), mode).is_none());
        assert!(keys.action_for(&release(KeyCode::Home), mode).is_none());
        assert!(keys.action_for(&press(KeyCode::Home), mode).is_some());
    }

    #[test]
    fn test_esc_closes_help_first() {
        let mut keys = KeyBindings::new(true, 'q');
        let mode = Mode {
            searching: false,
            help: true,
        };
        assert_eq!(keys.action_for(&press(KeyCode::Esc), mode), Some(Action::ToggleHelp));
    }

    #[test]
    fn test_search_mode_captures_typing() {
        let mut keys = KeyBindings::new(true, 'q');
        let mode = Mode {
            searching: true,
            help: false,
        };

        // Quit key and repeated letters are just text while searching
        assert_eq!(
            keys.action_for(&press(KeyCode::Char('q')), mode),
            Some(Action::SearchInput('q'))
        );
        assert_eq!(
            keys.action_for(&press(KeyCode::Char('l')), mode),
            Some(Action::SearchInput('l'))
        );
        assert_eq!(
            keys.action_for(&press(KeyCode::Char('l')), mode),
            Some(Action::SearchInput('l'))
        );
        assert_eq!(keys.action_for(&press(KeyCode::Enter), mode), Some(Action::SearchSubmit));
        assert_eq!(keys.action_for(&press(KeyCode::Esc), mode), Some(Action::SearchCancel));
        assert_eq!(keys.action_for(&ctrl('c'), mode), Some(Action::Quit));
    }

    #[test]
    fn test_disabled_bindings_still_quit_on_ctrl_c() {
        let mut keys = KeyBindings::new(false, 'q');
        let mode = Mode::default();
        assert_eq!(keys.action_for(&press(KeyCode::Home), mode), None);
        assert_eq!(keys.action_for(&press(KeyCode::Char('q')), mode), None);
        assert_eq!(keys.action_for(&ctrl('c'), mode), Some(Action::Quit));
    }

    #[test]
    fn test_ctrl_f_starts_search() {
        let mut keys = KeyBindings::new(true, 'q');
        assert_eq!(keys.action_for(&ctrl('f'), Mode::default()), Some(Action::StartSearch));
    }

    #[test]
    fn test_wheel_moves_cursor() {
        let mut keys = KeyBindings::new(true, 'q');
        let up = InputEvent::MouseWheel {
            direction: WheelDirection::Up,
            x: 0,
            y: 0,
        };
        let down = InputEvent::MouseWheel {
            direction: WheelDirection::Down,
            x: 0,
            y: 0,
        };
        assert_eq!(keys.action_for(&up, Mode::default()), Some(Action::ScrollLines(-1)));
        assert_eq!(keys.action_for(&down, Mode::default()), Some(Action::ScrollLines(1)));
    }

    #[test]
    fn test_help_entries_include_quit_key() {
        let entries = help_entries('x');
        assert!(entries.iter().any(|(k, d)| k.starts_with('x') && d == "quit"));
    }
}
