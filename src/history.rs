//! Scrollback history
//!
//! Producers stage raw text with `append_raw`; the render loop turns staged
//! text into formatted entries with `flush` once per frame. The buffer is
//! bounded: once it grows past `max_lines` the oldest entries are dropped in
//! one batch.
//!
//! Every method here runs under the engine's history lock.

use crate::util::{display_width, truncate_to_width};
use crate::view::ViewState;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// Field separator of the structured line convention
pub const FIELD_DELIMITER: char = '|';

/// One formatted scrollback line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// The raw line as produced
    pub original_line: String,
    /// What gets drawn: optional class prefix plus the truncated message
    pub formatted_line: String,
    /// Last segment of the dotted (or `::`) class path, empty if none
    pub class_name: String,
}

/// How raw lines become entries
#[derive(Debug, Clone)]
pub struct LineFormat {
    /// Cells available for a formatted line
    pub width: usize,
    /// Prefix messages with `[ClassName] `
    pub show_class_prefix: bool,
    /// Anything after this marker is kept verbatim
    pub raw_marker: String,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self {
            width: 80,
            show_class_prefix: true,
            raw_marker: "\u{1b}[raw]".to_string(),
        }
    }
}

impl LogEntry {
    /// Build an entry from one raw line.
    ///
    /// `a|b|pkg.Class|message|` yields message `message` and class `Class`:
    /// the second-to-last field is the message and the third-to-last, when
    /// present, the class path. Lines without delimiters are messages as-is.
    pub fn parse(line: &str, format: &LineFormat) -> Self {
        if !format.raw_marker.is_empty() {
            if let Some(pos) = line.find(&format.raw_marker) {
                let mut text = line[..pos].to_string();
                text.push_str(&line[pos + format.raw_marker.len()..]);
                return Self {
                    original_line: line.to_string(),
                    formatted_line: truncate_to_width(&text, format.width).to_string(),
                    class_name: String::new(),
                };
            }
        }

        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        let (message, class_path) = match fields.len() {
            0 | 1 => (line, ""),
            2 => (fields[0], ""),
            n => (fields[n - 2], fields[n - 3]),
        };

        let class_name = class_path
            .rsplit(|c: char| c == '.' || c == ':')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        let prefix = if format.show_class_prefix && !class_name.is_empty() {
            format!("[{}] ", class_name)
        } else {
            String::new()
        };
        let room = format.width.saturating_sub(display_width(&prefix));
        let formatted_line = format!("{}{}", prefix, truncate_to_width(message, room));

        Self {
            original_line: line.to_string(),
            formatted_line,
            class_name,
        }
    }
}

/// Slice of history that fits the scrollback region
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryWindow {
    /// Buffer index of the first entry
    pub start: usize,
    /// Buffer length when the window was taken
    pub total: usize,
    /// Scroll cursor after clamping
    pub cursor: usize,
    pub entries: Vec<LogEntry>,
}

/// Bounded scrollback buffer plus its scroll cursor and search index
pub struct HistoryStore {
    pending: String,
    buffer: VecDeque<LogEntry>,
    max_lines: usize,
    format: LineFormat,
    /// Buffer indices of lines matching the current needle
    matches: Vec<usize>,
    needle: String,
    view: Arc<ViewState>,
    /// Bumped on every change to the buffer contents
    generation: u64,
}

impl HistoryStore {
    pub fn new(max_lines: usize, format: LineFormat, view: Arc<ViewState>) -> Self {
        Self {
            pending: String::new(),
            buffer: VecDeque::new(),
            max_lines: max_lines.max(1),
            format,
            matches: Vec::new(),
            needle: String::new(),
            view,
            generation: 0,
        }
    }

    /// Stage unformatted output; nothing is visible until the next flush
    pub fn append_raw(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    /// True if staged text is waiting for a flush
    pub fn has_pending(&self) -> bool {
        self.pending.contains('\n')
    }

    /// Width used when formatting subsequent lines
    pub fn set_width(&mut self, width: usize) {
        self.format.width = width;
    }

    /// Turn staged text into entries. Returns the number appended.
    ///
    /// Only complete lines are consumed; a trailing fragment without a
    /// newline stays staged. A scrolled-back view keeps showing the same
    /// lines while new ones arrive below it.
    pub fn flush(&mut self) -> usize {
        let Some(last_newline) = self.pending.rfind('\n') else {
            return 0;
        };
        let rest = self.pending.split_off(last_newline + 1);
        let staged = std::mem::replace(&mut self.pending, rest);

        let mut appended = 0;
        for line in staged.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            let entry = LogEntry::parse(line, &self.format);
            if !self.needle.is_empty() && contains_ignore_case(&entry.formatted_line, &self.needle) {
                self.matches.push(self.buffer.len());
            }
            self.buffer.push_back(entry);
            appended += 1;
        }

        if appended == 0 {
            return 0;
        }

        if !self.view.is_live() {
            self.view.scroll_by(appended as isize);
        }

        if self.buffer.len() > self.max_lines {
            let excess = self.buffer.len() - self.max_lines;
            self.buffer.drain(..excess);
            self.matches.retain(|&idx| idx >= excess);
            for idx in &mut self.matches {
                *idx -= excess;
            }
            self.publish_match_count();
        } else if !self.needle.is_empty() {
            self.publish_match_count();
        }

        self.generation += 1;
        self.view.publish_history_len(self.buffer.len());
        appended
    }

    /// Largest valid scroll cursor for a view of `view_height` lines
    pub fn max_cursor(&self, view_height: usize) -> usize {
        self.buffer.len().saturating_sub(view_height)
    }

    /// Entries visible in a region `view_height` lines tall.
    ///
    /// Clamps the shared scroll cursor into `[0, max_cursor]` first; this is
    /// the one place the upper bound is enforced.
    pub fn visible_window(&self, view_height: usize) -> HistoryWindow {
        let cursor = self.view.clamp_scroll(self.max_cursor(view_height));

        let total = self.buffer.len();
        let start = total.saturating_sub(view_height).saturating_sub(cursor);
        let entries = self
            .buffer
            .iter()
            .skip(start)
            .take(view_height)
            .cloned()
            .collect();

        HistoryWindow {
            start,
            total,
            cursor,
            entries,
        }
    }

    /// Case-insensitive substring scan of the whole buffer.
    ///
    /// Resets the match cursor; the next `find_next` lands on the first
    /// match.
    pub fn search(&mut self, needle: &str) -> BTreeMap<usize, LogEntry> {
        self.needle = needle.to_string();
        self.matches.clear();

        let mut found = BTreeMap::new();
        if !needle.is_empty() {
            for (idx, entry) in self.buffer.iter().enumerate() {
                if contains_ignore_case(&entry.formatted_line, needle) {
                    self.matches.push(idx);
                    found.insert(idx, entry.clone());
                }
            }
        }

        let count = self.matches.len();
        self.view.update_search(|s| {
            s.needle = needle.to_string();
            s.match_index = None;
            s.match_count = count;
        });
        found
    }

    /// Advance to the next match (wrapping) and scroll it into view.
    /// Returns the buffer index of the match.
    pub fn find_next(&mut self, view_height: usize) -> Option<usize> {
        self.step_match(view_height, true)
    }

    /// Step back to the previous match (wrapping) and scroll it into view
    pub fn find_previous(&mut self, view_height: usize) -> Option<usize> {
        self.step_match(view_height, false)
    }

    fn step_match(&mut self, view_height: usize, forward: bool) -> Option<usize> {
        let count = self.matches.len();
        if count == 0 {
            return None;
        }

        let current = self.view.search().match_index.filter(|&i| i < count);
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % count,
            (Some(i), false) => (i + count - 1) % count,
            (None, true) => 0,
            (None, false) => count - 1,
        };

        let line = self.matches[next];
        let cursor = self
            .buffer
            .len()
            .saturating_sub(line)
            .saturating_sub(view_height);
        self.view.set_scroll(cursor);
        self.view.update_search(|s| s.match_index = Some(next));
        Some(line)
    }

    /// Buffer indices of lines matching the current needle
    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    /// Drop every entry and anything still staged
    pub fn clear(&mut self) {
        self.pending.clear();
        self.buffer.clear();
        self.matches.clear();
        self.view.set_scroll(0);
        self.publish_match_count();
        self.generation += 1;
        self.view.publish_history_len(0);
    }

    fn publish_match_count(&self) {
        let count = self.matches.len();
        self.view.update_search(|s| {
            s.match_count = count;
            if s.match_index.is_some_and(|i| i >= count) {
                s.match_index = None;
            }
        });
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LogEntry> {
        self.buffer.get(index)
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Changes whenever the buffer contents change
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Staging area shared by producer threads.
///
/// Producers only ever take this lock, never the history lock, so a log
/// event raised while a frame is being drawn cannot deadlock. The render
/// loop moves the staged text into the history at the start of each frame.
#[derive(Debug, Default)]
pub struct OutputInbox {
    staged: Mutex<String>,
}

impl OutputInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, text: &str) {
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }

    /// Take everything staged so far
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.staged.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Move staged text into `history`
    pub fn drain_into(&self, history: &mut HistoryStore) {
        let staged = self.take();
        if !staged.is_empty() {
            history.append_raw(&staged);
        }
    }
}
