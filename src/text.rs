//! Colored text composition
//!
//! A `TextBlock` is an ordered list of colored fragments with explicit line
//! breaks. `interlace` zips two blocks side by side into a two-column block,
//! which is how label/value panels and the help screen are built.

use crate::util::{display_width, truncate_to_width};
use crossterm::style::Color;

/// A run of text sharing one color pair.
///
/// A fragment whose text is exactly `"\n"` is a line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
}

impl Fragment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fg: None,
            bg: None,
        }
    }

    fn line_break() -> Self {
        Self::plain("\n")
    }

    pub fn is_line_break(&self) -> bool {
        self.text == "\n"
    }
}

/// Ordered sequence of colored fragments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBlock {
    fragments: Vec<Fragment>,
}

impl TextBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append uncolored text. Embedded newlines become line breaks.
    pub fn push(&mut self, text: &str) -> &mut Self {
        self.push_colored(text, None, None)
    }

    /// Append text with optional colors. Embedded newlines become line breaks.
    pub fn push_colored(&mut self, text: &str, fg: Option<Color>, bg: Option<Color>) -> &mut Self {
        let mut parts = text.split('\n').peekable();
        while let Some(part) = parts.next() {
            if !part.is_empty() {
                self.fragments.push(Fragment {
                    text: part.to_string(),
                    fg,
                    bg,
                });
            }
            if parts.peek().is_some() {
                self.fragments.push(Fragment::line_break());
            }
        }
        self
    }

    pub fn line_break(&mut self) -> &mut Self {
        self.fragments.push(Fragment::line_break());
        self
    }

    /// Append text followed by a line break
    pub fn line(&mut self, text: &str) -> &mut Self {
        self.push(text).line_break()
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Fragments grouped per line, line breaks removed.
    ///
    /// A trailing line break terminates the last line rather than opening an
    /// empty one.
    pub fn lines(&self) -> Vec<Vec<Fragment>> {
        let mut lines = Vec::new();
        let mut current = Vec::new();
        let mut open = false;
        for fragment in &self.fragments {
            if fragment.is_line_break() {
                lines.push(std::mem::take(&mut current));
                open = false;
            } else {
                current.push(fragment.clone());
                open = true;
            }
        }
        if open {
            lines.push(current);
        }
        lines
    }

    /// Plain text of every line
    pub fn line_texts(&self) -> Vec<String> {
        self.lines()
            .iter()
            .map(|line| line.iter().map(|f| f.text.as_str()).collect())
            .collect()
    }

    pub fn line_count(&self) -> usize {
        self.lines().len()
    }

    /// Widest line in cells
    pub fn width(&self) -> usize {
        self.line_texts()
            .iter()
            .map(|l| display_width(l))
            .max()
            .unwrap_or(0)
    }
}

impl From<&str> for TextBlock {
    fn from(text: &str) -> Self {
        let mut block = TextBlock::new();
        block.push(text);
        block
    }
}

/// Merge two blocks line by line into two columns.
///
/// Each left line is padded or cut to `fixed_width` cells (0 leaves it
/// untouched), followed by `spacing` blank cells and the matching right
/// line. When `right` runs out first the row just ends; leftover right
/// lines are indented by `fixed_width + spacing`.
pub fn interlace(left: &TextBlock, right: &TextBlock, spacing: usize, fixed_width: usize) -> TextBlock {
    let mut out = TextBlock::new();
    let mut right_lines = right.lines().into_iter();

    for left_line in left.lines() {
        let used = push_fitted(&mut out, left_line, fixed_width);

        if let Some(right_line) = right_lines.next() {
            if fixed_width > 0 && used < fixed_width {
                out.fragments
                    .push(Fragment::plain(" ".repeat(fixed_width - used)));
            }
            if spacing > 0 {
                out.fragments.push(Fragment::plain(" ".repeat(spacing)));
            }
            out.fragments.extend(right_line);
        }
        out.line_break();
    }

    let indent = fixed_width + spacing;
    for right_line in right_lines {
        if indent > 0 {
            out.fragments.push(Fragment::plain(" ".repeat(indent)));
        }
        out.fragments.extend(right_line);
        out.line_break();
    }

    out
}

/// Append a line's fragments, cut at `limit` cells when `limit > 0`.
/// Returns the width written.
fn push_fitted(out: &mut TextBlock, line: Vec<Fragment>, limit: usize) -> usize {
    let mut used = 0;
    for fragment in line {
        if limit == 0 {
            used += display_width(&fragment.text);
            out.fragments.push(fragment);
            continue;
        }
        let room = limit.saturating_sub(used);
        if room == 0 {
            break;
        }
        let cut = truncate_to_width(&fragment.text, room);
        if cut.is_empty() {
            break;
        }
        used += display_width(cut);
        out.fragments.push(Fragment {
            text: cut.to_string(),
            ..fragment
        });
    }
    used
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(lines: &[&str]) -> TextBlock {
        let mut b = TextBlock::new();
        for line in lines {
            b.line(line);
        }
        b
    }

    #[test]
    fn test_push_splits_newlines() {
        let b = TextBlock::from("one\ntwo\n\nfour");
        assert_eq!(b.line_texts(), vec!["one", "two", "", "four"]);
        assert_eq!(b.width(), 4);
    }

    #[test]
    fn test_interlace_equal_lines_concatenates() {
        let a = block(&["ab", "c", "def"]);
        let b = block(&["1", "22", "333"]);

        let merged = interlace(&a, &b, 0, 0);
        assert_eq!(merged.line_count(), a.line_count());
        assert_eq!(merged.line_texts(), vec!["ab1", "c22", "def333"]);
    }

    #[test]
    fn test_interlace_fixed_width_and_spacing() {
        let a = block(&["key", "a-very-long-key"]);
        let b = block(&["v1", "v2"]);

        let merged = interlace(&a, &b, 2, 6);
        assert_eq!(merged.line_texts(), vec!["key     v1", "a-very  v2"]);
    }

    #[test]
    fn test_interlace_right_shorter_ends_row() {
        let a = block(&["a", "b", "c"]);
        let b = block(&["1"]);

        let merged = interlace(&a, &b, 1, 2);
        assert_eq!(merged.line_texts(), vec!["a  1", "b", "c"]);
    }

    #[test]
    fn test_interlace_right_longer_is_indented() {
        let a = block(&["a"]);
        let b = block(&["1", "2", "3"]);

        let merged = interlace(&a, &b, 1, 3);
        assert_eq!(merged.line_texts(), vec!["a   1", "    2", "    3"]);
    }

    #[test]
    fn test_interlace_keeps_colors() {
        let mut a = TextBlock::new();
        a.push_colored("F1", Some(Color::Yellow), None).line_break();
        let mut b = TextBlock::new();
        b.push_colored("help", Some(Color::Cyan), Some(Color::Black))
            .line_break();

        let merged = interlace(&a, &b, 1, 0);
        let line = &merged.lines()[0];
        assert_eq!(line[0].fg, Some(Color::Yellow));
        assert_eq!(line.last().unwrap().fg, Some(Color::Cyan));
        assert_eq!(line.last().unwrap().bg, Some(Color::Black));
    }
}
