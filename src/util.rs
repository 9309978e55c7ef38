//! Shared text utilities

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of a string in terminal cells.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate a string to at most `max_cells` terminal cells.
///
/// Cuts on character boundaries; a wide character that would straddle the
/// limit is dropped entirely.
///
/// ```
/// use headsup::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("hello world", 5), "hello");
/// assert_eq!(truncate_to_width("日本語", 3), "日");
/// ```
pub fn truncate_to_width(s: &str, max_cells: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in s.char_indices() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > max_cells {
            return &s[..idx];
        }
        used += w;
    }
    s
}

/// Pad with spaces (or truncate) so the result is exactly `cells` wide.
pub fn fit_to_width(s: &str, cells: usize) -> String {
    let cut = truncate_to_width(s, cells);
    let mut out = String::with_capacity(cells);
    out.push_str(cut);
    out.extend(std::iter::repeat(' ').take(cells.saturating_sub(display_width(cut))));
    out
}
