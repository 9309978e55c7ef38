// Help screen and window frame overlays
//
// Both are drawn with box-drawing characters in the theme's frame color.
// Neither touches the bottom-right cell of the terminal.

use crate::error::EngineResult;
use crate::input::help_entries;
use crate::surface::Surface;
use crate::text::{interlace, TextBlock};
use crate::theme::{ColorBudget, Theme};
use crate::util::{display_width, truncate_to_width};
use crossterm::style::Color;

const TOP_LEFT: char = '┌';
const TOP_RIGHT: char = '┐';
const BOTTOM_LEFT: char = '└';
const BOTTOM_RIGHT: char = '┘';
const HORIZONTAL: char = '─';
const VERTICAL: char = '│';

/// Default help text: built-in keys beside their descriptions, followed by
/// any caller-supplied text
pub fn help_block(quit_key: char, extra: &TextBlock, key_color: Color) -> TextBlock {
    let entries = help_entries(quit_key);
    let key_width = entries
        .iter()
        .map(|(k, _)| display_width(k))
        .max()
        .unwrap_or(0);

    let mut keys = TextBlock::new();
    let mut descriptions = TextBlock::new();
    for (key, description) in &entries {
        keys.push_colored(key, Some(key_color), None).line_break();
        descriptions.line(description);
    }

    let mut block = interlace(&keys, &descriptions, 2, key_width);
    if !extra.is_empty() {
        block.line_break();
        for fragment in extra.fragments() {
            block.push_colored(&fragment.text, fragment.fg, fragment.bg);
        }
    }
    block
}

/// Horizontal border line, `width` cells including corners
fn border(left: char, right: char, width: usize, title: &str) -> String {
    let inner = width.saturating_sub(2);
    let title = truncate_to_width(title, inner);
    let mut line = String::with_capacity(width * 3);
    line.push(left);
    line.push_str(title);
    line.extend(std::iter::repeat(HORIZONTAL).take(inner - display_width(title)));
    line.push(right);
    line
}

/// Title as drawn into a border: ` Title `
fn decorate(title: &str) -> String {
    if title.is_empty() {
        String::new()
    } else {
        format!("{HORIZONTAL} {title} ")
    }
}

/// Draw `block` in a centred box. Returns the box origin and size.
pub fn draw_help(
    surface: &mut dyn Surface,
    budget: &mut ColorBudget,
    theme: &Theme,
    block: &TextBlock,
) -> EngineResult<(u16, u16, u16, u16)> {
    let (width, height) = surface.size();
    let lines = block.lines();

    // Leave one line free at the bottom so the box never touches the corner
    let max_w = (width as usize).saturating_sub(2);
    let max_h = (height as usize).saturating_sub(1);
    let box_w = (block.width() + 4).min(max_w).max(4);
    let box_h = (lines.len() + 2).min(max_h).max(2);
    let x0 = ((width as usize).saturating_sub(box_w) / 2) as u16;
    let y0 = ((height as usize).saturating_sub(box_h) / 2) as u16;
    let inner = box_w - 4;

    budget.apply_foreground(surface, theme.frame)?;
    budget.apply_background(surface, theme.background)?;
    surface.set_cursor(x0, y0)?;
    surface.write(&border(TOP_LEFT, TOP_RIGHT, box_w, &decorate("Help")))?;

    for row in 0..box_h.saturating_sub(2) {
        let y = y0 + 1 + row as u16;
        budget.apply_foreground(surface, theme.frame)?;
        surface.set_cursor(x0, y)?;
        surface.write(&format!("{VERTICAL} {} {VERTICAL}", " ".repeat(inner)))?;

        let Some(line) = lines.get(row) else {
            continue;
        };
        surface.set_cursor(x0 + 2, y)?;
        let mut used = 0;
        for fragment in line {
            let room = inner.saturating_sub(used);
            if room == 0 {
                break;
            }
            let text = truncate_to_width(&fragment.text, room);
            budget.apply_foreground(surface, fragment.fg.unwrap_or(theme.foreground))?;
            budget.apply_background(surface, fragment.bg.unwrap_or(theme.background))?;
            surface.write(text)?;
            used += display_width(text);
        }
    }

    budget.apply_foreground(surface, theme.frame)?;
    budget.apply_background(surface, theme.background)?;
    surface.set_cursor(x0, y0 + box_h as u16 - 1)?;
    surface.write(&border(BOTTOM_LEFT, BOTTOM_RIGHT, box_w, ""))?;
    surface.reset_colors()?;

    Ok((x0, y0, box_w as u16, box_h as u16))
}

/// Border around the whole screen with an optional title in the top edge
pub fn draw_frame(
    surface: &mut dyn Surface,
    budget: &mut ColorBudget,
    theme: &Theme,
    title: &str,
) -> EngineResult<()> {
    let (width, height) = surface.size();
    if width < 2 || height < 2 {
        return Ok(());
    }
    let w = width as usize;

    budget.apply_foreground(surface, theme.frame)?;
    budget.apply_background(surface, theme.background)?;

    surface.set_cursor(0, 0)?;
    surface.write(&border(TOP_LEFT, TOP_RIGHT, w, &decorate(title)))?;

    for y in 1..height - 1 {
        surface.set_cursor(0, y)?;
        surface.write(&VERTICAL.to_string())?;
        surface.set_cursor(width - 1, y)?;
        surface.write(&VERTICAL.to_string())?;
    }

    // Bottom edge stops one short of the corner cell
    let mut bottom = String::with_capacity(w * 3);
    bottom.push(BOTTOM_LEFT);
    bottom.extend(std::iter::repeat(HORIZONTAL).take(w.saturating_sub(2)));
    surface.set_cursor(0, height - 1)?;
    surface.write(&bottom)?;

    surface.reset_colors()?;
    Ok(())
}
