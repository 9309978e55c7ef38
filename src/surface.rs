//! Terminal surface
//!
//! The thin capability the engine draws through: cursor positioning, raw
//! text output, colors and sizing. `CrosstermSurface` drives the real
//! terminal; `MemorySurface` is an in-memory grid used by tests and headless
//! embedders.

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{DisableMouseCapture, EnableMouseCapture},
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use std::io::{self, BufWriter, IsTerminal, Stdout, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use unicode_width::UnicodeWidthChar;

/// Drawing capability the render loop writes through
pub trait Surface: Send {
    /// Current size in cells (width, height)
    fn size(&self) -> (u16, u16);

    fn set_cursor(&mut self, x: u16, y: u16) -> io::Result<()>;

    /// Where the next `write` lands
    fn cursor_position(&self) -> (u16, u16);

    /// Write text at the cursor, advancing it. No wrapping.
    fn write(&mut self, text: &str) -> io::Result<()>;

    fn set_foreground(&mut self, color: Color) -> io::Result<()>;

    fn set_background(&mut self, color: Color) -> io::Result<()>;

    /// Back to the terminal's default colors
    fn reset_colors(&mut self) -> io::Result<()>;

    /// Blank the whole screen
    fn clear(&mut self) -> io::Result<()>;

    /// Push queued output to the device
    fn flush(&mut self) -> io::Result<()>;

    /// True when stdout is not an interactive terminal
    fn is_output_redirected(&self) -> bool;

    /// Take over the terminal (raw mode, hidden cursor, mouse capture)
    fn enter(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Hand the terminal back
    fn leave(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Crossterm
// ═══════════════════════════════════════════════════════════════════════════

/// Surface backed by the process's stdout
pub struct CrosstermSurface {
    out: BufWriter<Stdout>,
    cursor: (u16, u16),
    entered: bool,
}

impl CrosstermSurface {
    pub fn new() -> Self {
        Self {
            out: BufWriter::new(io::stdout()),
            cursor: (0, 0),
            entered: false,
        }
    }
}

impl Default for CrosstermSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for CrosstermSurface {
    fn size(&self) -> (u16, u16) {
        terminal::size().unwrap_or((80, 24))
    }

    fn set_cursor(&mut self, x: u16, y: u16) -> io::Result<()> {
        queue!(self.out, MoveTo(x, y))?;
        self.cursor = (x, y);
        Ok(())
    }

    fn cursor_position(&self) -> (u16, u16) {
        self.cursor
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        queue!(self.out, Print(text))?;
        let advance = crate::util::display_width(text).min(u16::MAX as usize) as u16;
        self.cursor.0 = self.cursor.0.saturating_add(advance);
        Ok(())
    }

    fn set_foreground(&mut self, color: Color) -> io::Result<()> {
        queue!(self.out, SetForegroundColor(color))
    }

    fn set_background(&mut self, color: Color) -> io::Result<()> {
        queue!(self.out, SetBackgroundColor(color))
    }

    fn reset_colors(&mut self) -> io::Result<()> {
        queue!(self.out, ResetColor)
    }

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn is_output_redirected(&self) -> bool {
        !io::stdout().is_terminal()
    }

    fn enter(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        queue!(self.out, Hide, EnableMouseCapture, Clear(ClearType::All))?;
        self.entered = true;
        self.out.flush()
    }

    fn leave(&mut self) -> io::Result<()> {
        if !self.entered {
            return Ok(());
        }
        self.entered = false;
        let (_, height) = self.size();
        queue!(
            self.out,
            ResetColor,
            DisableMouseCapture,
            MoveTo(0, height.saturating_sub(1)),
            Print("\r\n"),
            Show
        )?;
        self.out.flush()?;
        disable_raw_mode()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// In-memory
// ═══════════════════════════════════════════════════════════════════════════

/// One grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::Reset,
            bg: Color::Reset,
        }
    }
}

/// Marks the trailing half of a double-width character
const CONTINUATION: char = '\0';

#[derive(Debug)]
struct Grid {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
    cursor: (u16, u16),
    fg: Color,
    bg: Color,
    writes: usize,
    redirected: bool,
}

impl Grid {
    fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
            cursor: (0, 0),
            fg: Color::Reset,
            bg: Color::Reset,
            writes: 0,
            redirected: false,
        }
    }

    fn put(&mut self, ch: char) {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0) as u16;
        if w == 0 {
            return;
        }
        let (x, y) = self.cursor;
        if y < self.height && x.saturating_add(w) <= self.width {
            let idx = y as usize * self.width as usize + x as usize;
            self.cells[idx] = Cell {
                ch,
                fg: self.fg,
                bg: self.bg,
            };
            if w == 2 {
                self.cells[idx + 1] = Cell {
                    ch: CONTINUATION,
                    fg: self.fg,
                    bg: self.bg,
                };
            }
        }
        self.cursor.0 = x.saturating_add(w);
    }
}

/// Surface that draws into an in-memory grid
///
/// Clone the `MemoryHandle` before handing the surface to a dashboard to
/// inspect what was drawn.
pub struct MemorySurface {
    grid: Arc<Mutex<Grid>>,
}

impl MemorySurface {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            grid: Arc::new(Mutex::new(Grid::new(width, height))),
        }
    }

    /// Inspection handle sharing this surface's grid
    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            grid: self.grid.clone(),
        }
    }

    fn grid(&self) -> MutexGuard<'_, Grid> {
        self.grid.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Surface for MemorySurface {
    fn size(&self) -> (u16, u16) {
        let grid = self.grid();
        (grid.width, grid.height)
    }

    fn set_cursor(&mut self, x: u16, y: u16) -> io::Result<()> {
        self.grid().cursor = (x, y);
        Ok(())
    }

    fn cursor_position(&self) -> (u16, u16) {
        self.grid().cursor
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        let mut grid = self.grid();
        grid.writes += 1;
        for ch in text.chars() {
            grid.put(ch);
        }
        Ok(())
    }

    fn set_foreground(&mut self, color: Color) -> io::Result<()> {
        self.grid().fg = color;
        Ok(())
    }

    fn set_background(&mut self, color: Color) -> io::Result<()> {
        self.grid().bg = color;
        Ok(())
    }

    fn reset_colors(&mut self) -> io::Result<()> {
        let mut grid = self.grid();
        grid.fg = Color::Reset;
        grid.bg = Color::Reset;
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        let mut grid = self.grid();
        grid.cells.fill(Cell::default());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_output_redirected(&self) -> bool {
        self.grid().redirected
    }
}

/// Read access to a `MemorySurface` grid
#[derive(Clone)]
pub struct MemoryHandle {
    grid: Arc<Mutex<Grid>>,
}

impl MemoryHandle {
    fn grid(&self) -> MutexGuard<'_, Grid> {
        self.grid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cell at (x, y); default cell when out of range
    pub fn cell(&self, x: u16, y: u16) -> Cell {
        let grid = self.grid();
        if x >= grid.width || y >= grid.height {
            return Cell::default();
        }
        grid.cells[y as usize * grid.width as usize + x as usize]
    }

    /// Text of row `y`, trailing spaces included
    pub fn line(&self, y: u16) -> String {
        let grid = self.grid();
        if y >= grid.height {
            return String::new();
        }
        let start = y as usize * grid.width as usize;
        grid.cells[start..start + grid.width as usize]
            .iter()
            .map(|c| c.ch)
            .filter(|&ch| ch != CONTINUATION)
            .collect()
    }

    /// All rows joined with newlines, trailing spaces trimmed
    pub fn text(&self) -> String {
        let height = self.grid().height;
        (0..height)
            .map(|y| self.line(y).trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of `write` calls received so far
    pub fn write_count(&self) -> usize {
        self.grid().writes
    }

    /// Change the grid size (contents are blanked)
    pub fn resize(&self, width: u16, height: u16) {
        let mut grid = self.grid();
        let redirected = grid.redirected;
        let writes = grid.writes;
        *grid = Grid::new(width, height);
        grid.redirected = redirected;
        grid.writes = writes;
    }

    /// Pretend stdout is not a terminal
    pub fn set_redirected(&self, redirected: bool) {
        self.grid().redirected = redirected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_write_and_clip() {
        let mut surface = MemorySurface::new(5, 2);
        let handle = surface.handle();

        surface.set_cursor(3, 1).unwrap();
        surface.write("abcdef").unwrap();

        assert_eq!(handle.line(1), "   ab");
        assert_eq!(surface.cursor_position(), (9, 1));
        assert_eq!(handle.write_count(), 1);
    }

    #[test]
    fn test_memory_colors_stick_to_cells() {
        let mut surface = MemorySurface::new(4, 1);
        let handle = surface.handle();

        surface.set_foreground(Color::Green).unwrap();
        surface.write("a").unwrap();
        surface.reset_colors().unwrap();
        surface.write("b").unwrap();

        assert_eq!(handle.cell(0, 0).fg, Color::Green);
        assert_eq!(handle.cell(1, 0).fg, Color::Reset);
    }

    #[test]
    fn test_memory_wide_chars_take_two_cells() {
        let mut surface = MemorySurface::new(6, 1);
        let handle = surface.handle();

        surface.write("日x").unwrap();
        assert_eq!(handle.line(0), "日x   ");
        assert_eq!(surface.cursor_position(), (3, 0));
    }

    #[test]
    fn test_memory_resize_blanks() {
        let mut surface = MemorySurface::new(4, 1);
        let handle = surface.handle();
        surface.write("abcd").unwrap();

        handle.resize(2, 2);
        assert_eq!(surface.size(), (2, 2));
        assert_eq!(handle.text(), "\n");
    }
}
