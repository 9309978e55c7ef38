//! Per-frame color budget
//!
//! The backend exposes a limited number of simultaneous color registers. The
//! budget tracks which distinct colors the current frame has put on screen
//! and refuses a new one once the ceiling is reached. The limit is enforced
//! the same way whatever the real color depth of the terminal is.

use crate::error::{EngineError, EngineResult};
use crate::surface::Surface;
use crossterm::style::Color;

/// Distinct colors allowed per frame
pub const MAX_COLORS: usize = 16;

/// Tracks the distinct colors allocated during one frame
///
/// Owned by the render loop and reset exactly once per frame before any
/// drawing. The terminal default (`Color::Reset`) is always available and is
/// never counted.
#[derive(Debug, Clone)]
pub struct ColorBudget {
    tracked: Vec<Color>,
    limit: usize,
}

impl ColorBudget {
    pub fn new() -> Self {
        Self::with_limit(MAX_COLORS)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            tracked: Vec::with_capacity(limit),
            limit,
        }
    }

    /// Reserve `color` for this frame.
    ///
    /// Re-allocating a tracked color always succeeds.
    pub fn allocate(&mut self, color: Color) -> EngineResult<()> {
        if color == Color::Reset || self.tracked.contains(&color) {
            return Ok(());
        }
        if self.tracked.len() >= self.limit {
            return Err(EngineError::PaletteExceeded {
                color,
                limit: self.limit,
            });
        }
        self.tracked.push(color);
        Ok(())
    }

    pub fn set_foreground(&mut self, surface: &mut dyn Surface, color: Color) -> EngineResult<()> {
        self.allocate(color)?;
        surface.set_foreground(color)?;
        Ok(())
    }

    pub fn set_background(&mut self, surface: &mut dyn Surface, color: Color) -> EngineResult<()> {
        self.allocate(color)?;
        surface.set_background(color)?;
        Ok(())
    }

    /// Like `set_foreground`, but falls back to the terminal default instead
    /// of failing. Used inside a frame, where an error must not escape.
    pub fn apply_foreground(&mut self, surface: &mut dyn Surface, color: Color) -> EngineResult<()> {
        match self.set_foreground(surface, color) {
            Err(EngineError::PaletteExceeded { color, .. }) => {
                tracing::debug!("Palette full, {:?} drawn in default foreground", color);
                surface.set_foreground(Color::Reset)?;
                Ok(())
            }
            other => other,
        }
    }

    /// Background counterpart of `apply_foreground`
    pub fn apply_background(&mut self, surface: &mut dyn Surface, color: Color) -> EngineResult<()> {
        match self.set_background(surface, color) {
            Err(EngineError::PaletteExceeded { color, .. }) => {
                tracing::debug!("Palette full, {:?} drawn on default background", color);
                surface.set_background(Color::Reset)?;
                Ok(())
            }
            other => other,
        }
    }

    /// Forget every tracked color (start of a new frame)
    pub fn reset(&mut self) {
        self.tracked.clear();
    }

    /// Number of distinct colors in use this frame
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for ColorBudget {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    fn grey(level: u8) -> Color {
        Color::Rgb {
            r: level,
            g: level,
            b: level,
        }
    }

    #[test]
    fn test_sixteen_distinct_colors_fit() {
        let mut budget = ColorBudget::new();
        for i in 0..16 {
            assert!(budget.allocate(grey(i)).is_ok());
        }
        assert_eq!(budget.len(), 16);
    }

    #[test]
    fn test_seventeenth_distinct_color_fails() {
        let mut budget = ColorBudget::new();
        for i in 0..16 {
            budget.allocate(grey(i)).unwrap();
        }
        let err = budget.allocate(grey(200)).unwrap_err();
        assert!(matches!(err, EngineError::PaletteExceeded { limit: 16, .. }));

        // Already-tracked colors and the terminal default are still fine
        assert!(budget.allocate(grey(3)).is_ok());
        assert!(budget.allocate(Color::Reset).is_ok());
    }

    #[test]
    fn test_reset_frees_the_budget() {
        let mut budget = ColorBudget::new();
        for i in 0..16 {
            budget.allocate(grey(i)).unwrap();
        }
        budget.reset();
        assert!(budget.is_empty());
        for i in 0..16 {
            assert!(budget.allocate(grey(i)).is_ok());
        }
    }

    #[test]
    fn test_set_foreground_writes_through() {
        let mut surface = MemorySurface::new(10, 2);
        let mut budget = ColorBudget::with_limit(1);

        budget.set_foreground(&mut surface, Color::Red).unwrap();
        surface.write("x").unwrap();
        assert_eq!(surface.handle().cell(0, 0).fg, Color::Red);

        assert!(budget.set_foreground(&mut surface, Color::Blue).is_err());
    }

    #[test]
    fn test_apply_falls_back_to_default() {
        let mut surface = MemorySurface::new(10, 2);
        let mut budget = ColorBudget::with_limit(1);

        budget.apply_foreground(&mut surface, Color::Red).unwrap();
        budget.apply_foreground(&mut surface, Color::Blue).unwrap();
        surface.write("x").unwrap();
        assert_eq!(surface.handle().cell(0, 0).fg, Color::Reset);
    }
}
