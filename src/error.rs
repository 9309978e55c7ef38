//! Engine error types
//!
//! Configuration mistakes surface synchronously at the offending call.
//! Palette exhaustion is recoverable by the caller. An unusable terminal
//! never becomes an error for the host: the engine goes inert instead.

use crossterm::style::Color;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("component already registered: {0}")]
    DuplicateComponent(String),

    #[error("component not registered: {0}")]
    UnknownComponent(String),

    #[error("row already declared: {0}")]
    DuplicateRow(String),

    #[error("row not declared: {0}")]
    UnknownRow(String),

    #[error("palette exceeded: {color:?} would be colour {} of {limit}", .limit + 1)]
    PaletteExceeded { color: Color, limit: usize },

    #[error("terminal unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Errors caused by how the dashboard was declared (names, rows, components)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateComponent(_)
                | Self::UnknownComponent(_)
                | Self::DuplicateRow(_)
                | Self::UnknownRow(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_taxonomy() {
        assert!(EngineError::DuplicateComponent("clock".into()).is_configuration());
        assert!(EngineError::UnknownRow("Header".into()).is_configuration());
        assert!(!EngineError::EnvironmentUnavailable("redirected".into()).is_configuration());
        assert!(!EngineError::PaletteExceeded {
            color: Color::Red,
            limit: 16
        }
        .is_configuration());
    }

    #[test]
    fn test_palette_message_names_the_limit() {
        let err = EngineError::PaletteExceeded {
            color: Color::Rgb { r: 1, g: 2, b: 3 },
            limit: 16,
        };
        assert!(err.to_string().contains("17 of 16"));
    }
}
