// Theme and palette handling
//
// Colors are configured as strings and resolved once into crossterm colors:
// - Hex format: #RRGGBB
// - ANSI format: ansi:0-15, ansi:fg, ansi:bg
// - ANSI names: red, dark_blue, grey, ...
//
// The ColorBudget (budget.rs) caps how many distinct colors a single frame
// may put on the backend.

mod budget;

pub use budget::{ColorBudget, MAX_COLORS};

use crate::config::Config;
use crossterm::style::Color;

/// The 16 ANSI colors in index order (0-15)
const ANSI: [Color; 16] = [
    Color::Black,
    Color::DarkRed,
    Color::DarkGreen,
    Color::DarkYellow,
    Color::DarkBlue,
    Color::DarkMagenta,
    Color::DarkCyan,
    Color::Grey,
    Color::DarkGrey,
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::White,
];

/// Approximate RGB values for the ANSI colors (xterm defaults)
const ANSI_RGB: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (205, 0, 0),
    (0, 205, 0),
    (205, 205, 0),
    (0, 0, 238),
    (205, 0, 205),
    (0, 205, 205),
    (229, 229, 229),
    (127, 127, 127),
    (255, 0, 0),
    (0, 255, 0),
    (255, 255, 0),
    (92, 92, 255),
    (255, 0, 255),
    (0, 255, 255),
    (255, 255, 255),
];

/// Parse a configured color string.
///
/// Returns `None` for strings that are not a color; callers decide the
/// fallback. `ansi:fg` / `ansi:bg` resolve to the terminal default.
pub fn parse_color(value: &str) -> Option<Color> {
    let value = value.trim();

    if let Some(ansi) = value.strip_prefix("ansi:") {
        return match ansi {
            "fg" | "bg" => Some(Color::Reset),
            n => n.parse::<usize>().ok().and_then(|i| ANSI.get(i).copied()),
        };
    }

    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        return Some(Color::Rgb { r, g, b });
    }

    let color = match value.to_lowercase().replace(|c: char| c == '-' || c == ' ', "_").as_str() {
        "reset" | "default" => Color::Reset,
        "black" => Color::Black,
        "dark_red" => Color::DarkRed,
        "dark_green" => Color::DarkGreen,
        "dark_yellow" => Color::DarkYellow,
        "dark_blue" => Color::DarkBlue,
        "dark_magenta" => Color::DarkMagenta,
        "dark_cyan" => Color::DarkCyan,
        "grey" | "gray" => Color::Grey,
        "dark_grey" | "dark_gray" => Color::DarkGrey,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        _ => return None,
    };
    Some(color)
}

/// Format a color back into the config string form (inverse of `parse_color`)
pub fn color_to_string(color: Color) -> String {
    match color {
        Color::Reset => "default".to_string(),
        Color::Rgb { r, g, b } => format!("#{:02x}{:02x}{:02x}", r, g, b),
        Color::AnsiValue(n) => format!("ansi:{}", n),
        named => match ANSI.iter().position(|c| *c == named) {
            Some(idx) => format!("ansi:{}", idx),
            None => "default".to_string(),
        },
    }
}

/// RGB approximation of a color, `None` for the terminal default
pub fn to_rgb(color: Color) -> Option<(u8, u8, u8)> {
    match color {
        Color::Reset => None,
        Color::Rgb { r, g, b } => Some((r, g, b)),
        Color::AnsiValue(n) if (n as usize) < ANSI_RGB.len() => Some(ANSI_RGB[n as usize]),
        Color::AnsiValue(_) => None,
        named => ANSI
            .iter()
            .position(|c| *c == named)
            .map(|idx| ANSI_RGB[idx]),
    }
}

/// Darken `base` by `distance * step` on every channel, floored at 0.
///
/// Distance 0 returns the base color unchanged (as RGB). The terminal default
/// has no channels to darken and is returned as-is.
pub fn fade(base: Color, distance: usize, step: u8) -> Color {
    let Some((r, g, b)) = to_rgb(base) else {
        return base;
    };
    let amount = (distance.saturating_mul(step as usize)).min(u8::MAX as usize) as u8;
    Color::Rgb {
        r: r.saturating_sub(amount),
        g: g.saturating_sub(amount),
        b: b.saturating_sub(amount),
    }
}

/// Resolved colors used by the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    /// History text and default row foreground
    pub foreground: Color,
    /// Default background
    pub background: Color,
    /// Newest history lines start from this color and fade toward older ones
    pub highlight: Color,
    /// Window frame and help border
    pub frame: Color,
}

impl Theme {
    /// Resolve configured color strings, falling back to terminal defaults
    pub fn from_config(config: &Config) -> Self {
        let resolve = |value: &str, fallback: Color| {
            parse_color(value).unwrap_or_else(|| {
                tracing::warn!("Unknown color {:?}, using {:?}", value, fallback);
                fallback
            })
        };

        Self {
            foreground: resolve(&config.colors.foreground, Color::Reset),
            background: resolve(&config.colors.background, Color::Reset),
            highlight: resolve(&config.colors.highlight, Color::White),
            frame: resolve(&config.colors.frame, Color::DarkGrey),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            foreground: Color::Reset,
            background: Color::Reset,
            highlight: Color::White,
            frame: Color::DarkGrey,
        }
    }
}
