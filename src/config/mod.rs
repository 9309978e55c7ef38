//! Dashboard configuration
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/headsup/config.toml)
//! 3. Built-in defaults (lowest priority)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

mod logging;


pub use logging::{FileLogging, LogRotation, LoggingConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Separates a line's plain part from its verbatim remainder
pub const DEFAULT_RAW_MARKER: &str = "\u{1b}[raw]";

// ─────────────────────────────────────────────────────────────────────────────
// Colors
// ─────────────────────────────────────────────────────────────────────────────

/// Color strings as configured (see `theme::parse_color` for the syntax)
#[derive(Debug, Clone, PartialEq)]
pub struct ColorsConfig {
    pub foreground: String,
    pub background: String,
    /// Start color of the fade on the newest history lines
    pub highlight: String,
    pub frame: String,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            foreground: "default".to_string(),
            background: "default".to_string(),
            highlight: "#ffffff".to_string(),
            frame: "dark_grey".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileColors {
    pub foreground: Option<String>,
    pub background: Option<String>,
    pub highlight: Option<String>,
    pub frame: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Render loop period
    pub redraw_interval_ms: u64,

    /// Component tick period
    pub tick_interval_ms: u64,

    /// Input polling period
    pub input_poll_ms: u64,

    /// Scrollback capacity; oldest lines are evicted past this
    pub max_history_lines: usize,

    /// Number of newest history lines drawn with the fade
    pub fade_lines: usize,

    /// Per-line darkening of the fade, per color channel
    pub fade_step: u8,

    /// Blank cells between items on the same side of a row
    pub item_spacing: usize,

    /// Apply the built-in navigation/search/help/quit keys
    pub builtin_keys: bool,

    /// Key that shuts the dashboard down (Ctrl+C always does)
    pub quit_key: char,

    /// Prefix history lines with `[ClassName] `
    pub show_class_prefix: bool,

    /// Lines containing this marker are shown verbatim after it
    pub raw_marker: String,

    /// Draw a border around the whole screen
    pub window_frame: bool,

    /// Title drawn into the top border when the frame is on
    pub frame_title: String,

    /// Last line written on close
    pub shutdown_message: String,

    /// How long `close` waits for each worker
    pub join_timeout_ms: u64,

    /// How long `flush` waits for a frame
    pub flush_timeout_ms: u64,

    pub colors: ColorsConfig,

    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redraw_interval_ms: 100,
            tick_interval_ms: 100,
            input_poll_ms: 1,
            max_history_lines: 10_000,
            fade_lines: 6,
            fade_step: 24,
            item_spacing: 2,
            builtin_keys: true,
            quit_key: 'q',
            show_class_prefix: true,
            raw_marker: DEFAULT_RAW_MARKER.to_string(),
            window_frame: false,
            frame_title: String::new(),
            shutdown_message: "Shutting down...".to_string(),
            join_timeout_ms: 1000,
            flush_timeout_ms: 2000,
            colors: ColorsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Config file structure; every field optional
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    redraw_interval_ms: Option<u64>,
    tick_interval_ms: Option<u64>,
    input_poll_ms: Option<u64>,
    max_history_lines: Option<usize>,
    fade_lines: Option<usize>,
    fade_step: Option<u8>,
    item_spacing: Option<usize>,
    builtin_keys: Option<bool>,
    quit_key: Option<String>,
    show_class_prefix: Option<bool>,
    raw_marker: Option<String>,
    window_frame: Option<bool>,
    frame_title: Option<String>,
    shutdown_message: Option<String>,
    join_timeout_ms: Option<u64>,
    flush_timeout_ms: Option<u64>,

    /// Optional [colors] section
    colors: Option<FileColors>,

    /// Optional [logging] section
    logging: Option<FileLogging>,
}

impl Config {
    pub fn redraw_interval(&self) -> Duration {
        Duration::from_millis(self.redraw_interval_ms.max(1))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn input_poll_interval(&self) -> Duration {
        Duration::from_millis(self.input_poll_ms.max(1))
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Get the config file path: ~/.config/headsup/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("headsup").join("config.toml"))
    }

    /// Create config file from defaults if it doesn't exist
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        // Don't overwrite existing config
        if path.exists() {
            return;
        }

        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // Silently fail - config is optional
            }
        }

        // Write defaults (ignore errors - config is optional)
        let _ = std::fs::write(&path, Config::default().to_toml());
    }

    /// Load file config if it exists
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::parse_file_config(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                FileConfig::default()
            }),
            Err(_) => FileConfig::default(), // File doesn't exist, use defaults
        }
    }

    pub fn parse_file_config(contents: &str) -> Result<FileConfig, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Serialize config to TOML string (single source of truth for format)
    pub fn to_toml(&self) -> String {
        format!(
            r#"# headsup configuration

# Render loop period (ms)
redraw_interval_ms = {redraw}

# Component tick period (ms)
tick_interval_ms = {tick}

# Input polling period (ms)
input_poll_ms = {poll}

# Scrollback capacity in lines
max_history_lines = {max_lines}

# Newest lines drawn with a fade, and the per-line darkening
fade_lines = {fade_lines}
fade_step = {fade_step}

# Blank cells between row items
item_spacing = {spacing}

# Built-in keys: Home/End/PgUp/PgDn scroll, / search, ? help
builtin_keys = {builtin}
quit_key = {quit}

# Prefix history lines with [ClassName]
show_class_prefix = {prefix}
raw_marker = {marker}

# Border around the whole screen
window_frame = {frame}
frame_title = {title}

shutdown_message = {shutdown}
join_timeout_ms = {join}
flush_timeout_ms = {flush}

# Colors: #RRGGBB, ansi:0-15, or names like dark_grey
[colors]
foreground = {fg}
background = {bg}
highlight = {hl}
frame = {frame_color}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = {log_level}
file_enabled = {file_enabled}
file_dir = {file_dir}
file_prefix = {file_prefix}
file_rotation = {file_rotation}
"#,
            redraw = self.redraw_interval_ms,
            tick = self.tick_interval_ms,
            poll = self.input_poll_ms,
            max_lines = self.max_history_lines,
            fade_lines = self.fade_lines,
            fade_step = self.fade_step,
            spacing = self.item_spacing,
            builtin = self.builtin_keys,
            quit = quote(&self.quit_key.to_string()),
            prefix = self.show_class_prefix,
            marker = quote(&self.raw_marker),
            frame = self.window_frame,
            title = quote(&self.frame_title),
            shutdown = quote(&self.shutdown_message),
            join = self.join_timeout_ms,
            flush = self.flush_timeout_ms,
            fg = quote(&self.colors.foreground),
            bg = quote(&self.colors.background),
            hl = quote(&self.colors.highlight),
            frame_color = quote(&self.colors.frame),
            log_level = quote(&self.logging.level),
            file_enabled = self.logging.file_enabled,
            file_dir = quote(&self.logging.file_dir.display().to_string()),
            file_prefix = quote(&self.logging.file_prefix),
            file_rotation = quote(self.logging.file_rotation.as_str()),
        )
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = Self::config_path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config path",
            ));
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, self.to_toml())
    }

    /// Load configuration: env vars > file > defaults
    pub fn from_env() -> Self {
        Self::resolve(Self::load_file_config(), |key| std::env::var(key).ok())
    }

    /// Merge a parsed file and an environment lookup over the defaults
    pub fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let env_parse = |key: &str| env(key).and_then(|v| v.trim().parse::<u64>().ok());
        let env_flag = |key: &str| env(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        // Redraw interval: env > file > default
        let redraw_interval_ms = env_parse("HEADSUP_REDRAW_MS")
            .or(file.redraw_interval_ms)
            .unwrap_or(defaults.redraw_interval_ms);

        let tick_interval_ms = env_parse("HEADSUP_TICK_MS")
            .or(file.tick_interval_ms)
            .unwrap_or(defaults.tick_interval_ms);

        let max_history_lines = env_parse("HEADSUP_MAX_HISTORY")
            .map(|v| v as usize)
            .or(file.max_history_lines)
            .unwrap_or(defaults.max_history_lines);

        let window_frame = env_flag("HEADSUP_FRAME")
            .or(file.window_frame)
            .unwrap_or(defaults.window_frame);

        // Built-in keys: env can only switch them off
        let builtin_keys = match env("HEADSUP_NO_KEYS") {
            Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => false,
            _ => file.builtin_keys.unwrap_or(defaults.builtin_keys),
        };

        let quit_key = file
            .quit_key
            .and_then(|k| k.chars().next())
            .unwrap_or(defaults.quit_key);

        let file_colors = file.colors.unwrap_or_default();
        let colors = ColorsConfig {
            foreground: file_colors.foreground.unwrap_or(defaults.colors.foreground),
            background: file_colors.background.unwrap_or(defaults.colors.background),
            highlight: file_colors.highlight.unwrap_or(defaults.colors.highlight),
            frame: file_colors.frame.unwrap_or(defaults.colors.frame),
        };

        let logging = LoggingConfig::resolve(file.logging.unwrap_or_default(), &env);

        Self {
            redraw_interval_ms,
            tick_interval_ms,
            input_poll_ms: file.input_poll_ms.unwrap_or(defaults.input_poll_ms),
            max_history_lines,
            fade_lines: file.fade_lines.unwrap_or(defaults.fade_lines),
            fade_step: file.fade_step.unwrap_or(defaults.fade_step),
            item_spacing: file.item_spacing.unwrap_or(defaults.item_spacing),
            builtin_keys,
            quit_key,
            show_class_prefix: file
                .show_class_prefix
                .unwrap_or(defaults.show_class_prefix),
            raw_marker: file.raw_marker.unwrap_or(defaults.raw_marker),
            window_frame,
            frame_title: file.frame_title.unwrap_or(defaults.frame_title),
            shutdown_message: file.shutdown_message.unwrap_or(defaults.shutdown_message),
            join_timeout_ms: file.join_timeout_ms.unwrap_or(defaults.join_timeout_ms),
            flush_timeout_ms: file.flush_timeout_ms.unwrap_or(defaults.flush_timeout_ms),
            colors,
            logging,
        }
    }
}

/// Render a TOML basic string, escaping as needed
fn quote(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}
