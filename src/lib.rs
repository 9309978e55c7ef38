//! headsup - a terminal dashboard engine
//!
//! Pinned status rows (top, middle, bottom) around a scrolling, searchable
//! log region. Rows hold static text or named live components whose values
//! are recomputed on a tick and only redrawn when they change.
//!
//! ```no_run
//! use headsup::{Config, Dashboard, RowContentItem, RowSpec};
//!
//! let dashboard = Dashboard::builder(Config::from_env())
//!     .row(RowSpec::top("header", 0))
//!     .item("header", RowContentItem::text("my service"))
//!     .item("header", RowContentItem::component("clock").right())
//!     .build()?;
//! dashboard.start()?;
//! dashboard.write_line("hello");
//! dashboard.wait_for_close();
//! # Ok::<(), headsup::EngineError>(())
//! ```
//!
//! Architecture:
//! - Render loop: redraws dirty rows and the scrollback on a fixed period
//! - Component scheduler: ticks live components with a shared counter
//! - Input loop: built-in scroll/search/help keys plus host subscribers
//! - Logging: a tracing layer that routes log events into the scrollback

pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod input;
pub mod layout;
pub mod logging;
pub mod render;
pub mod surface;
pub mod text;
pub mod theme;
pub mod util;
pub mod view;

pub use components::{Component, LiveValue, Scheduling};
pub use config::Config;
pub use engine::{names, Dashboard, DashboardBuilder, DashboardWriter};
pub use error::{EngineError, EngineResult};
pub use input::{InputEvent, InputSource, ScriptedInput};
pub use layout::{Column, RowContentItem, RowLocation, RowSpec};
pub use logging::DashboardLayer;
pub use render::OutputMode;
pub use surface::{CrosstermSurface, MemorySurface, Surface};
pub use text::{interlace, TextBlock};
