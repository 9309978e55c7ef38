//! Row layout
//!
//! Rows are single terminal lines anchored to the top, bottom or middle of
//! the screen. Each row holds content items (static text or a labelled
//! component) placed in a left, right or centre column. A row is redrawn
//! only when it is forced (new items, resize) or one of its components has
//! updates.

mod row;

pub use row::RowDrawable;

use crate::components::ComponentScheduler;
use crate::error::{EngineError, EngineResult};
use crate::surface::Surface;
use crate::theme::{ColorBudget, Theme};
use crossterm::style::Color;

/// Where a row is anchored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLocation {
    /// `index` lines below the top edge
    Top,
    /// `index` lines above the bottom edge
    Bottom,
    /// `index` lines below the vertical centre
    Middle,
}

/// Horizontal placement of an item within its row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Column {
    #[default]
    Left,
    Right,
    Center,
}

/// Declared once, immutable afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct RowSpec {
    pub name: String,
    pub location: RowLocation,
    pub index: u16,
    pub foreground: Option<Color>,
    pub background: Option<Color>,
}

impl RowSpec {
    pub fn new(name: impl Into<String>, location: RowLocation, index: u16) -> Self {
        Self {
            name: name.into(),
            location,
            index,
            foreground: None,
            background: None,
        }
    }

    pub fn top(name: impl Into<String>, index: u16) -> Self {
        Self::new(name, RowLocation::Top, index)
    }

    pub fn bottom(name: impl Into<String>, index: u16) -> Self {
        Self::new(name, RowLocation::Bottom, index)
    }

    pub fn middle(name: impl Into<String>, index: u16) -> Self {
        Self::new(name, RowLocation::Middle, index)
    }

    /// Default colors for items that set none
    pub fn colors(mut self, foreground: Color, background: Color) -> Self {
        self.foreground = Some(foreground);
        self.background = Some(background);
        self
    }
}

/// What an item shows
#[derive(Debug, Clone, PartialEq)]
pub enum RowContent {
    Static(String),
    /// `label` followed by the component's rendered value
    Component {
        name: String,
        label: String,
        param: Option<String>,
    },
}

/// One piece of a row
#[derive(Debug, Clone, PartialEq)]
pub struct RowContentItem {
    pub content: RowContent,
    pub column: Column,
    /// Extra cells between this item and the previous one on its side
    pub offset: u16,
    pub foreground: Option<Color>,
    pub background: Option<Color>,
}

impl RowContentItem {
    fn new(content: RowContent) -> Self {
        Self {
            content,
            column: Column::Left,
            offset: 0,
            foreground: None,
            background: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(RowContent::Static(text.into()))
    }

    pub fn component(name: impl Into<String>) -> Self {
        Self::new(RowContent::Component {
            name: name.into(),
            label: String::new(),
            param: None,
        })
    }

    /// Text shown before a component's value; ignored for static items
    pub fn label(mut self, text: impl Into<String>) -> Self {
        if let RowContent::Component { label, .. } = &mut self.content {
            *label = text.into();
        }
        self
    }

    /// Parameter handed to the component's render
    pub fn param(mut self, value: impl Into<String>) -> Self {
        if let RowContent::Component { param, .. } = &mut self.content {
            *param = Some(value.into());
        }
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.column = column;
        self
    }

    pub fn left(self) -> Self {
        self.column(Column::Left)
    }

    pub fn right(self) -> Self {
        self.column(Column::Right)
    }

    pub fn center(self) -> Self {
        self.column(Column::Center)
    }

    pub fn offset(mut self, cells: u16) -> Self {
        self.offset = cells;
        self
    }

    pub fn fg(mut self, color: Color) -> Self {
        self.foreground = Some(color);
        self
    }

    pub fn bg(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    /// Referenced component, if any
    pub fn component_name(&self) -> Option<&str> {
        match &self.content {
            RowContent::Component { name, .. } => Some(name),
            RowContent::Static(_) => None,
        }
    }
}

/// Everything a row needs to draw itself
pub struct DrawContext<'a> {
    pub surface: &'a mut dyn Surface,
    pub budget: &'a mut ColorBudget,
    pub scheduler: &'a ComponentScheduler,
    pub theme: &'a Theme,
    /// Blank cells after each item
    pub spacing: usize,
    /// Cells reserved on every edge (1 with the window frame)
    pub inset: u16,
}

/// All declared rows, in declaration order
#[derive(Default)]
pub struct RowLayout {
    rows: Vec<RowDrawable>,
}

impl RowLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, spec: RowSpec) -> EngineResult<()> {
        if self.find(&spec.name).is_some() {
            return Err(EngineError::DuplicateRow(spec.name));
        }
        self.rows.push(RowDrawable::new(spec));
        Ok(())
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.spec().name == name)
    }

    fn row_mut(&mut self, name: &str) -> EngineResult<&mut RowDrawable> {
        let idx = self
            .find(name)
            .ok_or_else(|| EngineError::UnknownRow(name.to_string()))?;
        Ok(&mut self.rows[idx])
    }

    /// Append an item to a row. Component references must already be
    /// registered.
    pub fn add_item(
        &mut self,
        row: &str,
        item: RowContentItem,
        scheduler: &ComponentScheduler,
    ) -> EngineResult<()> {
        if let Some(name) = item.component_name() {
            if !scheduler.contains(name) {
                return Err(EngineError::UnknownComponent(name.to_string()));
            }
        }
        self.row_mut(row)?.push(item);
        Ok(())
    }

    /// Replace a row's items wholesale
    pub fn replace_items(&mut self, row: &str, items: Vec<RowContentItem>) -> EngineResult<()> {
        self.row_mut(row)?.replace(items);
        Ok(())
    }

    /// Redraw every row on the next pass
    pub fn force_all(&mut self) {
        for row in &mut self.rows {
            row.force();
        }
    }

    /// Screen lines taken by rows, sorted
    pub fn reserved_lines(&self, height: u16, inset: u16) -> Vec<u16> {
        let mut lines: Vec<u16> = self
            .rows
            .iter()
            .filter_map(|r| r.y(height, inset))
            .collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }

    /// Draw dirty rows; returns how many were written
    pub fn draw(&mut self, ctx: &mut DrawContext<'_>) -> EngineResult<usize> {
        let mut drawn = 0;
        for row in &mut self.rows {
            if row.draw(ctx)? {
                drawn += 1;
            }
        }
        Ok(drawn)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ClockComponent, HostHandle};
    use crate::view::ViewState;
    use std::sync::Arc;
    use std::time::Duration;

    fn scheduler() -> ComponentScheduler {
        let host = HostHandle {
            view: Arc::new(ViewState::new()),
            tick_interval: Duration::from_millis(100),
        };
        ComponentScheduler::new(host, Duration::from_secs(1))
    }

    #[test]
    fn test_duplicate_and_unknown_rows() {
        let scheduler = scheduler();
        let mut layout = RowLayout::new();
        layout.add_row(RowSpec::top("Header", 0)).unwrap();

        assert!(matches!(
            layout.add_row(RowSpec::bottom("Header", 0)),
            Err(EngineError::DuplicateRow(_))
        ));
        assert!(matches!(
            layout.add_item("Footer", RowContentItem::text("x"), &scheduler),
            Err(EngineError::UnknownRow(_))
        ));
    }

    #[test]
    fn test_unregistered_component_rejected() {
        let scheduler = scheduler();
        let mut layout = RowLayout::new();
        layout.add_row(RowSpec::top("Header", 0)).unwrap();

        let err = layout
            .add_item("Header", RowContentItem::component("clock"), &scheduler)
            .unwrap_err();
        assert!(err.is_configuration());

        scheduler.register("clock", ClockComponent::default).unwrap();
        layout
            .add_item("Header", RowContentItem::component("clock"), &scheduler)
            .unwrap();
    }

    #[test]
    fn test_reserved_lines() {
        let mut layout = RowLayout::new();
        layout.add_row(RowSpec::top("a", 0)).unwrap();
        layout.add_row(RowSpec::top("b", 1)).unwrap();
        layout.add_row(RowSpec::bottom("c", 0)).unwrap();
        layout.add_row(RowSpec::middle("d", 0)).unwrap();

        assert_eq!(layout.reserved_lines(20, 0), vec![0, 1, 10, 19]);
        assert_eq!(layout.reserved_lines(20, 1), vec![1, 2, 10, 18]);
    }

    #[test]
    fn test_item_builders() {
        let item = RowContentItem::component("cpu")
            .label("cpu: ")
            .param("%")
            .right()
            .offset(2)
            .fg(Color::Green);
        assert_eq!(item.column, Column::Right);
        assert_eq!(item.component_name(), Some("cpu"));
        assert_eq!(
            item.content,
            RowContent::Component {
                name: "cpu".to_string(),
                label: "cpu: ".to_string(),
                param: Some("%".to_string()),
            }
        );

        let text = RowContentItem::text("plain").label("ignored");
        assert_eq!(text.content, RowContent::Static("plain".to_string()));
    }
}
