// A declared row and the logic to draw it
//
// Component values are cached per item: the scheduler only hands out a value
// once, so a forced redraw of an unchanged row reuses the cached text.

use super::{Column, DrawContext, RowContent, RowContentItem, RowLocation, RowSpec};
use crate::components::ComponentScheduler;
use crate::error::EngineResult;
use crate::util::{display_width, truncate_to_width};
use tracing::trace;

struct ItemSlot {
    item: RowContentItem,
    /// Last value the referenced component rendered
    cached: String,
}

impl ItemSlot {
    fn new(item: RowContentItem) -> Self {
        Self {
            item,
            cached: String::new(),
        }
    }

    /// Text to draw now, pulling a fresh component value if there is one
    fn text(&mut self, scheduler: &ComponentScheduler) -> String {
        match &self.item.content {
            RowContent::Static(text) => text.clone(),
            RowContent::Component { name, label, param } => {
                match scheduler.render_if_updated(name, param.as_deref()) {
                    Ok(Some(value)) => self.cached = value,
                    Ok(None) => {}
                    Err(e) => trace!("Row item skipped: {}", e),
                }
                format!("{}{}", label, self.cached)
            }
        }
    }
}

/// A row plus its items, ready to draw
pub struct RowDrawable {
    spec: RowSpec,
    items: Vec<ItemSlot>,
    forced: bool,
}

impl RowDrawable {
    pub fn new(spec: RowSpec) -> Self {
        Self {
            spec,
            items: Vec::new(),
            forced: true,
        }
    }

    pub fn spec(&self) -> &RowSpec {
        &self.spec
    }

    pub fn push(&mut self, item: RowContentItem) {
        self.items.push(ItemSlot::new(item));
        self.forced = true;
    }

    pub fn replace(&mut self, items: Vec<RowContentItem>) {
        self.items = items.into_iter().map(ItemSlot::new).collect();
        self.forced = true;
    }

    pub fn force(&mut self) {
        self.forced = true;
    }

    /// Screen line for a terminal `height` lines tall, `None` if the row
    /// falls outside the drawable area.
    pub fn y(&self, height: u16, inset: u16) -> Option<u16> {
        let index = self.spec.index;
        let y = match self.spec.location {
            RowLocation::Top => inset.checked_add(index)?,
            RowLocation::Bottom => height.checked_sub(index.checked_add(inset)?.checked_add(1)?)?,
            RowLocation::Middle => (height / 2).checked_add(index)?,
        };
        (y >= inset && y < height.saturating_sub(inset)).then_some(y)
    }

    /// Forced, or a referenced component has a value not drawn yet
    pub fn is_dirty(&self, scheduler: &ComponentScheduler) -> bool {
        self.forced
            || self.items.iter().any(|slot| {
                slot.item
                    .component_name()
                    .is_some_and(|name| scheduler.has_updates(name).unwrap_or(false))
            })
    }

    /// Erase and rewrite the row if it is dirty. Returns whether anything
    /// was written.
    pub fn draw(&mut self, ctx: &mut DrawContext<'_>) -> EngineResult<bool> {
        let (width, height) = ctx.surface.size();
        let Some(y) = self.y(height, ctx.inset) else {
            self.forced = false;
            return Ok(false);
        };
        if !self.is_dirty(ctx.scheduler) {
            return Ok(false);
        }

        let saved = ctx.surface.cursor_position();

        // Writing the bottom-right cell makes some terminals scroll
        let last_line = y + 1 == height;
        let left_edge = ctx.inset as usize;
        let right_edge = (width as usize).saturating_sub(ctx.inset as usize + usize::from(last_line));
        if right_edge <= left_edge {
            self.forced = false;
            return Ok(false);
        }

        let row_fg = self.spec.foreground.unwrap_or(ctx.theme.foreground);
        let row_bg = self.spec.background.unwrap_or(ctx.theme.background);

        ctx.budget.apply_foreground(ctx.surface, row_fg)?;
        ctx.budget.apply_background(ctx.surface, row_bg)?;
        ctx.surface.set_cursor(left_edge as u16, y)?;
        ctx.surface.write(&" ".repeat(right_edge - left_edge))?;

        let mut left_margin = 0;
        let mut right_margin = 0;
        for slot in &mut self.items {
            let text = slot.text(ctx.scheduler);
            if text.is_empty() {
                continue;
            }

            let len = display_width(&text);
            let offset = slot.item.offset as usize;
            let x = match slot.item.column {
                Column::Left => {
                    let x = left_edge + left_margin + offset;
                    left_margin += offset + len + ctx.spacing;
                    x
                }
                Column::Right => {
                    let x = right_edge
                        .saturating_sub(right_margin + offset + len)
                        .max(left_edge);
                    right_margin += offset + len + ctx.spacing;
                    x
                }
                Column::Center => {
                    left_edge + (right_edge - left_edge).saturating_sub(len) / 2 + offset
                }
            };
            if x >= right_edge {
                continue;
            }

            let visible = truncate_to_width(&text, right_edge - x);
            ctx.budget
                .apply_foreground(ctx.surface, slot.item.foreground.unwrap_or(row_fg))?;
            ctx.budget
                .apply_background(ctx.surface, slot.item.background.unwrap_or(row_bg))?;
            ctx.surface.set_cursor(x as u16, y)?;
            ctx.surface.write(visible)?;
        }

        ctx.surface.reset_colors()?;
        ctx.surface.set_cursor(saved.0, saved.1)?;
        self.forced = false;
        Ok(true)
    }
}
