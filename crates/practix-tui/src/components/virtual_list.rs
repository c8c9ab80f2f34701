//! Virtualized list
//!
//! Only rows intersecting the viewport, plus `overscan` rows on each side,
//! are ever formatted. Formatted rows live in a fixed pool of slots indexed
//! by `row % pool_size`; a slot is reformatted only when the row assigned to
//! it changes, so scrolling by one row formats one row and appending a page
//! below the viewport formats none.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Scrollbar, ScrollbarOrientation, ScrollbarState, Widget},
    Frame,
};
use std::ops::Range;

/// Identity of a rendered row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKey {
    Item(usize),
    /// Trailing affordance shown while more pages exist
    LoadMore,
}

#[derive(Debug, Default)]
struct Slot {
    key: Option<RowKey>,
    line: Line<'static>,
}

#[derive(Debug)]
pub struct VirtualList {
    overscan: usize,
    row_height: u16,
    cursor: usize,
    offset: usize,
    slots: Vec<Slot>,
    formatted_total: u64,
    formatted_last: usize,
}

impl VirtualList {
    pub fn new(overscan: usize) -> Self {
        Self {
            overscan,
            row_height: 1,
            cursor: 0,
            offset: 0,
            slots: Vec::new(),
            formatted_total: 0,
            formatted_last: 0,
        }
    }

    pub fn with_row_height(mut self, row_height: u16) -> Self {
        self.row_height = row_height.max(1);
        self
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Rows formatted since creation
    pub fn formatted_total(&self) -> u64 {
        self.formatted_total
    }

    /// Rows formatted by the last [`sync`](Self::sync)
    pub fn formatted_last(&self) -> usize {
        self.formatted_last
    }

    pub fn pool_size(&self) -> usize {
        self.slots.len()
    }

    /// Rows per viewport of `height` cells
    pub fn viewport_rows(&self, height: u16) -> usize {
        (height / self.row_height) as usize
    }

    /// Forget every formatted row (contents changed in place)
    pub fn invalidate(&mut self) {
        for slot in &mut self.slots {
            slot.key = None;
        }
    }

    /// Start over for a different list
    pub fn reset(&mut self) {
        self.invalidate();
        self.cursor = 0;
        self.offset = 0;
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self, rows: usize) {
        if self.cursor + 1 < rows {
            self.cursor += 1;
        }
    }

    pub fn page_down(&mut self, rows: usize, viewport: usize) {
        self.cursor = (self.cursor + viewport.max(1)).min(rows.saturating_sub(1));
    }

    pub fn page_up(&mut self, viewport: usize) {
        self.cursor = self.cursor.saturating_sub(viewport.max(1));
    }

    /// Whether the cursor sits on the load-more row
    pub fn on_load_more(&self, items: usize, has_next: bool) -> bool {
        has_next && self.cursor == items
    }

    /// Rows actually drawn
    pub fn visible(&self, rows: usize, viewport: usize) -> Range<usize> {
        self.offset.min(rows)..(self.offset + viewport).min(rows)
    }

    /// Rows kept formatted (visible plus overscan)
    pub fn window(&self, rows: usize, viewport: usize) -> Range<usize> {
        let start = self.offset.saturating_sub(self.overscan).min(rows);
        let end = (self.offset + viewport + self.overscan).min(rows);
        start..end
    }

    fn scroll_to_cursor(&mut self, rows: usize, viewport: usize) {
        if rows == 0 {
            self.cursor = 0;
            self.offset = 0;
            return;
        }
        self.cursor = self.cursor.min(rows - 1);
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if viewport > 0 && self.cursor >= self.offset + viewport {
            self.offset = self.cursor + 1 - viewport;
        }
        self.offset = self.offset.min(rows.saturating_sub(viewport));
    }

    /// Bring the slot pool in line with the current window
    ///
    /// `format` is called once per row whose slot assignment changed.
    pub fn sync<T, F>(&mut self, items: &[T], has_next: bool, viewport: usize, mut format: F) -> usize
    where
        F: FnMut(usize, &T) -> Line<'static>,
    {
        let rows = items.len() + usize::from(has_next);
        self.scroll_to_cursor(rows, viewport);

        let pool = viewport + 2 * self.overscan;
        if self.slots.len() != pool {
            self.slots = (0..pool).map(|_| Slot::default()).collect();
        }

        let mut formatted = 0;
        if pool > 0 {
            for row in self.window(rows, viewport) {
                let key = if row < items.len() {
                    RowKey::Item(row)
                } else {
                    RowKey::LoadMore
                };
                let slot = &mut self.slots[row % pool];
                if slot.key == Some(key) {
                    continue;
                }
                slot.line = match key {
                    RowKey::Item(index) => format(index, &items[index]),
                    RowKey::LoadMore => load_more_line(),
                };
                slot.key = Some(key);
                formatted += 1;
            }
        }

        self.formatted_last = formatted;
        self.formatted_total += formatted as u64;
        formatted
    }

    /// Sync and draw into `area`
    #[allow(clippy::too_many_arguments)]
    pub fn render<T, F>(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        block: Block<'_>,
        items: &[T],
        has_next: bool,
        focused: bool,
        format: F,
    ) where
        F: FnMut(usize, &T) -> Line<'static>,
    {
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let viewport = self.viewport_rows(inner.height);
        self.sync(items, has_next, viewport, format);

        let rows = items.len() + usize::from(has_next);
        self.draw_rows(frame.buffer_mut(), inner, rows, viewport, focused);

        if rows > viewport && inner.width > 1 {
            let mut scrollbar_state = ScrollbarState::new(rows).position(self.cursor);
            let scroll_area = Rect {
                x: area.x + area.width.saturating_sub(1),
                y: inner.y,
                width: 1,
                height: inner.height,
            };
            frame.render_stateful_widget(
                Scrollbar::new(ScrollbarOrientation::VerticalRight)
                    .begin_symbol(Some("↑"))
                    .end_symbol(Some("↓")),
                scroll_area,
                &mut scrollbar_state,
            );
        }
    }

    fn draw_rows(&self, buf: &mut Buffer, inner: Rect, rows: usize, viewport: usize, focused: bool) {
        let pool = self.slots.len();
        if pool == 0 {
            return;
        }

        for row in self.visible(rows, viewport) {
            let y = inner.y + ((row - self.offset) as u16) * self.row_height;
            let row_area = Rect {
                x: inner.x,
                y,
                width: inner.width,
                height: self.row_height,
            };
            let slot = &self.slots[row % pool];
            (&slot.line).render(row_area, buf);

            if row == self.cursor {
                let style = if focused {
                    Style::default()
                        .bg(Color::Cyan)
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().add_modifier(Modifier::REVERSED)
                };
                buf.set_style(row_area, style);
            }
        }
    }
}

fn load_more_line() -> Line<'static> {
    Line::from(vec![
        Span::styled("  ⋯ ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            "load more (n)",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ),
    ])
}
