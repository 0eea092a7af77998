use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::models::holding::Holding;

/// The slice of a long list that is actually mounted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VirtualWindow {
    /// First rendered index (inclusive)
    pub start: usize,
    /// One past the last rendered index
    pub end: usize,
    /// Vertical offset of the first rendered row (start × row height)
    pub offset_top: f64,
    /// Height reserved for the whole list (item count × row height)
    pub total_height: f64,
    /// Scroll offset after clamping to the scrollable range
    pub scroll_offset: f64,
}

impl VirtualWindow {
    /// Number of rows mounted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }
}

/// Most rows a viewport can ever mount: the rows that fit plus one overscan row.
#[must_use]
pub fn max_mounted_rows(container_height: f64, row_height: f64) -> usize {
    // `as usize` saturates, so huge ratios land on usize::MAX.
    ((container_height / row_height).ceil() as usize).saturating_add(1)
}

/// Work out which rows of a fixed-row-height list are visible.
///
/// The scroll offset is clamped to `[0, total_height − container_height]`;
/// a non-finite offset counts as 0.
pub fn compute_window(
    item_count: usize,
    container_height: f64,
    row_height: f64,
    scroll_offset: f64,
) -> Result<VirtualWindow, CoreError> {
    if !(row_height.is_finite() && row_height > 0.0) {
        return Err(CoreError::ValidationError(format!(
            "Row height must be positive, got {row_height}"
        )));
    }
    if !(container_height.is_finite() && container_height >= 0.0) {
        return Err(CoreError::ValidationError(format!(
            "Container height must be non-negative, got {container_height}"
        )));
    }

    let total_height = item_count as f64 * row_height;
    let max_scroll = (total_height - container_height).max(0.0);
    let scroll_offset = if scroll_offset.is_finite() {
        scroll_offset.clamp(0.0, max_scroll)
    } else {
        0.0
    };

    let start = ((scroll_offset / row_height).floor() as usize).min(item_count);
    let end = start
        .saturating_add(max_mounted_rows(container_height, row_height))
        .min(item_count);

    Ok(VirtualWindow {
        start,
        end,
        offset_top: start as f64 * row_height,
        total_height,
        scroll_offset,
    })
}

/// Column the holdings table is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HoldingSortKey {
    Symbol,
    Value,
    GainLossPercent,
    DailyChangePercent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// A mounted row: the holding plus where it sits in the full list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRow<'a> {
    /// Position in the filtered, sorted list
    pub index: usize,
    /// index × row height
    pub top: f64,
    pub holding: &'a Holding,
}

/// Virtualized, sortable, filterable view over a holdings collection.
///
/// Keeps the whole backing collection but only ever hands out the rows that
/// fit the viewport.
#[derive(Debug, Clone)]
pub struct HoldingListView {
    items: Vec<Holding>,
    /// Indices into `items` after filter + sort
    order: Vec<usize>,
    filter: String,
    sort: Option<(HoldingSortKey, SortDirection)>,
    row_height: f64,
    container_height: f64,
    scroll_offset: f64,
    window: VirtualWindow,
}

impl HoldingListView {
    pub fn new(items: Vec<Holding>, container_height: f64, row_height: f64) -> Result<Self, CoreError> {
        let window = compute_window(items.len(), container_height, row_height, 0.0)?;
        let mut view = Self {
            items,
            order: Vec::new(),
            filter: String::new(),
            sort: None,
            row_height,
            container_height,
            scroll_offset: 0.0,
            window,
        };
        view.rebuild();
        Ok(view)
    }

    /// Replace the backing collection. A new collection resets the scroll
    /// position; the current filter and sort are re-applied.
    pub fn set_items(&mut self, items: Vec<Holding>) {
        self.items = items;
        self.scroll_offset = 0.0;
        self.rebuild();
    }

    /// Case-insensitive filter over symbol and name. Resets the scroll position.
    pub fn set_filter(&mut self, query: &str) {
        self.filter = query.trim().to_lowercase();
        self.scroll_offset = 0.0;
        self.rebuild();
    }

    /// Select a sort column. Selecting the current column again flips the
    /// direction; a new column starts ascending.
    pub fn set_sort(&mut self, key: HoldingSortKey) {
        self.sort = Some(match self.sort {
            Some((current, direction)) if current == key => (key, direction.toggled()),
            _ => (key, SortDirection::Ascending),
        });
        self.rebuild();
    }

    /// Drop the sort and go back to collection order.
    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.rebuild();
    }

    pub fn scroll_to(&mut self, offset: f64) {
        self.scroll_offset = offset;
        self.refresh_window();
    }

    /// Resize the viewport (e.g. on window resize).
    pub fn set_container_height(&mut self, container_height: f64) -> Result<(), CoreError> {
        self.window = compute_window(self.order.len(), container_height, self.row_height, self.scroll_offset)?;
        self.container_height = container_height;
        self.scroll_offset = self.window.scroll_offset;
        Ok(())
    }

    #[must_use]
    pub fn sort(&self) -> Option<(HoldingSortKey, SortDirection)> {
        self.sort
    }

    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    #[must_use]
    pub fn window(&self) -> VirtualWindow {
        self.window
    }

    /// Rows after filtering (not just the mounted ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Full filtered + sorted list, for exports and tests.
    pub fn ordered(&self) -> impl Iterator<Item = &Holding> + '_ {
        self.order.iter().map(move |&i| &self.items[i])
    }

    /// Only the rows inside the current window.
    #[must_use]
    pub fn visible_rows(&self) -> Vec<VisibleRow<'_>> {
        (self.window.start..self.window.end)
            .map(|index| VisibleRow {
                index,
                top: index as f64 * self.row_height,
                holding: &self.items[self.order[index]],
            })
            .collect()
    }

    fn rebuild(&mut self) {
        let filter = self.filter.as_str();
        let mut order: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, h)| {
                filter.is_empty()
                    || h.symbol.to_lowercase().contains(filter)
                    || h.name.to_lowercase().contains(filter)
            })
            .map(|(i, _)| i)
            .collect();

        // Always sort from collection order so descending is the exact
        // reverse of ascending, ties included.
        if let Some((key, direction)) = self.sort {
            let items = &self.items;
            order.sort_by(|&a, &b| compare(&items[a], &items[b], key));
            if direction == SortDirection::Descending {
                order.reverse();
            }
        }

        self.order = order;
        self.refresh_window();
    }

    fn refresh_window(&mut self) {
        // Dimensions were validated in `new` / `set_container_height`.
        if let Ok(window) = compute_window(
            self.order.len(),
            self.container_height,
            self.row_height,
            self.scroll_offset,
        ) {
            self.scroll_offset = window.scroll_offset;
            self.window = window;
        }
    }
}

fn compare(a: &Holding, b: &Holding, key: HoldingSortKey) -> Ordering {
    match key {
        HoldingSortKey::Symbol => a.symbol.cmp(&b.symbol),
        HoldingSortKey::Value => a.total_value.total_cmp(&b.total_value),
        HoldingSortKey::GainLossPercent => a.total_gain_loss_percent.total_cmp(&b.total_gain_loss_percent),
        HoldingSortKey::DailyChangePercent => a.daily_change_percent.total_cmp(&b.daily_change_percent),
    }
}
