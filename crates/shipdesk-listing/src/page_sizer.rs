use shipdesk_domain::ViewMode;

pub const DEFAULT_RESERVED_WIDTH: u32 = 48;
pub const DEFAULT_CARD_WIDTH: u32 = 220;
pub const DEFAULT_INITIAL_ROWS: usize = 4;
pub const DEFAULT_CONTINUATION_ROWS: usize = 2;
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

// Compact list rows are roughly a sixth of a card's height.
const LIST_ROWS_PER_CARD_ROW: usize = 6;

/// Number of items that fit in one row, never less than one.
pub fn compute_columns(container_width: u32, reserved_width: u32, item_width: u32) -> usize {
    if item_width == 0 {
        return 1;
    }
    let usable = container_width.saturating_sub(reserved_width);
    usize::try_from(usable / item_width).unwrap_or(1).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    pub columns: usize,
    pub initial_page_size: usize,
    pub continuation_page_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportPageSizer {
    pub reserved_width: u32,
    pub card_width: u32,
    pub initial_rows: usize,
    pub continuation_rows: usize,
    pub max_page_size: usize,
}

impl Default for ViewportPageSizer {
    fn default() -> Self {
        Self {
            reserved_width: DEFAULT_RESERVED_WIDTH,
            card_width: DEFAULT_CARD_WIDTH,
            initial_rows: DEFAULT_INITIAL_ROWS,
            continuation_rows: DEFAULT_CONTINUATION_ROWS,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl ViewportPageSizer {
    /// List mode renders one shipment per row, card mode packs a grid.
    pub fn geometry(&self, container_width: u32, view_mode: ViewMode) -> PageGeometry {
        let (columns, rows_per_row) = match view_mode {
            ViewMode::Card => (
                compute_columns(container_width, self.reserved_width, self.card_width),
                1,
            ),
            ViewMode::List => (1, LIST_ROWS_PER_CARD_ROW),
        };
        let cap = self.max_page_size.max(1);
        let page_size = |rows: usize| {
            columns
                .saturating_mul(rows)
                .saturating_mul(rows_per_row)
                .clamp(1, cap)
        };

        PageGeometry {
            columns,
            initial_page_size: page_size(self.initial_rows),
            continuation_page_size: page_size(self.continuation_rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use shipdesk_domain::ViewMode;

    use super::{compute_columns, ViewportPageSizer};

    #[test]
    fn columns_never_drop_below_one() {
        assert_eq!(compute_columns(100, 200, 220), 1);
        assert_eq!(compute_columns(0, 0, 220), 1);
        assert_eq!(compute_columns(1000, 0, 0), 1);
    }

    #[test]
    fn columns_use_width_left_after_reserved_space() {
        assert_eq!(compute_columns(1368, 48, 220), 6);
        assert_eq!(compute_columns(1367, 48, 220), 5);
    }

    #[test]
    fn geometry_multiplies_rows_and_caps_at_server_maximum() {
        let sizer = ViewportPageSizer {
            reserved_width: 48,
            card_width: 220,
            initial_rows: 4,
            continuation_rows: 2,
            max_page_size: 100,
        };

        let geometry = sizer.geometry(1368, ViewMode::Card);
        assert_eq!(geometry.columns, 6);
        assert_eq!(geometry.initial_page_size, 24);
        assert_eq!(geometry.continuation_page_size, 12);

        let capped = ViewportPageSizer {
            max_page_size: 20,
            ..sizer
        }
        .geometry(1368, ViewMode::Card);
        assert_eq!(capped.initial_page_size, 20);
        assert_eq!(capped.continuation_page_size, 12);
    }

    #[test]
    fn list_mode_uses_a_single_column_of_compact_rows() {
        let geometry = ViewportPageSizer::default().geometry(4000, ViewMode::List);
        assert_eq!(geometry.columns, 1);
        assert_eq!(geometry.initial_page_size, 24);
        assert_eq!(geometry.continuation_page_size, 12);
    }
}
