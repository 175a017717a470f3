use crate::upload::FileId;

pub const COLUMN_WIDTH: f32 = 240.0;
pub const COLUMN_GAP: f32 = 16.0;
pub const CARD_PADDING: f32 = 8.0;
/// Height reserved for a card whose thumbnail has not been measured yet.
pub const DEFAULT_THUMBNAIL_HEIGHT: f32 = COLUMN_WIDTH - 2.0 * CARD_PADDING;
/// Name, status line and padding below the thumbnail.
pub const CARD_CHROME_HEIGHT: f32 = 80.0;

/// One entry of the visible slice, with its measured thumbnail height if any.
#[derive(Debug, Clone, PartialEq)]
pub struct MasonryItem {
    pub id: FileId,
    pub height: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub id: FileId,
    pub column: usize,
    pub left: f32,
    pub top: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasonryLayout {
    pub columns: usize,
    pub items: Vec<Placement>,
    pub column_heights: Vec<f32>,
    pub container_height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasonryConfig {
    pub item_width: f32,
    pub gap: f32,
    pub default_height: f32,
    pub chrome_height: f32,
}

impl Default for MasonryConfig {
    fn default() -> Self {
        Self {
            item_width: COLUMN_WIDTH,
            gap: COLUMN_GAP,
            default_height: DEFAULT_THUMBNAIL_HEIGHT,
            chrome_height: CARD_CHROME_HEIGHT,
        }
    }
}

impl MasonryConfig {
    pub fn stride(&self) -> f32 {
        self.item_width + self.gap
    }

    pub fn columns_for(&self, container_width: f32) -> usize {
        if container_width.is_nan() || container_width <= 0.0 {
            return 1;
        }
        ((container_width / self.stride()).floor() as usize).max(1)
    }

    /// Left margin that centres `columns` columns inside the container.
    pub fn centering_offset(&self, container_width: f32, columns: usize) -> f32 {
        ((container_width - self.stride() * columns as f32) / 2.0)
            .floor()
            .max(0.0)
    }

    /// Places every item into the currently shortest column, in order.
    pub fn compute(&self, items: &[MasonryItem], columns: usize) -> MasonryLayout {
        let columns = columns.max(1);
        let mut column_heights = vec![0.0_f32; columns];
        let mut placed = Vec::with_capacity(items.len());

        for item in items {
            let column = shortest_column(&column_heights);
            let top = column_heights[column];
            placed.push(Placement {
                id: item.id.clone(),
                column,
                left: column as f32 * self.stride(),
                top,
            });
            column_heights[column] +=
                item.height.unwrap_or(self.default_height) + self.chrome_height + self.gap;
        }

        let container_height = column_heights.iter().copied().fold(0.0, f32::max);

        MasonryLayout {
            columns,
            items: placed,
            column_heights,
            container_height,
        }
    }
}

fn shortest_column(heights: &[f32]) -> usize {
    let mut best = 0;
    for (index, height) in heights.iter().enumerate().skip(1) {
        if *height < heights[best] {
            best = index;
        }
    }
    best
}

/// Remembers the last layout and recomputes only when its inputs change.
#[derive(Debug, Default)]
pub struct MasonryCache {
    key: Option<(Vec<MasonryItem>, usize)>,
    layout: MasonryLayout,
}

impl MasonryCache {
    pub fn layout(
        &mut self,
        config: &MasonryConfig,
        items: Vec<MasonryItem>,
        columns: usize,
    ) -> &MasonryLayout {
        let fresh = match &self.key {
            Some((cached_items, cached_columns)) => {
                *cached_columns != columns || *cached_items != items
            }
            None => true,
        };
        if fresh {
            self.layout = config.compute(&items, columns);
            self.key = Some((items, columns));
        }
        &self.layout
    }
}
