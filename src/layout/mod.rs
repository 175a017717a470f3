pub mod masonry;
pub mod pagination;
pub mod visibility;

pub use masonry::{MasonryCache, MasonryConfig, MasonryItem, MasonryLayout};
pub use pagination::{PaginationController, DEFAULT_DISPLAY_LIMIT};
pub use visibility::{ElementRef, VisibilityTracker};
