pub mod feed;
pub mod styles;

pub use feed::{FeedOptions, format_record};
pub use styles::Theme;
