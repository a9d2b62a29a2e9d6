pub mod feed;
pub use feed::{DefaultFeedService, FeedError, FeedService};

pub mod lifecycle;
pub use lifecycle::{CycleOutcome, LifecycleManager};
