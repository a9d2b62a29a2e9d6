//! Domain service behind the feed endpoints.

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::debug;

use crate::db::StoreError;
use crate::domain::QueryTag;
use crate::models::Offer;
use crate::scheduler::{QueryScheduler, SchedulerError};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed not found: {0}")]
    NotFound(QueryTag),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

#[async_trait::async_trait]
pub trait FeedService: Send + Sync {
    /// Creates the query and kicks off its first scrape. Creating a query that
    /// already exists succeeds without doing anything.
    async fn create_query(&self, keywords: &str, location: &str) -> Result<(), FeedError>;

    /// Offers of the feed posted within the feed window, newest first. Reading a
    /// feed keeps its query alive.
    async fn list_offers(&self, keywords: &str, location: &str) -> Result<Vec<Offer>, FeedError>;
}

pub struct DefaultFeedService {
    scheduler: QueryScheduler,
}

impl DefaultFeedService {
    #[must_use]
    pub const fn new(scheduler: QueryScheduler) -> Self {
        Self { scheduler }
    }
}

#[async_trait::async_trait]
impl FeedService for DefaultFeedService {
    async fn create_query(&self, keywords: &str, location: &str) -> Result<(), FeedError> {
        self.scheduler.create_and_schedule(keywords, location).await?;
        Ok(())
    }

    async fn list_offers(&self, keywords: &str, location: &str) -> Result<Vec<Offer>, FeedError> {
        let lifecycle = self.scheduler.lifecycle();
        let store = lifecycle.store();

        let not_found = || FeedError::NotFound(QueryTag::new(keywords, location));

        let query = match store.get_query(keywords, location).await {
            Ok(query) => query,
            Err(e) if e.is_not_found() => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        match store.touch_query_read(query.id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Err(not_found()),
            Err(e) => return Err(e.into()),
        }

        let since = Utc::now().date_naive() - Duration::days(lifecycle.config().feed_window_days);
        let offers = store.list_offers(query.id, since).await?;

        debug!(query_id = %query.id, offers = offers.len(), "Listed feed offers");
        Ok(offers)
    }
}
