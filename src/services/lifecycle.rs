//! Per-run decisions for a scheduled query: expire it, scrape it, store the
//! results, and tell the scheduler what to do next.

use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::LifecycleConfig;
use crate::db::{Store, StoreResult};
use crate::domain::QueryId;
use crate::models::{NewOffer, Query};
use crate::scrape::Scraper;

/// What a run decided. The scheduler acts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Scrape succeeded, `updated_at` moved forward.
    Completed { offers: usize },
    /// The query went unread for too long and was deleted.
    Expired,
    /// Transient failure; the query should be retried later.
    RetryScheduled,
    /// Non-transient failure; wait for the next regular run.
    Failed,
    /// The query no longer exists in the store.
    Missing,
}

impl CycleOutcome {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Expired => "expired",
            Self::RetryScheduled => "retry",
            Self::Failed => "failed",
            Self::Missing => "missing",
        }
    }

    /// Whether the query's recurring task should be dropped.
    #[must_use]
    pub const fn ends_schedule(self) -> bool {
        matches!(self, Self::Expired | Self::Missing)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistStats {
    pub new_offers: usize,
    pub new_associations: usize,
}

pub struct LifecycleManager {
    store: Store,
    scraper: Arc<dyn Scraper>,
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(store: Store, scraper: Arc<dyn Scraper>, config: LifecycleConfig) -> Self {
        Self {
            store,
            scraper,
            config,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub async fn run_cycle(&self, query_id: QueryId) -> CycleOutcome {
        let query = match self.store.get_query_by_id(query_id).await {
            Ok(query) => query,
            Err(e) if e.is_not_found() => {
                warn!(query_id = %query_id, "Scheduled query no longer exists");
                return CycleOutcome::Missing;
            }
            Err(e) => {
                error!(query_id = %query_id, error = %e, "Failed to load query");
                return CycleOutcome::Failed;
            }
        };

        if query.is_idle(Utc::now(), Duration::days(self.config.expiry_days)) {
            return self.expire(&query).await;
        }

        let start = Instant::now();
        info!(
            event = "job_started",
            job_name = "scrape_query",
            query_id = %query.id,
            keywords = %query.keywords,
            location = %query.location,
            "Scraping query"
        );

        let report = self.scraper.scrape(&query).await;
        let stats = self.persist(query.id, &report.offers).await;
        metrics::counter!("jobfeed_offers_scraped_total").increment(report.offers.len() as u64);

        let outcome = match &report.error {
            None => match self.store.touch_query_run(query.id).await {
                Ok(()) => CycleOutcome::Completed {
                    offers: report.offers.len(),
                },
                Err(e) if e.is_not_found() => CycleOutcome::Missing,
                Err(e) => {
                    error!(query_id = %query.id, error = %e, "Failed to record completed run");
                    CycleOutcome::Failed
                }
            },
            Some(e) if e.is_retryable() => {
                warn!(
                    event = "job_failed",
                    job_name = "scrape_query",
                    query_id = %query.id,
                    error = %e,
                    "Scrape failed with a transient error"
                );
                CycleOutcome::RetryScheduled
            }
            Some(e) => {
                error!(
                    event = "job_failed",
                    job_name = "scrape_query",
                    query_id = %query.id,
                    error = %e,
                    "Scrape failed"
                );
                CycleOutcome::Failed
            }
        };

        metrics::histogram!("jobfeed_scrape_duration_seconds", "outcome" => outcome.label())
            .record(start.elapsed().as_secs_f64());

        info!(
            event = "job_finished",
            job_name = "scrape_query",
            query_id = %query.id,
            outcome = outcome.label(),
            pages = report.pages,
            offers = report.offers.len(),
            new_offers = stats.new_offers,
            new_associations = stats.new_associations,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Query scrape finished"
        );

        outcome
    }

    async fn expire(&self, query: &Query) -> CycleOutcome {
        match self.store.delete_query(query.id).await {
            Ok(_) => {
                info!(
                    query_id = %query.id,
                    keywords = %query.keywords,
                    location = %query.location,
                    queried_at = %query.queried_at,
                    "Query expired, deleted"
                );
                metrics::counter!("jobfeed_query_expired_total").increment(1);
                CycleOutcome::Expired
            }
            Err(e) => {
                error!(query_id = %query.id, error = %e, "Failed to delete expired query");
                CycleOutcome::Failed
            }
        }
    }

    /// Stores each offer and links it to the query. Duplicates are expected and
    /// skipped; other errors are logged and the loop moves on.
    pub async fn persist(&self, query_id: QueryId, offers: &[NewOffer]) -> PersistStats {
        let mut stats = PersistStats::default();

        for offer in offers {
            match self.store.create_offer(offer).await {
                Ok(()) => stats.new_offers += 1,
                Err(e) if e.is_duplicate() => {
                    debug!(offer_id = %offer.id, "Offer already stored");
                }
                Err(e) => {
                    error!(offer_id = %offer.id, error = %e, "Failed to store offer");
                }
            }

            match self.store.create_association(query_id, &offer.id).await {
                Ok(()) => stats.new_associations += 1,
                Err(e) if e.is_duplicate() => {
                    debug!(query_id = %query_id, offer_id = %offer.id, "Offer already linked");
                }
                Err(e) => {
                    error!(
                        query_id = %query_id,
                        offer_id = %offer.id,
                        error = %e,
                        "Failed to link offer"
                    );
                }
            }
        }

        stats
    }

    /// Deletes offers posted more than `retention_days` ago.
    pub async fn sweep_retention(&self) -> StoreResult<u64> {
        let cutoff = Utc::now().date_naive() - Duration::days(self.config.retention_days);
        let start = Instant::now();
        let deleted = self.store.delete_old_offers(cutoff).await?;

        info!(
            event = "job_finished",
            job_name = "retention_sweep",
            cutoff = %cutoff,
            deleted,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Retention sweep finished"
        );

        Ok(deleted)
    }
}
