use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

use super::extractor::extract_offers;
use super::{FetchOutcome, PageFetcher, PageRequest, ScrapeError, ScrapeReport, Scraper};
use crate::config::ScraperConfig;
use crate::models::Query;

const SECONDS_PER_DAY: i64 = 86_400;

/// Exponential backoff between attempts at the same page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total requests issued for one page, the first one included.
    pub max_attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base: Duration::from_millis(config.backoff_base_ms),
            max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay after the `failures`-th failed request: `base * 2^(failures - 1)`, capped.
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 1u32
            .checked_shl(failures.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ScraperConfig::default())
    }
}

/// Pages through the job board for one query.
pub struct ScrapePipeline<F> {
    fetcher: F,
    retry: RetryPolicy,
    page_size: u32,
    default_window_days: u32,
}

impl<F: PageFetcher> ScrapePipeline<F> {
    pub fn new(fetcher: F, config: &ScraperConfig) -> Self {
        Self {
            fetcher,
            retry: RetryPolicy::from_config(config),
            page_size: config.page_size.max(1),
            default_window_days: config.default_window_days,
        }
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Seconds of history to ask for: everything since the last completed cycle,
    /// or the default window for a query that never completed one.
    #[must_use]
    pub fn window_seconds(&self, query: &Query, now: DateTime<Utc>) -> i64 {
        match query.updated_at {
            Some(updated_at) => (now - updated_at).num_seconds().max(1),
            None => i64::from(self.default_window_days) * SECONDS_PER_DAY,
        }
    }

    async fn fetch_with_retry(&self, request: &PageRequest) -> Result<String, ScrapeError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.fetcher.fetch_page(request).await {
                FetchOutcome::Success(body) => return Ok(body),
                FetchOutcome::Fatal(err) => return Err(err),
                FetchOutcome::Retryable(reason) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(ScrapeError::RetryExhausted {
                            start: request.start,
                            attempts: attempt,
                            reason,
                        });
                    }

                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        start = request.start,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        reason = %reason,
                        "Transient job board failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Fetches pages until one comes back short. A failing page ends the run but
    /// the offers of the pages before it are kept in the report.
    pub async fn run(&self, query: &Query, now: DateTime<Utc>) -> ScrapeReport {
        let window_seconds = self.window_seconds(query, now);
        let today = now.date_naive();
        let mut report = ScrapeReport::default();
        let mut start = 0;

        loop {
            let request = PageRequest {
                keywords: query.keywords.clone(),
                location: query.location.clone(),
                start,
                window_seconds,
            };

            let body = match self.fetch_with_retry(&request).await {
                Ok(body) => body,
                Err(err) => {
                    report.error = Some(err);
                    return report;
                }
            };

            let page = extract_offers(&body, today);
            report.pages += 1;
            debug!(
                query_id = %query.id,
                start,
                cards = page.cards,
                offers = page.offers.len(),
                "Scraped page"
            );

            let full_page = page.cards >= self.page_size as usize;
            report.offers.extend(page.offers);

            if !full_page {
                return report;
            }
            start += self.page_size;
        }
    }
}

#[async_trait]
impl<F: PageFetcher> Scraper for ScrapePipeline<F> {
    async fn scrape(&self, query: &Query) -> ScrapeReport {
        self.run(query, Utc::now()).await
    }
}
