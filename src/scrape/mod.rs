//! Turning a stored query into the job board's current offers.
//!
//! The [`Scraper`] trait is the seam the lifecycle code depends on. The production
//! implementation is [`pipeline::ScrapePipeline`], which pages through the board
//! with a [`PageFetcher`] and runs each page through the [`extractor`].

pub mod extractor;
pub mod pipeline;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{NewOffer, Query};

pub use pipeline::{RetryPolicy, ScrapePipeline};

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A page kept failing with transient errors until the retry budget ran out.
    #[error("page at offset {start} still failing after {attempts} attempts: {reason}")]
    RetryExhausted {
        start: u32,
        attempts: u32,
        reason: String,
    },

    #[error("page at offset {start} returned status {status}: {body}")]
    Status { start: u32, status: u16, body: String },

    #[error("request for page at offset {start} failed: {source}")]
    Transport {
        start: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not read page at offset {start}: {reason}")]
    Extract { start: u32, reason: String },
}

impl ScrapeError {
    /// Whether the run should be re-attempted later rather than waiting for the
    /// next regular cycle.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }
}

/// Everything a scrape run produced. `offers` holds the results of every page
/// that succeeded, even when `error` is set.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub offers: Vec<NewOffer>,
    pub error: Option<ScrapeError>,
    pub pages: u32,
}

/// One page request against the job board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub keywords: String,
    pub location: String,
    pub start: u32,
    /// How far back to look, in seconds.
    pub window_seconds: i64,
}

/// Classified result of a single page request.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(String),
    Retryable(String),
    Fatal(ScrapeError),
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> FetchOutcome;
}

#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, query: &Query) -> ScrapeReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exhausted_retries_are_retryable() {
        let exhausted = ScrapeError::RetryExhausted {
            start: 10,
            attempts: 5,
            reason: "status 429".to_string(),
        };
        assert!(exhausted.is_retryable());

        let fatal = ScrapeError::Status {
            start: 0,
            status: 404,
            body: String::new(),
        };
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn report_with_error_keeps_offers() {
        let report = ScrapeReport {
            offers: vec![NewOffer {
                id: "1".to_string(),
                title: "Engineer".to_string(),
                company: "Acme".to_string(),
                location: "Berlin".to_string(),
                posted_at: chrono::NaiveDate::from_ymd_opt(2025, 11, 13).unwrap(),
            }],
            error: Some(ScrapeError::RetryExhausted {
                start: 10,
                attempts: 5,
                reason: "status 429".to_string(),
            }),
            pages: 1,
        };
        assert!(report.error.is_some());
        assert_eq!(report.offers.len(), 1);
    }
}
