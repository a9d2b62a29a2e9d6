use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::config::ScraperConfig;
use crate::scrape::{FetchOutcome, PageFetcher, PageRequest, ScrapeError};

const JOB_VIEW_BASE: &str = "https://www.linkedin.com/jobs/view/";

/// Longest error body kept in a [`ScrapeError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Public link to a job posting.
#[must_use]
pub fn job_view_url(offer_id: &str) -> String {
    format!("{JOB_VIEW_BASE}{offer_id}")
}

/// Guest job search client. One call fetches one page of job cards.
#[derive(Clone)]
pub struct LinkedInClient {
    client: Client,
    base_url: Url,
    retryable: HashSet<u16>,
}

impl LinkedInClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

        let base_url = Url::parse(&config.base_url)?;

        Ok(Self {
            client,
            base_url,
            retryable: config.retryable_set(),
        })
    }

    /// `keywords`, `location`, `start` (omitted for the first page) and the
    /// posted-within filter `f_TPR=r<seconds>`.
    #[must_use]
    pub fn search_url(&self, request: &PageRequest) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("keywords", &request.keywords)
                .append_pair("location", &request.location);
            if request.start != 0 {
                pairs.append_pair("start", &request.start.to_string());
            }
            pairs.append_pair("f_TPR", &format!("r{}", request.window_seconds));
        }
        url
    }

    #[must_use]
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retryable.contains(&status.as_u16())
    }

    fn classify_transport(request: &PageRequest, err: reqwest::Error) -> FetchOutcome {
        if err.is_timeout() || err.is_connect() {
            FetchOutcome::Retryable(format!("transport error: {err}"))
        } else {
            FetchOutcome::Fatal(ScrapeError::Transport {
                start: request.start,
                source: err,
            })
        }
    }
}

#[async_trait]
impl PageFetcher for LinkedInClient {
    async fn fetch_page(&self, request: &PageRequest) -> FetchOutcome {
        let url = self.search_url(request);
        debug!(url = %url, "Fetching job board page");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => return Self::classify_transport(request, err),
        };

        let status = response.status();

        if status == StatusCode::OK {
            return match response.text().await {
                Ok(body) => FetchOutcome::Success(body),
                Err(err) if err.is_timeout() => {
                    FetchOutcome::Retryable(format!("timed out reading body: {err}"))
                }
                Err(err) => FetchOutcome::Fatal(ScrapeError::Extract {
                    start: request.start,
                    reason: err.to_string(),
                }),
            };
        }

        if self.is_retryable_status(status) {
            return FetchOutcome::Retryable(format!("status {}", status.as_u16()));
        }

        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_ERROR_BODY)
            .collect();

        FetchOutcome::Fatal(ScrapeError::Status {
            start: request.start,
            status: status.as_u16(),
            body,
        })
    }
}
