#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use jobfeed::config::{Config, SchedulerConfig};
use jobfeed::db::Store;
use jobfeed::domain::QueryId;
use jobfeed::entities::queries;
use jobfeed::models::{NewOffer, Query};
use jobfeed::scheduler::QueryScheduler;
use jobfeed::scrape::{ScrapeError, ScrapeReport, Scraper};
use jobfeed::services::LifecycleManager;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Copy, Debug)]
pub enum Failure {
    None,
    Retryable,
    Fatal,
}

/// Scraper double returning the same offers for every query.
pub struct MockScraper {
    offers: Mutex<Vec<NewOffer>>,
    failure: Mutex<Failure>,
    delay: std::time::Duration,
    calls: AtomicUsize,
    finished: AtomicUsize,
}

impl MockScraper {
    pub fn new(offers: Vec<NewOffer>) -> Arc<Self> {
        Arc::new(Self::build(offers, Failure::None, std::time::Duration::ZERO))
    }

    pub fn failing(offers: Vec<NewOffer>, failure: Failure) -> Arc<Self> {
        Arc::new(Self::build(offers, failure, std::time::Duration::ZERO))
    }

    pub fn slow(offers: Vec<NewOffer>, delay: std::time::Duration) -> Arc<Self> {
        Arc::new(Self::build(offers, Failure::None, delay))
    }

    fn build(offers: Vec<NewOffer>, failure: Failure, delay: std::time::Duration) -> Self {
        Self {
            offers: Mutex::new(offers),
            failure: Mutex::new(failure),
            delay,
            calls: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn set_failure(&self, failure: Failure) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn set_offers(&self, offers: Vec<NewOffer>) {
        *self.offers.lock().unwrap() = offers;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scraper for MockScraper {
    async fn scrape(&self, _query: &Query) -> ScrapeReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let offers = self.offers.lock().unwrap().clone();
        let error = match *self.failure.lock().unwrap() {
            Failure::None => None,
            Failure::Retryable => Some(ScrapeError::RetryExhausted {
                start: 10,
                attempts: 5,
                reason: "status 429".to_string(),
            }),
            Failure::Fatal => Some(ScrapeError::Status {
                start: 0,
                status: 404,
                body: "not found".to_string(),
            }),
        };

        self.finished.fetch_add(1, Ordering::SeqCst);
        ScrapeReport {
            offers,
            error,
            pages: 1,
        }
    }
}

pub fn offer(id: &str, posted_days_ago: i64) -> NewOffer {
    NewOffer {
        id: id.to_string(),
        title: format!("Engineer {id}"),
        company: "Acme".to_string(),
        location: "Berlin".to_string(),
        posted_at: Utc::now().date_naive() - Duration::days(posted_days_ago),
    }
}

pub fn offers(count: usize) -> Vec<NewOffer> {
    (0..count).map(|i| offer(&format!("{}", 1000 + i), 1)).collect()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.scheduler = SchedulerConfig {
        first_run_timeout_seconds: 5,
        retry_delay_seconds: 300,
        shutdown_grace_seconds: 5,
        ..SchedulerConfig::default()
    };
    config
}

pub async fn lifecycle(scraper: Arc<dyn Scraper>) -> Arc<LifecycleManager> {
    let store = Store::in_memory().await.expect("in-memory store");
    Arc::new(LifecycleManager::new(
        store,
        scraper,
        test_config().lifecycle,
    ))
}

pub async fn scheduler_with(
    scraper: Arc<dyn Scraper>,
    config: SchedulerConfig,
) -> QueryScheduler {
    QueryScheduler::new(lifecycle(scraper).await, config)
        .await
        .expect("scheduler")
}

pub async fn scheduler(scraper: Arc<dyn Scraper>) -> QueryScheduler {
    scheduler_with(scraper, test_config().scheduler).await
}

/// Pretends nobody read the feed for `days` days.
pub async fn backdate_read(store: &Store, id: QueryId, days: i64) {
    queries::Entity::update_many()
        .col_expr(
            queries::Column::QueriedAt,
            Expr::value(Utc::now() - Duration::days(days)),
        )
        .filter(queries::Column::Id.eq(id.value()))
        .exec(&store.conn)
        .await
        .unwrap();
}
