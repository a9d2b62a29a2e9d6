mod common;

use common::{Failure, MockScraper, backdate_read, offers, scheduler, scheduler_with, test_config};
use jobfeed::config::SchedulerConfig;
use jobfeed::domain::QueryTag;
use jobfeed::services::{CycleOutcome, DefaultFeedService, FeedError, FeedService};
use std::time::{Duration, Instant};

#[tokio::test]
async fn create_runs_first_scrape_before_returning() {
    let scraper = MockScraper::new(offers(5));
    let scheduler = scheduler(scraper.clone()).await;

    let created = scheduler.create_and_schedule("golang", "berlin").await.unwrap();
    assert!(created);
    assert_eq!(scraper.finished(), 1);
    assert_eq!(scheduler.scheduled_count().await, 1);

    let store = scheduler.lifecycle().store();
    assert_eq!(store.count_offers().await.unwrap(), 5);
    let query = store.get_query("golang", "berlin").await.unwrap();
    assert!(query.updated_at.is_some());
    assert!(scheduler.is_scheduled(query.id).await);
}

#[tokio::test]
async fn duplicate_create_changes_nothing() {
    let scraper = MockScraper::new(offers(1));
    let scheduler = scheduler(scraper.clone()).await;

    assert!(scheduler.create_and_schedule("golang", "berlin").await.unwrap());
    assert!(!scheduler.create_and_schedule("golang", "berlin").await.unwrap());

    assert_eq!(scheduler.scheduled_count().await, 1);
    assert_eq!(scheduler.lifecycle().store().list_queries().await.unwrap().len(), 1);
    assert_eq!(scraper.calls(), 1);
}

#[tokio::test]
async fn slow_first_run_does_not_block_creation() {
    let scraper = MockScraper::slow(offers(2), Duration::from_secs(3));
    let config = SchedulerConfig {
        first_run_timeout_seconds: 1,
        ..test_config().scheduler
    };
    let scheduler = scheduler_with(scraper.clone(), config).await;

    let started = Instant::now();
    let created = scheduler.create_and_schedule("golang", "berlin").await.unwrap();
    assert!(created);
    assert!(started.elapsed() < Duration::from_millis(2500));
    assert_eq!(scraper.finished(), 0);

    // The run carries on in the background and shutdown waits for it.
    scheduler.shutdown().await.unwrap();
    assert_eq!(scraper.finished(), 1);
    assert_eq!(scheduler.lifecycle().store().count_offers().await.unwrap(), 2);
}

#[tokio::test]
async fn transient_failure_queues_one_retry() {
    let scraper = MockScraper::failing(offers(10), Failure::Retryable);
    let scheduler = scheduler(scraper.clone()).await;

    scheduler.create_and_schedule("golang", "berlin").await.unwrap();
    let query = scheduler
        .lifecycle()
        .store()
        .get_query("golang", "berlin")
        .await
        .unwrap();

    assert!(scheduler.has_pending_retry(query.id).await);
    assert_eq!(scheduler.pending_retries().await, 1);
    assert_eq!(scheduler.lifecycle().store().count_offers().await.unwrap(), 10);

    // Another failing run does not stack a second retry.
    let outcome = scheduler.run_now(query.id).await.unwrap();
    assert_eq!(outcome, CycleOutcome::RetryScheduled);
    assert_eq!(scheduler.pending_retries().await, 1);

    // The recurring job is still there.
    assert!(scheduler.is_scheduled(query.id).await);
}

#[tokio::test]
async fn fatal_failure_keeps_schedule_without_retry() {
    let scraper = MockScraper::failing(Vec::new(), Failure::Fatal);
    let scheduler = scheduler(scraper).await;

    scheduler.create_and_schedule("golang", "berlin").await.unwrap();
    assert_eq!(scheduler.scheduled_count().await, 1);
    assert_eq!(scheduler.pending_retries().await, 0);
}

#[tokio::test]
async fn stale_query_is_unscheduled_and_feed_disappears() {
    let scraper = MockScraper::new(offers(3));
    let scheduler = scheduler(scraper.clone()).await;
    let feeds = DefaultFeedService::new(scheduler.clone());

    feeds.create_query("golang", "berlin").await.unwrap();
    let store = scheduler.lifecycle().store();
    let query = store.get_query("golang", "berlin").await.unwrap();

    backdate_read(store, query.id, 8).await;
    let outcome = scheduler.run_now(query.id).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Expired);
    assert_eq!(scraper.calls(), 1, "expired run must not scrape");

    assert!(!scheduler.is_scheduled(query.id).await);
    assert_eq!(scheduler.scheduled_count().await, 0);

    let err = feeds.list_offers("golang", "berlin").await.unwrap_err();
    assert!(matches!(err, FeedError::NotFound(_)));
}

#[tokio::test]
async fn reading_the_feed_keeps_query_alive() {
    let scraper = MockScraper::new(offers(3));
    let scheduler = scheduler(scraper.clone()).await;
    let feeds = DefaultFeedService::new(scheduler.clone());

    feeds.create_query("golang", "berlin").await.unwrap();
    let store = scheduler.lifecycle().store();
    let query = store.get_query("golang", "berlin").await.unwrap();

    backdate_read(store, query.id, 8).await;
    let listed = feeds.list_offers("golang", "berlin").await.unwrap();
    assert_eq!(listed.len(), 3);

    let outcome = scheduler.run_now(query.id).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Completed { .. }));
    assert!(scheduler.is_scheduled(query.id).await);
}

#[tokio::test]
async fn overlapping_trigger_is_skipped() {
    let scraper = MockScraper::slow(offers(1), Duration::from_millis(500));
    let config = SchedulerConfig {
        first_run_timeout_seconds: 0,
        ..test_config().scheduler
    };
    let scheduler = scheduler_with(scraper.clone(), config).await;

    scheduler.create_and_schedule("golang", "berlin").await.unwrap();
    let query = scheduler
        .lifecycle()
        .store()
        .get_query("golang", "berlin")
        .await
        .unwrap();

    // First run is still sleeping inside the scraper.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = scheduler.run_now(query.id).await;
    assert!(second.is_err(), "overlapping run should be skipped");

    scheduler.shutdown().await.unwrap();
    assert_eq!(scraper.calls(), 1);
}

#[tokio::test]
async fn remove_by_tag_cancels_job() {
    let scheduler = scheduler(MockScraper::new(Vec::new())).await;

    scheduler.create_and_schedule("golang", "berlin").await.unwrap();
    scheduler.create_and_schedule("rust", "berlin").await.unwrap();
    assert_eq!(scheduler.scheduled_count().await, 2);

    assert!(scheduler.remove_by_tag(&QueryTag::new("golang", "berlin")).await.unwrap());
    assert!(!scheduler.remove_by_tag(&QueryTag::new("golang", "berlin")).await.unwrap());
    assert_eq!(scheduler.scheduled_count().await, 1);
}

#[tokio::test]
async fn start_replays_stored_queries() {
    let scraper = MockScraper::new(Vec::new());
    let scheduler = scheduler(scraper.clone()).await;
    let store = scheduler.lifecycle().store();

    let go = store.create_query("golang", "berlin").await.unwrap();
    store.create_query("rust", "hamburg").await.unwrap();

    scheduler.start().await.unwrap();
    assert_eq!(scheduler.scheduled_count().await, 2);

    // Registering again is a no-op.
    assert!(!scheduler.schedule_query(&go).await.unwrap());
    assert_eq!(scheduler.scheduled_count().await, 2);

    // Replay does not scrape; the hourly job does.
    assert_eq!(scraper.calls(), 0);

    scheduler.shutdown().await.unwrap();
}

async fn wait_until<F, Fut>(deadline: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let started = Instant::now();
    while started.elapsed() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    check().await
}

#[tokio::test]
async fn pending_retry_fires_and_completes() {
    let scraper = MockScraper::failing(offers(4), Failure::Retryable);
    let config = SchedulerConfig {
        retry_delay_seconds: 1,
        ..test_config().scheduler
    };
    let scheduler = scheduler_with(scraper.clone(), config).await;
    scheduler.start().await.unwrap();

    scheduler.create_and_schedule("golang", "berlin").await.unwrap();
    let store = scheduler.lifecycle().store();
    let query = store.get_query("golang", "berlin").await.unwrap();

    assert!(scheduler.has_pending_retry(query.id).await);
    assert!(store.get_query_by_id(query.id).await.unwrap().updated_at.is_none());
    // A second retry cannot be queued on top of the pending one.
    assert!(
        !scheduler
            .schedule_one_off(Duration::from_secs(1), query.id)
            .await
            .unwrap()
    );

    scraper.set_failure(Failure::None);

    // Not before the configured delay.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(scraper.calls(), 1);

    let id = query.id;
    let completed = wait_until(Duration::from_secs(6), move || async move {
        store
            .get_query_by_id(id)
            .await
            .is_ok_and(|q| q.updated_at.is_some())
    })
    .await;
    assert!(completed, "retry never ran");

    assert_eq!(scraper.calls(), 2);
    assert!(!scheduler.has_pending_retry(query.id).await);
    assert_eq!(scheduler.pending_retries().await, 0);
    assert!(scheduler.is_scheduled(query.id).await);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn retry_of_stale_query_unschedules_it() {
    let scraper = MockScraper::failing(offers(1), Failure::Retryable);
    let config = SchedulerConfig {
        retry_delay_seconds: 1,
        ..test_config().scheduler
    };
    let scheduler = scheduler_with(scraper.clone(), config).await;
    scheduler.start().await.unwrap();

    scheduler.create_and_schedule("golang", "berlin").await.unwrap();
    let store = scheduler.lifecycle().store();
    let query = store.get_query("golang", "berlin").await.unwrap();
    assert!(scheduler.has_pending_retry(query.id).await);

    backdate_read(store, query.id, 8).await;

    let (id, sched) = (query.id, &scheduler);
    let removed = wait_until(Duration::from_secs(6), move || async move {
        !sched.is_scheduled(id).await
    })
    .await;
    assert!(removed, "stale query still scheduled");

    assert_eq!(scraper.calls(), 1, "expired retry must not scrape");
    assert!(store.get_query_by_id(query.id).await.unwrap_err().is_not_found());

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_gives_up_after_grace_period() {
    let scraper = MockScraper::slow(offers(1), Duration::from_secs(10));
    let config = SchedulerConfig {
        first_run_timeout_seconds: 0,
        shutdown_grace_seconds: 1,
        ..test_config().scheduler
    };
    let scheduler = scheduler_with(scraper.clone(), config).await;

    scheduler.create_and_schedule("golang", "berlin").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(scraper.calls(), 1);

    let started = Instant::now();
    scheduler.shutdown().await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(900), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "returned after {elapsed:?}");
    assert_eq!(scraper.finished(), 0);
}
