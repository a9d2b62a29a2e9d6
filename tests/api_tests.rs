mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{MockScraper, offer, scheduler};
use http_body_util::BodyExt;
use jobfeed::api::{self, AppState};
use jobfeed::services::{DefaultFeedService, FeedService};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tower::ServiceExt;

async fn spawn_app() -> Router {
    spawn_app_with_metrics(None).await
}

async fn spawn_app_with_metrics(handle: Option<PrometheusHandle>) -> Router {
    let scraper = MockScraper::new(vec![offer("4322119156", 1), offer("4322119157", 3)]);
    let scheduler = scheduler(scraper).await;
    let store = scheduler.lifecycle().store().clone();
    let feeds: Arc<dyn FeedService> = Arc::new(DefaultFeedService::new(scheduler));

    let mut config = common::test_config();
    config.server.public_url = Some("https://jobs.example".to_string());

    api::router(AppState::new(Arc::new(config), store, feeds, handle))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn create_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/feeds")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn feed_request(query: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/feeds?{query}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_create_feed_returns_feed_url() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(create_request("keywords=GoLang&location=+Berlin+"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["keywords"], "golang");
    assert_eq!(json["data"]["location"], "berlin");
    assert_eq!(
        json["data"]["feed_url"],
        "https://jobs.example/feeds?keywords=golang&location=berlin"
    );
}

#[tokio::test]
async fn test_create_feed_requires_params() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(create_request("keywords=golang"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_string(response).await;
    assert!(body.contains("missing params: location"));
}

#[tokio::test]
async fn test_feed_lists_offers_as_rss() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(create_request("keywords=golang&location=berlin"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(feed_request("keywords=golang&location=berlin"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/rss+xml")
    );

    let xml = body_string(response).await;
    assert_eq!(xml.matches("<item>").count(), 2);
    assert!(xml.contains("<link>https://www.linkedin.com/jobs/view/4322119156</link>"));
    assert!(xml.contains("Engineer 4322119156 at Acme (Berlin, posted"));
}

#[tokio::test]
async fn test_unknown_feed_is_not_found() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(feed_request("keywords=cobol&location=moon"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let xml = body_string(response).await;
    assert!(xml.contains("<title>Feed not found</title>"));
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["database"], true);
}

#[tokio::test]
async fn test_metrics_disabled_message() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Metrics not enabled"));
}

#[tokio::test]
async fn test_metrics_report_http_requests() {
    // The only test in this binary that installs a global recorder.
    let handle = PrometheusBuilder::new().install_recorder().unwrap();
    let app = spawn_app_with_metrics(Some(handle)).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_string(response).await;
    assert!(body.contains("jobfeed_http_requests_total"), "{body}");
    assert!(body.contains("jobfeed_http_request_duration_seconds"));
    assert!(!body.contains("\nhttp_requests_total"));
}
