//! Cache strategy router over a real HTTP fetcher

use crate::common::*;
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use volunteer_sync::worker::cache::{Destination, FetchRequest, HttpFetcher, ResponseSource, RouteOutcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn fetcher() -> Arc<HttpFetcher> {
    Arc::new(HttpFetcher::new(Duration::from_millis(300)).unwrap())
}

#[tokio::test]
async fn test_api_reads_fall_back_to_cache_then_offline_body() {
    let t = TestEngine::start().await;
    Mock::given(method("GET"))
        .and(path("/api/events/evt-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "evt-7", "title": "Beach cleanup"})))
        .mount(&t.server)
        .await;

    let router = assert_ok!(t.engine.cache_router(fetcher()));
    let event_url = Url::parse(&format!("{}/api/events/evt-7", t.server.uri())).unwrap();
    let other_url = Url::parse(&format!("{}/api/organizations", t.server.uri())).unwrap();

    let online = router.handle(&FetchRequest::get(event_url.clone(), Destination::Empty)).await;
    assert_eq!(online.source(), Some(ResponseSource::Network));

    let snapshot = assert_ok!(router.entities().get("events", "evt-7").await).expect("entity snapshot");
    assert_eq!(snapshot.attributes["title"], "Beach cleanup");

    // From here on every response arrives after the fetcher gave up.
    t.server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&t.server)
        .await;

    let offline = router.handle(&FetchRequest::get(event_url, Destination::Empty)).await;
    assert_eq!(offline.source(), Some(ResponseSource::Cache));
    let body: Value = serde_json::from_slice(&offline.response().unwrap().body).unwrap();
    assert_eq!(body["title"], "Beach cleanup");

    let uncached = router.handle(&FetchRequest::get(other_url, Destination::Empty)).await;
    assert_eq!(uncached.source(), Some(ResponseSource::OfflineFallback));
    let body: Value = serde_json::from_slice(&uncached.response().unwrap().body).unwrap();
    assert_eq!(body["offline"], true);
    assert_eq!(body["data"], json!([]));

    t.engine.close().await;
}

#[tokio::test]
async fn test_cross_origin_requests_pass_through() {
    let t = TestEngine::start().await;
    let router = assert_ok!(t.engine.cache_router(fetcher()));

    let request = FetchRequest::get(Url::parse("https://cdn.example.com/lib.js").unwrap(), Destination::Script);
    assert!(matches!(router.handle(&request).await, RouteOutcome::Passthrough));
    assert_eq!(t.server.received_requests().await.unwrap().len(), 0);
}
