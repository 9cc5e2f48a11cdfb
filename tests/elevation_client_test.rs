//! ElevationClient retry-then-succeed and caching behaviour.

use serde_json::json;
use soar_aggregator::cache::Cache;
use soar_aggregator::elevation::ElevationClient;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn lookup_retries_past_a_transient_failure() {
    let server = MockServer::start().await;

    // Mounted first (lower match priority) as the eventual successful reply.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "elevation": 245.3 }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let client = ElevationClient::new(reqwest::Client::new(), server.uri(), Cache::new(10));

    let elevation = client.lookup(50.0755, 14.4378).await.unwrap();
    assert!((elevation - 245.3).abs() < 1e-6);
}

#[tokio::test]
async fn repeated_lookups_at_the_same_location_hit_the_cache() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "elevation": 100.0 }]
        })))
        .mount(&server)
        .await;

    let client = ElevationClient::new(reqwest::Client::new(), server.uri(), Cache::new(10));

    client.lookup(10.0, 20.0).await.unwrap();
    client.lookup(10.0, 20.0).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "second lookup at the same coordinates should be served from cache");
}
