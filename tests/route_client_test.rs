//! RouteClient query-shape resolution and negative caching against a mocked
//! AviationStack-compatible provider.

use serde_json::json;
use soar_aggregator::cache::Cache;
use soar_aggregator::route_client::RouteClient;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn resolves_via_the_flight_icao_shape() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("flight_icao", "LH1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "flight_status": "active",
                "flight": { "icao": "LH1234", "number": "1234" },
                "airline": { "name": "Lufthansa" },
                "departure": { "airport": "Frankfurt", "iata": "FRA", "icao": "EDDF" },
                "arrival": { "airport": "Prague", "iata": "PRG", "icao": "LKPR" }
            }]
        })))
        .mount(&server)
        .await;

    let client = RouteClient::new(reqwest::Client::new(), server.uri(), "key".to_string(), Cache::new(10));

    let route = client.resolve("LH1234").await.expect("route should resolve");
    assert_eq!(route.airline.as_deref(), Some("Lufthansa"));
    assert_eq!(route.origin.unwrap().iata.as_deref(), Some("FRA"));
}

#[tokio::test]
async fn a_full_miss_is_cached_as_a_negative_result() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let client = RouteClient::new(reqwest::Client::new(), server.uri(), "key".to_string(), Cache::new(10));

    assert!(client.resolve("ZZ9999").await.is_none());
    let requests_after_first_call = server.received_requests().await.unwrap().len();

    // Second call must be served from the negative cache entry, not issue
    // another round of upstream requests.
    assert!(client.resolve("ZZ9999").await.is_none());
    let requests_after_second_call = server.received_requests().await.unwrap().len();
    assert_eq!(
        requests_after_first_call, requests_after_second_call,
        "a cached miss should not re-issue the query-shape sweep"
    );
}
