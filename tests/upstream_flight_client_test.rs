//! End-to-end scenarios against a mocked OpenSky-compatible provider.

use serde_json::json;
use soar_aggregator::error::UpstreamErrorKind;
use soar_aggregator::token_manager::TokenManager;
use soar_aggregator::upstream::UpstreamFlightClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Scenario 1: a single returned state vector parses into one raw row.
#[tokio::test]
async fn fetch_states_parses_one_row() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/states/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "time": 1_700_000_000i64,
            "states": [[
                "abc123", "LH1234 ", "Germany", 1_700_000_000i64, 1_700_000_000i64,
                14.50, 50.10, 10000.0, false, 250.0, 90.0, 0.0, null, 10000.0, "1000", false, 0
            ]]
        })))
        .mount(&server)
        .await;

    let client = UpstreamFlightClient::new(
        reqwest::Client::new(),
        format!("{}/states/all", server.uri()),
        format!("{}/tracks/all", server.uri()),
    );

    let rows = client.fetch_states((49.0, 13.0, 51.0, 15.0), None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].icao24, "abc123");
    assert_eq!(rows[0].callsign.as_deref(), Some("LH1234 "));
}

/// Scenario 2: an upstream 503 surfaces as a structured `opensky` error, not
/// a panic or a generic network failure.
#[tokio::test]
async fn fetch_states_surfaces_503_as_opensky_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/states/all"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = UpstreamFlightClient::new(
        reqwest::Client::new(),
        format!("{}/states/all", server.uri()),
        format!("{}/tracks/all", server.uri()),
    );

    let err = client.fetch_states((49.0, 13.0, 51.0, 15.0), None).await.unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::Opensky);
    assert_eq!(err.status_code, Some(503));
}

/// Scenario 3: a 401 on the first attempt forces exactly one token refresh,
/// and the retried request succeeds.
#[tokio::test]
async fn fetch_states_retries_once_after_401() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "expires_in": 1800
        })))
        .mount(&server)
        .await;

    // Mounted first so it has lower match priority than the 401 mock below;
    // it only takes over once the 401 mock's one-shot allowance is spent.
    Mock::given(method("GET"))
        .and(path("/states/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "time": 1, "states": [] })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/states/all"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let token_manager = TokenManager::new(
        "client".to_string(),
        "secret".to_string(),
        format!("{}/oauth/token", server.uri()),
        reqwest::Client::new(),
    );

    let client = UpstreamFlightClient::new(
        reqwest::Client::new(),
        format!("{}/states/all", server.uri()),
        format!("{}/tracks/all", server.uri()),
    );

    let rows = client
        .fetch_states((49.0, 13.0, 51.0, 15.0), Some(token_manager.as_ref()))
        .await
        .unwrap();
    assert!(rows.is_empty());

    let status = token_manager.status().await;
    assert!(status.last_auth_success_at.is_some());
}
