//! Resolves a callsign to route metadata via the AviationStack-compatible
//! provider. Same `reqwest::Client` + cache-by-key pattern
//! as `UpstreamFlightClient`, trying a ranked list of query shapes in turn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::cache::Cache;
use crate::models::{RouteEndpoint, RouteInfo};

const CACHE_TTL: Duration = Duration::from_secs(300);

/// ICAO airline prefix -> IATA equivalent, used to widen the query-shape
/// search when the ICAO-keyed shapes come up empty.
static ICAO_TO_IATA: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("CSA", "OK"),
        ("DLH", "LH"),
        ("BAW", "BA"),
        ("RYR", "FR"),
        ("EZY", "U2"),
        ("WZZ", "W6"),
        ("AFR", "AF"),
        ("KLM", "KL"),
        ("UAE", "EK"),
        ("AAL", "AA"),
        ("UAL", "UA"),
        ("DAL", "DL"),
        ("SWR", "LX"),
        ("AUA", "OS"),
        ("THY", "TK"),
    ])
});

#[derive(Debug, Deserialize)]
struct ProviderAirport {
    airport: Option<String>,
    iata: Option<String>,
    icao: Option<String>,
    scheduled: Option<chrono::DateTime<Utc>>,
    estimated: Option<chrono::DateTime<Utc>>,
    actual: Option<chrono::DateTime<Utc>>,
    gate: Option<String>,
    terminal: Option<String>,
    delay: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ProviderFlightIdentifiers {
    icao: Option<String>,
    number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderAirline {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderRow {
    flight_status: Option<String>,
    flight: Option<ProviderFlightIdentifiers>,
    airline: Option<ProviderAirline>,
    departure: Option<ProviderAirport>,
    arrival: Option<ProviderAirport>,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    data: Option<Vec<ProviderRow>>,
}

impl From<ProviderAirport> for RouteEndpoint {
    fn from(p: ProviderAirport) -> Self {
        RouteEndpoint {
            airport: p.airport,
            iata: p.iata,
            icao: p.icao,
            scheduled: p.scheduled,
            estimated: p.estimated,
            actual: p.actual,
            gate: p.gate,
            terminal: p.terminal,
            delay_minutes: p.delay,
        }
    }
}

pub struct RouteClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    cache: Arc<Cache>,
}

impl RouteClient {
    pub fn new(http: reqwest::Client, api_url: String, api_key: String, cache: Arc<Cache>) -> Self {
        Self {
            http,
            api_url,
            api_key,
            cache,
        }
    }

    pub async fn resolve(&self, callsign: &str) -> Option<RouteInfo> {
        let normalized: String = callsign.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase();
        let cache_key = format!("route_{normalized}");

        if let Some(cached) = self.cache.get::<RouteInfo>(&cache_key).await {
            return cached;
        }

        let shapes = self.query_shapes(&normalized);
        let mut result = None;

        for shape in shapes {
            if let Some(row) = self.try_shape(&shape).await {
                result = Some(row_to_route_info(&normalized, row));
                break;
            }
        }

        self.cache.set(&cache_key, result.as_ref(), CACHE_TTL).await;
        result
    }

    /// Ranked query-shape parameter lists. Deduplicated
    /// in construction order so identical shapes aren't requested twice.
    fn query_shapes(&self, callsign: &str) -> Vec<Vec<(String, String)>> {
        let mut shapes = Vec::new();
        let mut seen = std::collections::HashSet::new();

        let mut push = |shape: Vec<(String, String)>| {
            let key = format!("{shape:?}");
            if seen.insert(key) {
                shapes.push(shape);
            }
        };

        push(vec![("flight_icao".to_string(), callsign.to_string())]);

        let prefix_len = callsign.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        if prefix_len > 0 && prefix_len < callsign.len() {
            let icao_prefix = &callsign[..prefix_len];
            let number = &callsign[prefix_len..];

            push(vec![
                ("airline_icao".to_string(), icao_prefix.to_string()),
                ("flight_number".to_string(), number.to_string()),
            ]);

            let trimmed_number = number.trim_start_matches('0');
            if trimmed_number != number && !trimmed_number.is_empty() {
                push(vec![
                    ("airline_icao".to_string(), icao_prefix.to_string()),
                    ("flight_number".to_string(), trimmed_number.to_string()),
                ]);
            }

            if number.chars().last().is_some_and(|c| c.is_ascii_alphabetic()) {
                let without_suffix = &number[..number.len() - 1];
                push(vec![
                    ("airline_icao".to_string(), icao_prefix.to_string()),
                    ("flight_number".to_string(), without_suffix.to_string()),
                ]);
            }

            if let Some(iata) = ICAO_TO_IATA.get(icao_prefix) {
                push(vec![
                    ("airline_iata".to_string(), iata.to_string()),
                    ("flight_number".to_string(), number.to_string()),
                ]);
                push(vec![("flight_iata".to_string(), format!("{iata}{number}"))]);
            }
        }

        shapes
    }

    async fn try_shape(&self, params: &[(String, String)]) -> Option<ProviderRow> {
        let mut request = self.http.get(&self.api_url).query(&[("access_key", self.api_key.as_str()), ("limit", "1")]);
        for (k, v) in params {
            request = request.query(&[(k.as_str(), v.as_str())]);
        }

        let response = request.timeout(Duration::from_secs(10)).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }

        let body: ProviderResponse = response.json().await.ok()?;
        body.data?.into_iter().next()
    }
}

fn row_to_route_info(callsign: &str, row: ProviderRow) -> RouteInfo {
    RouteInfo {
        callsign: callsign.to_string(),
        flight_number: row.flight.as_ref().and_then(|f| f.number.clone()),
        airline: row.airline.and_then(|a| a.name),
        status: row.flight_status,
        origin: row.departure.map(RouteEndpoint::from),
        destination: row.arrival.map(RouteEndpoint::from),
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_shapes_include_the_flight_icao_shape_first() {
        let cache = Cache::new(10);
        let client = RouteClient::new(reqwest::Client::new(), String::new(), String::new(), cache);
        let shapes = client.query_shapes("LH1234");
        assert_eq!(shapes[0], vec![("flight_icao".to_string(), "LH1234".to_string())]);
    }

    #[test]
    fn query_shapes_split_prefix_and_number() {
        let cache = Cache::new(10);
        let client = RouteClient::new(reqwest::Client::new(), String::new(), String::new(), cache);
        let shapes = client.query_shapes("DLH123");
        assert!(shapes.iter().any(|s| s.contains(&("airline_icao".to_string(), "DLH".to_string()))));
    }

    #[test]
    fn query_shapes_are_deduplicated() {
        let cache = Cache::new(10);
        let client = RouteClient::new(reqwest::Client::new(), String::new(), String::new(), cache);
        let shapes = client.query_shapes("LH1234");
        let unique: std::collections::HashSet<String> = shapes.iter().map(|s| format!("{s:?}")).collect();
        assert_eq!(unique.len(), shapes.len());
    }
}
