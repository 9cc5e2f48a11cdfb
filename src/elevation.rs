//! Elevation lookup provider client.
//!
//! Same moka-backed caching idiom as `elevation/service.rs`, adapted from a
//! local HGT-tile lookup to a third-party HTTP lookup provider.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::Cache;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_COUNT: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Serialize)]
struct LookupLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Serialize)]
struct LookupRequest {
    locations: Vec<LookupLocation>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    elevation: f64,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

pub struct ElevationClient {
    http: reqwest::Client,
    api_url: String,
    cache: Arc<Cache>,
}

impl ElevationClient {
    pub fn new(http: reqwest::Client, api_url: String, cache: Arc<Cache>) -> Self {
        Self { http, api_url, cache }
    }

    pub async fn lookup(&self, latitude: f64, longitude: f64) -> anyhow::Result<f64> {
        let cache_key = format!("elevation_{:.6}_{:.6}", latitude, longitude);

        if let Some(Some(cached)) = self.cache.get::<f64>(&cache_key).await {
            return Ok(cached);
        }

        let elevation = self.lookup_with_retry(latitude, longitude).await?;
        self.cache.set(&cache_key, Some(&elevation), CACHE_TTL).await;
        Ok(elevation)
    }

    async fn lookup_with_retry(&self, latitude: f64, longitude: f64) -> anyhow::Result<f64> {
        let body = LookupRequest {
            locations: vec![LookupLocation { latitude, longitude }],
        };

        let mut last_err = None;
        for attempt in 0..=RETRY_COUNT {
            if attempt > 0 {
                tokio::time::sleep(RETRY_DELAY).await;
            }

            match self
                .http
                .post(&self.api_url)
                .json(&body)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => match response.json::<LookupResponse>().await {
                    Ok(parsed) => {
                        if let Some(result) = parsed.results.first() {
                            return Ok(result.elevation);
                        }
                        last_err = Some(anyhow::anyhow!("elevation provider returned no results"));
                    }
                    Err(e) => last_err = Some(anyhow::anyhow!("malformed elevation response: {e}")),
                },
                Ok(response) => {
                    last_err = Some(anyhow::anyhow!("elevation provider returned status {}", response.status()));
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!("elevation provider request failed: {e}"));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("elevation lookup failed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_quantises_to_six_decimals() {
        let key = format!("elevation_{:.6}_{:.6}", 50.0755123456, 14.4378123456);
        assert_eq!(key, "elevation_50.075512_14.437812");
    }
}
