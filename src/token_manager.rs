//! OAuth2 client-credentials token manager.
//!
//! Coalesces concurrent refreshes behind a single in-flight request using
//! `futures_util::future::Shared`, the same guarded-shared-state idiom
//! `geocoding/nominatim.rs` uses for its rate-limit timestamp, generalized
//! here from "wait out a cooldown" to "wait for one shared future".

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use futures_util::future::{FutureExt, Shared};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use crate::models::Token;

/// Mirrors the public `status()` contract exactly: every field the caller
/// can observe without also knowing the current token value.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub credentials_configured: bool,
    pub last_auth_success_at: Option<chrono::DateTime<Utc>>,
    pub last_auth_error_at: Option<chrono::DateTime<Utc>>,
    pub last_auth_error_message: Option<String>,
    pub token_expires_at: Option<chrono::DateTime<Utc>>,
}

fn default_expires_in() -> i64 {
    1800
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

type RefreshFuture = Shared<std::pin::Pin<Box<dyn std::future::Future<Output = Result<Token, String>> + Send>>>;

/// Owns the OAuth credential pair for exactly one session (or the server's
/// own anonymous-provider credentials) and refreshes the access token on
/// demand, coalescing concurrent callers into a single upstream request.
pub struct TokenManager {
    client_id: String,
    client_secret: String,
    token_url: String,
    http: reqwest::Client,
    current: RwLock<Option<Token>>,
    in_flight: Mutex<Option<RefreshFuture>>,
    last_auth_success_at: RwLock<Option<chrono::DateTime<Utc>>>,
    last_auth_error_at: RwLock<Option<chrono::DateTime<Utc>>>,
    last_auth_error_message: RwLock<Option<String>>,
}

impl TokenManager {
    pub fn new(client_id: String, client_secret: String, token_url: String, http: reqwest::Client) -> Arc<Self> {
        Arc::new(Self {
            client_id,
            client_secret,
            token_url,
            http,
            current: RwLock::new(None),
            in_flight: Mutex::new(None),
            last_auth_success_at: RwLock::new(None),
            last_auth_error_at: RwLock::new(None),
            last_auth_error_message: RwLock::new(None),
        })
    }

    /// Whether this instance was constructed with a non-empty credential
    /// pair. Always true today since every call site only builds a
    /// `TokenManager` once it has a client id/secret in hand; kept as an
    /// explicit check so a future caller with optional credentials has
    /// somewhere correct to look.
    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Forces the next `get_token()` call to refresh, discarding whatever
    /// token is currently cached. Used by `/opensky/reconnect` and by tests
    /// that need to observe a fresh refresh deterministically.
    pub async fn invalidate_token(&self) {
        *self.current.write().await = None;
    }

    /// Returns a currently-valid access token, refreshing first if needed.
    /// Concurrent callers during a refresh all await the same upstream call.
    pub async fn get_token(&self) -> Result<String> {
        {
            let guard = self.current.read().await;
            if let Some(token) = guard.as_ref() {
                if token.expires_at > Utc::now() + chrono::Duration::seconds(60) {
                    return Ok(token.access_token.clone());
                }
            }
        }
        self.refresh().await
    }

    /// Forces a refresh regardless of the current token's validity, used
    /// after a 401 from the upstream provider.
    pub async fn force_refresh(&self) -> Result<String> {
        self.refresh().await
    }

    async fn refresh(&self) -> Result<String> {
        let mut in_flight = self.in_flight.lock().await;

        let fut = match in_flight.as_ref() {
            Some(shared) => shared.clone(),
            None => {
                let client_id = self.client_id.clone();
                let client_secret = self.client_secret.clone();
                let token_url = self.token_url.clone();
                let http = self.http.clone();

                let task: std::pin::Pin<Box<dyn std::future::Future<Output = Result<Token, String>> + Send>> =
                    Box::pin(async move { fetch_token(&http, &token_url, &client_id, &client_secret).await.map_err(|e| e.to_string()) });
                let shared: RefreshFuture = task.shared();
                *in_flight = Some(shared.clone());
                shared
            }
        };
        drop(in_flight);

        let result = fut.await;

        let mut slot = self.in_flight.lock().await;
        *slot = None;
        drop(slot);

        match result {
            Ok(token) => {
                let access_token = token.access_token.clone();
                *self.current.write().await = Some(token);
                *self.last_auth_success_at.write().await = Some(Utc::now());
                metrics::counter!("token_refresh_success_total").increment(1);
                Ok(access_token)
            }
            Err(message) => {
                *self.last_auth_error_at.write().await = Some(Utc::now());
                *self.last_auth_error_message.write().await = Some(message.clone());
                metrics::counter!("token_refresh_failure_total").increment(1);
                bail!("token refresh failed: {message}")
            }
        }
    }

    pub async fn status(&self) -> TokenStatus {
        TokenStatus {
            credentials_configured: self.has_credentials(),
            last_auth_success_at: *self.last_auth_success_at.read().await,
            last_auth_error_at: *self.last_auth_error_at.read().await,
            last_auth_error_message: self.last_auth_error_message.read().await.clone(),
            token_expires_at: self.current.read().await.as_ref().map(|t| t.expires_at),
        }
    }
}

async fn fetch_token(http: &reqwest::Client, token_url: &str, client_id: &str, client_secret: &str) -> Result<Token> {
    let params = [
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];

    let response = http
        .post(token_url)
        .form(&params)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .context("token endpoint request failed")?;

    if !response.status().is_success() {
        bail!("token endpoint returned status {}", response.status());
    }

    let body: TokenResponse = response.json().await.context("token endpoint returned unparseable body")?;

    Ok(Token {
        access_token: body.access_token,
        expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
    })
}
