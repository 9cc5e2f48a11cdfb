//! BYOK session store.
//!
//! Concurrent map of live sessions plus a background sweep, mirroring the
//! `Arc<DashMap<...>>` shape `flight_tracker/mod.rs` uses for its
//! `AircraftStatesMap`, generalized here to session entries with their own
//! per-entry `TokenManager`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;

use crate::models::Session;
use crate::token_manager::TokenManager;

pub struct SessionEntry {
    pub session: Session,
    pub token_manager: Arc<TokenManager>,
}

/// 128 random bits, hex-encoded — opaque to the client, never logged
/// verbatim.
fn generate_session_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Live BYOK sessions, keyed by opaque session id. Purely in-memory by
/// design — a process restart drops every session and forces clients to
/// re-authenticate.
pub struct SessionStore {
    sessions: DashMap<String, Arc<SessionEntry>>,
    token_url: String,
    http: reqwest::Client,
}

impl SessionStore {
    pub fn new(token_url: String, http: reqwest::Client) -> Arc<Self> {
        let store = Arc::new(Self {
            sessions: DashMap::new(),
            token_url,
            http,
        });
        store.clone().spawn_sweep();
        store
    }

    pub fn create(&self, client_id: String, client_secret: String) -> String {
        let session_id = generate_session_token();
        let session = Session::new(client_id.clone(), client_secret.clone());
        let token_manager = TokenManager::new(client_id, client_secret, self.token_url.clone(), self.http.clone());

        self.sessions.insert(
            session_id.clone(),
            Arc::new(SessionEntry { session, token_manager }),
        );
        metrics::gauge!("sessions_active").increment(1.0);
        session_id
    }

    pub fn resolve(&self, session_id: &str) -> Option<Arc<SessionEntry>> {
        let entry = self.sessions.get(session_id)?;
        if entry.session.is_expired(chrono::Utc::now()) {
            drop(entry);
            self.delete(session_id);
            return None;
        }
        Some(entry.clone())
    }

    pub fn has(&self, session_id: &str) -> bool {
        self.resolve(session_id).is_some()
    }

    pub fn delete(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            metrics::gauge!("sessions_active").decrement(1.0);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    fn spawn_sweep(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5 * 60));
            loop {
                interval.tick().await;
                let now = chrono::Utc::now();
                let expired: Vec<String> = self
                    .sessions
                    .iter()
                    .filter(|entry| entry.session.is_expired(now))
                    .map(|entry| entry.key().clone())
                    .collect();
                for session_id in expired {
                    self.delete(&session_id);
                }
                tracing::debug!(active = self.len(), "session sweep complete");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<SessionStore> {
        SessionStore::new("https://example.invalid/token".to_string(), reqwest::Client::new())
    }

    #[tokio::test]
    async fn create_then_resolve_round_trips() {
        let store = store();
        let id = store.create("client".to_string(), "secret".to_string());
        assert!(store.resolve(&id).is_some());
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let store = store();
        let id = store.create("client".to_string(), "secret".to_string());
        assert!(store.delete(&id));
        assert!(store.resolve(&id).is_none());
    }

    #[tokio::test]
    async fn unknown_session_resolves_to_none() {
        let store = store();
        assert!(store.resolve("nonexistent").is_none());
    }
}
