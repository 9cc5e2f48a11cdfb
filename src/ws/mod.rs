//! WebSocket broadcast layer.
//!
//! `axum::extract::ws::{WebSocketUpgrade, WebSocket, Message}` split into
//! sender/receiver halves the same way `actions/fixes.rs::handle_websocket`
//! does, generalized from `fixes.rs`'s per-device broadcast to a single
//! `"flights"` topic. Liveness and per-client send-failure handling follow
//! the same shape `fixes.rs` uses for its own queue-depth tracking.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::AppState;
use crate::models::UserLocation;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_GRACE: Duration = Duration::from_secs(10);
const BROADCAST_INTERVAL: Duration = Duration::from_secs(15);

/// Hard-coded default anchor used by the periodic broadcast tick regardless
/// of a subscriber's actual location. Reproduces a known limitation of the
/// original implementation rather than fixing it — see DESIGN.md.
const BROADCAST_ANCHOR: UserLocation = UserLocation {
    latitude: 50.0755,
    longitude: 14.4378,
    altitude: 0.0,
    name: None,
};
const BROADCAST_RADIUS_KM: f64 = 100.0;

struct ClientHandle {
    sender: flume::Sender<Message>,
    subscriptions: std::sync::Mutex<HashSet<String>>,
    last_pong_at: std::sync::Mutex<std::time::Instant>,
}

pub struct WsHub {
    clients: DashMap<u64, Arc<ClientHandle>>,
    next_id: AtomicU64,
}

impl WsHub {
    pub fn new() -> Arc<Self> {
        let hub = Arc::new(Self {
            clients: DashMap::new(),
            next_id: AtomicU64::new(1),
        });
        hub.clone().spawn_liveness_loop();
        hub
    }

    fn spawn_liveness_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PING_INTERVAL);
            loop {
                interval.tick().await;
                let now = std::time::Instant::now();
                let mut stale = Vec::new();
                for entry in self.clients.iter() {
                    let last_pong = *entry.value().last_pong_at.lock().unwrap();
                    if now.duration_since(last_pong) > PING_INTERVAL + PONG_GRACE {
                        stale.push(*entry.key());
                        continue;
                    }
                    let _ = entry.value().sender.send(Message::Ping(Vec::new().into()));
                }
                for id in stale {
                    self.clients.remove(&id);
                    metrics::gauge!("websocket_connections").decrement(1.0);
                }
            }
        });
    }

    pub fn spawn_broadcast_loop(self: Arc<Self>, flight_service: Arc<crate::flight_service::FlightService>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(BROADCAST_INTERVAL);
            loop {
                interval.tick().await;

                let subscribed_count = self
                    .clients
                    .iter()
                    .filter(|entry| entry.value().subscriptions.lock().unwrap().contains("flights"))
                    .count();
                if subscribed_count == 0 {
                    continue;
                }

                let result = flight_service
                    .get_flights_in_area(&BROADCAST_ANCHOR, BROADCAST_RADIUS_KM, None)
                    .await;
                if let Some(err) = &result.error {
                    tracing::warn!(?err, "periodic broadcast upstream fetch failed, skipping this tick");
                    continue;
                }

                let payload = json!({
                    "type": "flight_update",
                    "data": result.data,
                    "timestamp": chrono::Utc::now().timestamp_millis(),
                })
                .to_string();

                for entry in self.clients.iter() {
                    if entry.value().subscriptions.lock().unwrap().contains("flights") {
                        let _ = entry.value().sender.send(Message::Text(payload.clone().into()));
                    }
                }
            }
        });
    }

    fn register(&self) -> (u64, Arc<ClientHandle>, flume::Receiver<Message>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = flume::unbounded();
        let handle = Arc::new(ClientHandle {
            sender: tx,
            subscriptions: std::sync::Mutex::new(HashSet::new()),
            last_pong_at: std::sync::Mutex::new(std::time::Instant::now()),
        });
        self.clients.insert(id, handle.clone());
        metrics::gauge!("websocket_connections").increment(1.0);
        (id, handle, rx)
    }

    fn remove(&self, id: u64) {
        self.clients.remove(&id);
        metrics::gauge!("websocket_connections").decrement(1.0);
    }
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    #[serde(rename = "subscribe_flights")]
    SubscribeFlights,
    #[serde(rename = "unsubscribe_flights")]
    UnsubscribeFlights,
    #[serde(rename = "request_flights")]
    RequestFlights { latitude: f64, longitude: f64, radius: f64 },
    #[serde(rename = "ping")]
    Ping,
}

#[derive(Serialize)]
struct ServerMessage<T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: T,
    timestamp: i64,
}

fn envelope<T: Serialize>(kind: &'static str, data: T) -> String {
    serde_json::to_string(&ServerMessage {
        kind,
        data,
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
    .unwrap_or_default()
}

pub async fn upgrade_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let hub = state.ws_hub.clone();
    let (id, handle, outbound_rx) = hub.register();

    let (mut ws_tx, mut ws_rx) = socket.split();

    let _ = ws_tx
        .send(Message::Text(
            envelope(
                "connection",
                json!({ "clientId": id, "message": "connected" }),
            )
            .into(),
        ))
        .await;

    let mut send_task = tokio::spawn(async move {
        while let Ok(message) = outbound_rx.recv_async().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    let flight_service = state.flight_service.clone();
    let handle_for_recv = handle.clone();
    let hub_for_recv = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_rx.next().await {
            match message {
                Message::Text(text) => {
                    handle_client_message(&text, &handle_for_recv, &hub_for_recv, &flight_service).await;
                }
                Message::Pong(_) => {
                    *handle_for_recv.last_pong_at.lock().unwrap() = std::time::Instant::now();
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.remove(id);
}

async fn handle_client_message(
    text: &str,
    handle: &Arc<ClientHandle>,
    hub: &Arc<WsHub>,
    flight_service: &Arc<crate::flight_service::FlightService>,
) {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    match parsed {
        Ok(ClientMessage::SubscribeFlights) => {
            handle.subscriptions.lock().unwrap().insert("flights".to_string());
            let response = envelope("subscription", json!({ "subscribed": ["flights"] }));
            let _ = handle.sender.send(Message::Text(response.into()));
        }
        Ok(ClientMessage::UnsubscribeFlights) => {
            handle.subscriptions.lock().unwrap().remove("flights");
            let response = envelope("subscription", json!({ "subscribed": [] }));
            let _ = handle.sender.send(Message::Text(response.into()));
        }
        Ok(ClientMessage::RequestFlights { latitude, longitude, radius }) => {
            let user = UserLocation {
                latitude,
                longitude,
                altitude: 0.0,
                name: None,
            };
            let result = flight_service.get_flights_in_area(&user, radius, None).await;
            let payload = envelope("flight_update", result.data);
            // Broadcast to every client subscribed to "flights",
            // not just the requester.
            for entry in hub.clients.iter() {
                if entry.value().subscriptions.lock().unwrap().contains("flights") {
                    let _ = entry.value().sender.send(Message::Text(payload.clone().into()));
                }
            }
        }
        Ok(ClientMessage::Ping) => {
            let response = envelope("pong", json!({}));
            let _ = handle.sender.send(Message::Text(response.into()));
        }
        Err(_) => {
            let response = envelope("error", json!({ "message": "unknown message type" }));
            let _ = handle.sender.send(Message::Text(response.into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &flume::Receiver<Message>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::Text(text) = msg {
                out.push(text.to_string());
            }
        }
        out
    }

    #[tokio::test]
    async fn subscribe_then_unsubscribe_clears_the_topic() {
        let hub = WsHub::new();
        let (_id, handle, rx) = hub.register();

        handle_client_message(r#"{"type":"subscribe_flights"}"#, &handle, &hub, &dummy_flight_service()).await;
        assert!(handle.subscriptions.lock().unwrap().contains("flights"));

        handle_client_message(r#"{"type":"unsubscribe_flights"}"#, &handle, &hub, &dummy_flight_service()).await;
        assert!(!handle.subscriptions.lock().unwrap().contains("flights"));

        drain(&rx);
    }

    /// A `request_flights` reply broadcasts to every
    /// client subscribed to "flights", not just the requester, and skips
    /// unsubscribed clients entirely.
    #[tokio::test]
    async fn request_flights_reaches_only_subscribed_clients() {
        let hub = WsHub::new();
        let (_id_a, handle_a, rx_a) = hub.register();
        let (_id_b, handle_b, rx_b) = hub.register();

        handle_client_message(r#"{"type":"subscribe_flights"}"#, &handle_a, &hub, &dummy_flight_service()).await;
        drain(&rx_a);
        drain(&rx_b);

        let request = r#"{"type":"request_flights","latitude":50.0,"longitude":14.0,"radius":50.0}"#;
        handle_client_message(request, &handle_a, &hub, &dummy_flight_service()).await;

        let a_messages = drain(&rx_a);
        let b_messages = drain(&rx_b);
        assert_eq!(a_messages.len(), 1);
        assert!(a_messages[0].contains("flight_update"));
        assert!(b_messages.is_empty());
    }

    /// Points at a closed local port so requests fail fast with a connection
    /// error instead of hanging on DNS resolution.
    fn dummy_flight_service() -> Arc<crate::flight_service::FlightService> {
        Arc::new(crate::flight_service::FlightService::new(
            crate::cache::Cache::new(10),
            crate::session::SessionStore::new("http://127.0.0.1:1/token".to_string(), reqwest::Client::new()),
            None,
            crate::upstream::UpstreamFlightClient::new(
                reqwest::Client::new(),
                "http://127.0.0.1:1/states".to_string(),
                "http://127.0.0.1:1/tracks".to_string(),
            ),
        ))
    }
}
