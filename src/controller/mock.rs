//! In-process controller used by tests: REST state/config endpoints and the
//! WebSocket auth + command protocol on one local port.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::ControllerClient;

pub const MOCK_TOKEN: &str = "test-token";

type CommandHandler = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

#[derive(Default)]
struct MockStats {
    sessions: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

#[derive(Clone)]
struct MockState {
    states: Option<Value>,
    rest_automations: Option<Value>,
    handler: CommandHandler,
    delay: Duration,
    rest_delay: Duration,
    greeting: Value,
    stats: Arc<MockStats>,
    commands: Arc<Mutex<Vec<Value>>>,
}

pub struct MockControllerBuilder {
    states: Option<Value>,
    rest_automations: Option<Value>,
    handler: CommandHandler,
    delay: Duration,
    rest_delay: Duration,
    greeting: Value,
}

pub struct MockController {
    base_url: String,
    stats: Arc<MockStats>,
    commands: Arc<Mutex<Vec<Value>>>,
}

impl MockController {
    /// Controller with no states (REST 500), no legacy config (404) and a
    /// WebSocket that rejects every command as unknown.
    pub fn builder() -> MockControllerBuilder {
        MockControllerBuilder {
            states: None,
            rest_automations: None,
            handler: Arc::new(|_| {
                Some(json!({
                    "success": false,
                    "error": {"code": "unknown_command", "message": "Unknown command."}
                }))
            }),
            delay: Duration::ZERO,
            rest_delay: Duration::ZERO,
            greeting: json!({"type": "auth_required", "ha_version": "2024.6.0"}),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> ControllerClient {
        self.client_with_token(MOCK_TOKEN)
    }

    pub fn client_with_token(&self, token: &str) -> ControllerClient {
        ControllerClient::new(
            &self.base_url,
            token.to_string(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    pub fn client_with_timeouts(&self, ws_timeout: Duration) -> ControllerClient {
        ControllerClient::new(
            &self.base_url,
            MOCK_TOKEN.to_string(),
            Duration::from_secs(5),
            ws_timeout,
        )
        .unwrap()
    }

    pub fn client_with_rest_timeout(&self, rest_timeout: Duration) -> ControllerClient {
        ControllerClient::new(
            &self.base_url,
            MOCK_TOKEN.to_string(),
            rest_timeout,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    /// Every command frame received so far, across sessions
    pub fn commands(&self) -> Vec<Value> {
        self.commands.lock().unwrap().clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.stats.sessions.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.stats.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl MockControllerBuilder {
    pub fn states(mut self, states: Value) -> Self {
        self.states = Some(states);
        self
    }

    pub fn rest_automations(mut self, automations: Value) -> Self {
        self.rest_automations = Some(automations);
        self
    }

    /// Reply body for each command; `None` drops the connection
    pub fn on_command<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    /// Pause before answering each WebSocket command
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Pause before answering each REST request
    pub fn rest_delay(mut self, delay: Duration) -> Self {
        self.rest_delay = delay;
        self
    }

    /// First frame sent on a new WebSocket instead of `auth_required`
    pub fn greeting(mut self, greeting: Value) -> Self {
        self.greeting = greeting;
        self
    }

    pub async fn start(self) -> MockController {
        let stats = Arc::new(MockStats::default());
        let commands = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            states: self.states,
            rest_automations: self.rest_automations,
            handler: self.handler,
            delay: self.delay,
            rest_delay: self.rest_delay,
            greeting: self.greeting,
            stats: Arc::clone(&stats),
            commands: Arc::clone(&commands),
        };

        let app = Router::new()
            .route("/api/states", get(handle_states))
            .route("/api/config/automation", get(handle_rest_automations))
            .route("/api/websocket", get(handle_websocket))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockController {
            base_url: format!("http://{}", addr),
            stats,
            commands,
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", MOCK_TOKEN))
        .unwrap_or(false)
}

async fn handle_states(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if !state.rest_delay.is_zero() {
        tokio::time::sleep(state.rest_delay).await;
    }
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "401: Unauthorized").into_response();
    }
    match state.states {
        Some(states) => Json(states).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "state snapshot unavailable").into_response(),
    }
}

async fn handle_rest_automations(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if !state.rest_delay.is_zero() {
        tokio::time::sleep(state.rest_delay).await;
    }
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "401: Unauthorized").into_response();
    }
    match state.rest_automations {
        Some(automations) => Json(automations).into_response(),
        None => (StatusCode::NOT_FOUND, "404: Not Found").into_response(),
    }
}

async fn handle_websocket(ws: WebSocketUpgrade, State(state): State<MockState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: MockState) {
    state.stats.sessions.fetch_add(1, Ordering::SeqCst);
    let _ = run_session(&mut socket, &state).await;
}

async fn run_session(socket: &mut WebSocket, state: &MockState) -> Option<()> {
    send(socket, state.greeting.clone()).await?;
    let auth = recv(socket).await?;
    if auth["type"] != "auth" || auth["access_token"] != MOCK_TOKEN {
        send(
            socket,
            json!({"type": "auth_invalid", "message": "Invalid access token or password"}),
        )
        .await?;
        return None;
    }
    send(socket, json!({"type": "auth_ok", "ha_version": "2024.6.0"})).await?;

    while let Some(command) = recv(socket).await {
        state.commands.lock().unwrap().push(command.clone());

        let now = state.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.stats.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !state.delay.is_zero() {
            tokio::time::sleep(state.delay).await;
        }
        let reply = (state.handler)(&command);
        state.stats.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut reply = reply?;
        // Unsolicited event the client has to skip.
        send(socket, json!({"type": "event", "event": {"event_type": "state_changed"}})).await?;
        if let Value::Object(map) = &mut reply {
            map.insert("id".to_string(), command["id"].clone());
            map.insert("type".to_string(), json!("result"));
        }
        send(socket, reply).await?;
    }
    Some(())
}

async fn recv(socket: &mut WebSocket) -> Option<Value> {
    loop {
        match socket.recv().await? {
            Ok(Message::Text(text)) => return serde_json::from_str(&text).ok(),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

async fn send(socket: &mut WebSocket, value: Value) -> Option<()> {
    socket.send(Message::Text(value.to_string())).await.ok()
}
