//! Authenticated request/response sessions over the controller WebSocket API.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::ControllerClient;
use crate::error::{HagraphError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One authenticated WebSocket connection.
///
/// Sessions are used for a single logical operation and then closed; they are
/// never pooled or shared between tasks.
pub struct Session {
    stream: WsStream,
    next_id: u64,
    timeout: Duration,
}

impl ControllerClient {
    /// Connect to `/api/websocket` and complete the auth handshake
    ///
    /// The controller sends `auth_required`, we answer with the access token,
    /// and it replies `auth_ok` or `auth_invalid`.
    pub async fn open_session(&self) -> Result<Session> {
        let url = self.websocket_url()?;

        let (stream, _) = tokio::time::timeout(self.ws_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| HagraphError::Transport(format!("Timed out connecting to {}", url)))?
            .map_err(|e| HagraphError::Transport(format!("Failed to connect to {}: {}", url, e)))?;

        let mut session = Session {
            stream,
            next_id: 0,
            timeout: self.ws_timeout,
        };

        let handshake = tokio::time::timeout(self.ws_timeout, session.authenticate(&self.token)).await;
        match handshake {
            Ok(Ok(())) => Ok(session),
            Ok(Err(e)) => {
                session.close().await;
                Err(e)
            }
            Err(_) => {
                session.close().await;
                Err(HagraphError::Transport("Timed out during auth handshake".to_string()))
            }
        }
    }
}

impl Session {
    async fn authenticate(&mut self, token: &str) -> Result<()> {
        let greeting = self.read_frame().await?;
        if frame_type(&greeting) != Some("auth_required") {
            return Err(HagraphError::Transport(format!(
                "Expected auth_required, got {}",
                greeting
            )));
        }

        self.send(json!({"type": "auth", "access_token": token})).await?;

        let reply = self.read_frame().await?;
        match frame_type(&reply) {
            Some("auth_ok") => {
                log::debug!("WebSocket session authenticated");
                Ok(())
            }
            Some("auth_invalid") => Err(HagraphError::Authentication(
                reply
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Invalid access token")
                    .to_string(),
            )),
            _ => Err(HagraphError::Transport(format!(
                "Unexpected auth reply: {}",
                reply
            ))),
        }
    }

    /// Send `{id, type, ...params}` and wait for the result with the same id
    ///
    /// Frames for other ids and unsolicited events are skipped. A reply with
    /// `success: false` becomes [`HagraphError::Command`]; the wait is bounded
    /// by the session timeout.
    pub async fn call(&mut self, command_type: &str, params: Value) -> Result<Value> {
        self.next_id += 1;
        let id = self.next_id;

        let mut message = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(HagraphError::Parse(format!(
                    "Command params must be an object, got {}",
                    other
                )))
            }
        };
        message.insert("id".to_string(), json!(id));
        message.insert("type".to_string(), json!(command_type));

        self.send(Value::Object(message)).await?;

        let reply = tokio::time::timeout(self.timeout, self.wait_for(id))
            .await
            .map_err(|_| {
                HagraphError::Transport(format!(
                    "Timed out after {:?} waiting for {} (id {})",
                    self.timeout, command_type, id
                ))
            })??;

        if reply.get("success").and_then(Value::as_bool) == Some(true) {
            return Ok(reply.get("result").cloned().unwrap_or(Value::Null));
        }

        let message = match reply.get("error") {
            Some(error) => error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
            None => "unknown error".to_string(),
        };
        Err(HagraphError::Command {
            command_type: command_type.to_string(),
            message,
        })
    }

    /// Close the connection; errors on close are irrelevant at this point
    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }

    async fn wait_for(&mut self, id: u64) -> Result<Value> {
        loop {
            let frame = self.read_frame().await?;
            if frame.get("id").and_then(Value::as_u64) == Some(id) {
                return Ok(frame);
            }
            log::trace!("Skipping unrelated frame while waiting for id {}", id);
        }
    }

    async fn send(&mut self, value: Value) -> Result<()> {
        self.stream
            .send(Message::Text(value.to_string()))
            .await
            .map_err(|e| HagraphError::Transport(format!("Failed to send frame: {}", e)))
    }

    /// Next JSON text frame; control and binary frames are skipped
    async fn read_frame(&mut self) -> Result<Value> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| HagraphError::Parse(format!("Invalid JSON frame: {}", e)));
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(HagraphError::Transport(
                        "WebSocket closed by controller".to_string(),
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(HagraphError::Transport(format!("WebSocket error: {}", e)));
                }
            }
        }
    }
}

fn frame_type(frame: &Value) -> Option<&str> {
    frame.get("type").and_then(Value::as_str)
}
