//! Realtime signaling client for the agent platform
//!
//! Carries the fixed command/event contract over a WebSocket control
//! channel: commands out, the five signal kinds in. Call media, speech
//! recognition, and workflow execution stay on the platform side; nothing
//! on this channel is audio.

mod helpers;
mod messages;

use crate::client::{
    ClientError, ClientEvent, ConnectionState, ServerMessage, StartRequest, VoiceClient,
};
use futures_util::{SinkExt, StreamExt};
use messages::{ClientCommand, ServerFrame};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::time::{interval, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};
use zeroize::Zeroize;

/// Ping interval in seconds to keep the WebSocket connection alive
const PING_INTERVAL_SECS: u64 = 30;

/// WebSocket connection timeout in seconds
const WS_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Seconds to wait for the platform to accept a start command
const START_ACCEPT_TIMEOUT_SECS: u64 = 30;

/// Capacity of the decoded event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Signaling client for the platform's realtime endpoint
pub struct PlatformClient {
    endpoint: String,
    token: String,
    event_tx: broadcast::Sender<ClientEvent>,
    command_tx: Mutex<Option<mpsc::Sender<ClientCommand>>>,
}

impl PlatformClient {
    /// Create a client for the given endpoint, authenticating with the
    /// public client access token.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            event_tx,
            command_tx: Mutex::new(None),
        }
    }

    async fn teardown(&self) {
        self.command_tx.lock().await.take();
    }
}

impl Drop for PlatformClient {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

impl VoiceClient for PlatformClient {
    fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    async fn start(&self, request: StartRequest) -> Result<(), ClientError> {
        {
            let guard = self.command_tx.lock().await;
            if guard.is_some() {
                return Err(ClientError::AlreadyStarted);
            }
        }

        let ws_url = build_ws_url(&self.endpoint);
        info!(ws_url = %ws_url, kind = ?request.kind, "Connecting to platform realtime endpoint");

        let parsed_url =
            url::Url::parse(&ws_url).map_err(|e| ClientError::Connection(e.to_string()))?;
        let host = parsed_url
            .host_str()
            .ok_or_else(|| ClientError::Connection("Invalid URL: no host".to_string()))?
            .to_string();

        let ws_request =
            build_ws_request(&ws_url, &host, &self.token).map_err(ClientError::Connection)?;

        let ws_result = timeout(
            Duration::from_secs(WS_CONNECT_TIMEOUT_SECS),
            connect_async(ws_request),
        )
        .await;

        let ws_stream = match ws_result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                error!("Platform WebSocket connection failed: {}", e);
                return Err(ClientError::Connection(e.to_string()));
            }
            Err(_) => {
                error!("Platform WebSocket connection timed out");
                return Err(ClientError::ConnectionTimeout(WS_CONNECT_TIMEOUT_SECS));
            }
        };

        info!("Connected to platform realtime endpoint");

        let (ws_sink, ws_stream) = ws_stream.split();
        let (accept_tx, accept_rx) = oneshot::channel();
        let (command_tx, command_rx) = mpsc::channel::<ClientCommand>(16);

        spawn_receive_task(ws_stream, self.event_tx.clone(), accept_tx);
        spawn_send_task(ws_sink, command_rx);

        command_tx
            .send(ClientCommand::CallStart {
                call: request.into(),
            })
            .await
            .map_err(|_| {
                ClientError::Connection("signal channel closed before start".to_string())
            })?;

        *self.command_tx.lock().await = Some(command_tx);

        match timeout(Duration::from_secs(START_ACCEPT_TIMEOUT_SECS), accept_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => {
                self.teardown().await;
                Err(e)
            }
            Ok(Err(_)) => {
                self.teardown().await;
                Err(ClientError::Connection(
                    "connection closed while waiting for call acceptance".to_string(),
                ))
            }
            Err(_) => {
                error!("Platform did not accept the call in time");
                self.teardown().await;
                Err(ClientError::ConnectionTimeout(START_ACCEPT_TIMEOUT_SECS))
            }
        }
    }

    async fn stop(&self) -> Result<(), ClientError> {
        let command_tx = self
            .command_tx
            .lock()
            .await
            .take()
            .ok_or(ClientError::NotConnected)?;

        command_tx
            .send(ClientCommand::CallStop)
            .await
            .map_err(|_| ClientError::Connection("signal channel already closed".to_string()))?;
        Ok(())
    }
}

/// Build the realtime WebSocket URL from the configured endpoint
pub(crate) fn build_ws_url(endpoint: &str) -> String {
    // Remove trailing slash if present
    let endpoint = endpoint.trim_end_matches('/');

    // Convert https:// to wss://
    let ws_endpoint = endpoint
        .replace("https://", "wss://")
        .replace("http://", "ws://");

    format!("{}/call/web", ws_endpoint)
}

/// Build the WebSocket request with Bearer token authentication
pub(crate) fn build_ws_request(
    ws_url: &str,
    host: &str,
    token: &str,
) -> Result<http::Request<()>, String> {
    http::Request::builder()
        .uri(ws_url)
        .header("Host", host)
        .header("Authorization", format!("Bearer {}", token))
        .header("Upgrade", "websocket")
        .header("Connection", "Upgrade")
        .header("Sec-WebSocket-Key", helpers::generate_ws_key())
        .header("Sec-WebSocket-Version", "13")
        .body(())
        .map_err(|e| e.to_string())
}

/// Spawn the receive task that decodes inbound frames into client events
fn spawn_receive_task(
    mut ws_stream: impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin
        + Send
        + 'static,
    event_tx: broadcast::Sender<ClientEvent>,
    accept_tx: oneshot::Sender<Result<(), ClientError>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut accept_tx = Some(accept_tx);
        let mut established = false;

        while let Some(msg_result) = ws_stream.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    handle_frame(&text, &event_tx, &mut accept_tx, &mut established);
                }
                Ok(Message::Close(_)) => {
                    info!("Platform WebSocket closed by server");
                    break;
                }
                Ok(Message::Ping(_)) => {
                    trace!("Received platform WebSocket ping");
                }
                Ok(Message::Pong(_)) => {
                    trace!("Received platform WebSocket pong");
                }
                Err(e) => {
                    error!("Platform WebSocket receive error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        // A socket that dies before acceptance rejects the pending start; a
        // socket that dies mid-call surfaces as a disconnect signal.
        if let Some(tx) = accept_tx.take() {
            let _ = tx.send(Err(ClientError::Connection(
                "connection closed before the call was accepted".to_string(),
            )));
        } else if established {
            let _ = event_tx.send(ClientEvent::StateChange(ConnectionState::Disconnected));
        }
    })
}

/// Decode one inbound frame and route it
fn handle_frame(
    text: &str,
    event_tx: &broadcast::Sender<ClientEvent>,
    accept_tx: &mut Option<oneshot::Sender<Result<(), ClientError>>>,
    established: &mut bool,
) {
    trace!("Platform frame: {}", text);
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(frame) => match frame {
            ServerFrame::CallAccepted => {
                debug!("Platform accepted the call");
                *established = true;
                if let Some(tx) = accept_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            ServerFrame::CallRejected { reason } => {
                let reason = reason.unwrap_or_else(|| "no reason given".to_string());
                error!("Platform rejected the call: {}", reason);
                if let Some(tx) = accept_tx.take() {
                    let _ = tx.send(Err(ClientError::Rejected(reason)));
                }
            }
            ServerFrame::StateChange { state } => {
                let state = ConnectionState::from(state.as_str());
                debug!("Platform state: {:?}", state);
                if state == ConnectionState::Connected {
                    *established = true;
                    if let Some(tx) = accept_tx.take() {
                        let _ = tx.send(Ok(()));
                    }
                }
                let _ = event_tx.send(ClientEvent::StateChange(state));
            }
            ServerFrame::Message { message } => {
                match serde_json::from_value::<ServerMessage>(message) {
                    Ok(message) => {
                        let _ = event_tx.send(ClientEvent::Message(message));
                    }
                    Err(e) => {
                        warn!("Failed to decode platform message payload: {}", e);
                    }
                }
            }
            ServerFrame::SpeechStart => {
                let _ = event_tx.send(ClientEvent::SpeechStart);
            }
            ServerFrame::SpeechEnd => {
                let _ = event_tx.send(ClientEvent::SpeechEnd);
            }
            ServerFrame::Error { error } => {
                let _ = event_tx.send(ClientEvent::Error(error));
            }
            ServerFrame::Other => {
                debug!("Ignoring unrecognized platform frame");
            }
        },
        Err(e) => {
            warn!("Failed to parse platform frame: {} - {}", e, text);
        }
    }
}

/// Spawn the send task that serializes commands and keeps the channel alive
fn spawn_send_task<S>(
    mut ws_sink: S,
    mut command_rx: mpsc::Receiver<ClientCommand>,
) -> tokio::task::JoinHandle<()>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                command = command_rx.recv() => {
                    let Some(command) = command else {
                        debug!("Command channel closed, closing platform connection");
                        let _ = ws_sink.close().await;
                        break;
                    };
                    let stopping = matches!(command, ClientCommand::CallStop);
                    match serde_json::to_string(&command) {
                        Ok(json) => {
                            debug!("Sending platform command: {}", json);
                            if ws_sink.send(Message::Text(json)).await.is_err() {
                                error!("Failed to send platform command");
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to serialize platform command: {}", e);
                        }
                    }
                    if stopping {
                        let _ = ws_sink.close().await;
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_sink.send(Message::Ping(vec![])).await.is_err() {
                        warn!("Failed to send keepalive ping");
                        break;
                    }
                    trace!("Sent keepalive ping");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_ws_url() {
        let url = build_ws_url("https://realtime.prepcall.dev");
        assert_eq!(url, "wss://realtime.prepcall.dev/call/web");
    }

    #[test]
    fn test_build_ws_url_trailing_slash() {
        let url = build_ws_url("https://realtime.prepcall.dev/");
        assert!(!url.contains("dev//"));
    }

    #[test]
    fn test_build_ws_request_carries_token() {
        let request =
            build_ws_request("wss://realtime.prepcall.dev/call/web", "realtime.prepcall.dev", "tok_abc")
                .unwrap();
        assert_eq!(
            request.headers().get("Authorization").unwrap(),
            "Bearer tok_abc"
        );
        assert!(request.headers().contains_key("Sec-WebSocket-Key"));
    }

    #[tokio::test]
    async fn test_stop_without_call_fails() {
        let client = PlatformClient::new("https://realtime.prepcall.dev", "tok");
        assert!(matches!(
            client.stop().await,
            Err(ClientError::NotConnected)
        ));
    }
}
