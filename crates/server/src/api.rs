//! HTTP/WebSocket transport.
//!
//! One session per connection: the client sends raw utterance text
//! frames, the server streams back typed JSON events. A session that
//! stays silent past the idle timeout is torn down without any error
//! event.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::orchestrator::{SessionDeps, SessionDriver, SessionSettings};

/// Shared application state handed to every connection.
#[derive(Clone)]
pub struct AppState {
    pub deps: SessionDeps,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(mut socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    info!("Session {} connected", session_id);

    let idle_timeout = state.config.idle_timeout();
    let settings = SessionSettings::from(state.config.as_ref());
    let mut driver = SessionDriver::new(state.deps.clone(), settings);

    // The driver runs in its own task so progress events stream out
    // while the pipeline is still working.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (utterance_tx, mut utterance_rx) = mpsc::unbounded_channel::<String>();
    let driver_task = tokio::spawn(async move {
        while let Some(text) = utterance_rx.recv().await {
            driver.handle_utterance(&text, &event_tx).await;
        }
    });

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Session {}: unserializable event: {}", session_id, e);
                        continue;
                    }
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    debug!("Session {}: client went away mid-send", session_id);
                    break;
                }
            }
            incoming = timeout(idle_timeout, socket.recv()) => {
                match incoming {
                    // Idle abandonment is silent: no error event
                    Err(_) => {
                        info!("Session {} abandoned after {:?} idle", session_id, idle_timeout);
                        break;
                    }
                    Ok(None) | Ok(Some(Ok(Message::Close(_)))) => {
                        debug!("Session {} closed by client", session_id);
                        break;
                    }
                    Ok(Some(Ok(Message::Text(text)))) => {
                        if utterance_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(Some(Ok(_))) => {} // pings and binary frames
                    Ok(Some(Err(e))) => {
                        warn!("Session {}: transport error: {}", session_id, e);
                        break;
                    }
                }
            }
        }
    }

    // Tears down any in-flight collection tasks with it
    driver_task.abort();
    info!("Session {} closed", session_id);
}
