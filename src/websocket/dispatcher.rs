//! Connection dispatch loop

use crate::server::AppState;
use crate::websocket::handlers;
use crate::websocket::protocol::{protocol_error, Envelope};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What kind of client is on the other end.
///
/// Editors get full turn-snapshot streams; apps get only finalized
/// agent replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Authoring client, wants intermediate progress
    Editor,
    /// End-user client, wants finished replies
    App,
}

/// Per-connection dispatch state
pub struct Connection {
    pub(crate) state: Arc<AppState>,
    outbound: mpsc::Sender<Envelope>,
    pub(crate) mode: ConnectionMode,
    pub(crate) voice: bool,
    pub(crate) cancel: CancellationToken,
}

impl Connection {
    /// New connection in app mode with voice off
    pub fn new(state: Arc<AppState>, outbound: mpsc::Sender<Envelope>) -> Self {
        Self {
            state,
            outbound,
            mode: ConnectionMode::App,
            voice: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Handle one inbound text frame to completion.
    ///
    /// Protocol and handler failures become error replies; the
    /// connection itself never drops because of a bad frame.
    pub async fn handle_text(&mut self, text: &str) {
        let request = match Envelope::parse(text) {
            Ok(request) => request,
            Err(e) => {
                debug!("Rejected frame: {}", e.message());
                self.send(protocol_error(&e)).await;
                return;
            }
        };

        debug!(action = %request.action, sub_action = %request.sub_action, "Dispatching frame");
        if let Err(e) = handlers::dispatch(self, &request).await {
            warn!(action = %request.action, "Handler failed: {e:#}");
            self.send(request.error_reply(e.to_string())).await;
        }
    }

    /// Queue an outbound envelope; a closed connection drops it silently
    pub(crate) async fn send(&self, envelope: Envelope) {
        if self.outbound.send(envelope).await.is_err() {
            debug!("Outbound channel closed, dropping frame");
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    info!(%connection_id, "WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();

    // Writer task: handlers queue envelopes, this task owns the sink.
    let (tx, mut rx) = mpsc::channel::<Envelope>(64);
    let writer = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            if sender.send(Message::Text(envelope.to_json())).await.is_err() {
                break;
            }
        }
    });

    let mut connection = Connection::new(state, tx);
    while let Some(Ok(message)) = receiver.next().await {
        match message {
            // Awaited inline: the next frame is not read until this one
            // is fully handled.
            Message::Text(text) => connection.handle_text(&text).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    connection.cancel.cancel();
    drop(connection);
    let _ = writer.await;
    info!(%connection_id, "WebSocket connection closed");
}
