/**
 * WebSocket Bridge
 *
 * Bridges one WebSocket connection onto the engine's event contract:
 * inbound text frames deserialize to `ClientEvent`s, the connection's
 * `ServerEvent` stream serializes back out, and a closed socket runs the
 * engine's disconnect cascade.
 *
 * Identity arrives in the upgrade request's query string. Authenticating
 * that identity is the surrounding system's concern (a reverse proxy or
 * auth middleware in front of this route); the engine trusts what it is
 * handed.
 */
use crate::backend::engine::Engine;
use crate::shared::event::{ClientEvent, ServerEvent};
use crate::shared::user::UserIdentity;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

/// Identity fields accepted on the upgrade request
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Stable user id; a fresh one is minted for anonymous connections
    pub user_id: Option<Uuid>,
    pub username: String,
    pub avatar: Option<String>,
}

/// Handle a WebSocket upgrade (GET /ws)
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(engine): State<Engine>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, engine, params))
}

async fn handle_socket(socket: WebSocket, engine: Engine, params: ConnectParams) {
    let mut user = UserIdentity::new(params.user_id.unwrap_or_else(Uuid::new_v4), params.username);
    if let Some(avatar) = params.avatar {
        user = user.with_avatar(avatar);
    }

    let (connection_id, events) = engine.connect(user).await;
    let (mut sink, mut stream) = socket.split();

    // Outbound: drain the connection's event stream into the socket.
    let mut events = UnboundedReceiverStream::new(events);
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("failed to serialize server event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound: decode frames and route them to the engine.
    let recv_engine = engine.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        if let Err(error) = recv_engine.handle_event(connection_id, event).await {
                            recv_engine
                                .notify(
                                    connection_id,
                                    ServerEvent::OperationError {
                                        operation_id: None,
                                        error,
                                    },
                                )
                                .await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(connection = %connection_id, "unparseable client event: {}", e);
                    }
                },
                Message::Close(_) => break,
                // Ping/pong are handled by axum; binary frames are not part
                // of the contract.
                _ => {}
            }
        }
    });

    // Either side ending the stream tears the connection down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    engine.disconnect(connection_id).await;
}
