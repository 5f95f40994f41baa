/**
 * Engine Facade
 *
 * The central state container wiring the presence registry, the session
 * manager and the chat channels behind one transport-agnostic API:
 *
 * - `connect` registers an authenticated identity and hands back the
 *   event stream the transport drains
 * - `handle_event` routes one inbound client event
 * - `disconnect` runs the implicit leave/unlock/stop-typing cascade
 *
 * Every registry is an explicitly constructed object owned here; the
 * engine is cheaply cloneable and thread-safe, the same shape the
 * surrounding system would keep in its HTTP state.
 *
 * # Thread Safety
 *
 * All fields are designed for concurrent access:
 * - `Arc<RwLock<>>` for the connection registry
 * - Session mutation is serialized per document by the session actors
 * - Presence transitions fan out from a single broadcast subscription
 */
use crate::backend::chat::ChatChannelManager;
use crate::backend::presence::PresenceRegistry;
use crate::backend::session::{SessionKey, SessionManager};
use crate::backend::transport::{ClientHandle, ConnectionId};
use crate::shared::config::EngineConfig;
use crate::shared::error::EngineError;
use crate::shared::event::{ClientEvent, ServerEvent};
use crate::shared::user::{StatusChange, UserIdentity};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// What the engine tracks per live connection
#[derive(Debug)]
struct ConnectionState {
    handle: ClientHandle,
    sessions: HashSet<SessionKey>,
    channels: HashSet<String>,
}

/// The collaborative session engine
#[derive(Debug, Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    presence: PresenceRegistry,
    sessions: SessionManager,
    chat: ChatChannelManager,
    connections: Arc<RwLock<HashMap<ConnectionId, ConnectionState>>>,
}

impl Engine {
    /// Construct the engine and start its background tasks (presence
    /// fan-out, typing sweeper, session sweeper)
    pub fn new(config: EngineConfig) -> Self {
        let config = Arc::new(config);
        let presence = PresenceRegistry::new(config.presence_capacity);
        let sessions = SessionManager::new(config.clone(), presence.clone());
        let chat = ChatChannelManager::new(config.clone());
        let connections = Arc::new(RwLock::new(HashMap::new()));

        let engine = Self {
            config,
            presence,
            sessions,
            chat,
            connections,
        };
        engine.spawn_presence_fanout();
        engine.chat.spawn_typing_sweeper();
        engine.sessions.spawn_sweeper();
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn chat(&self) -> &ChatChannelManager {
        &self.chat
    }

    /// Register a connection with its authenticated identity
    ///
    /// Returns the connection id and the stream of server events the
    /// transport must drain. Identity is trusted as given; who may connect
    /// is the outer auth layer's concern.
    pub async fn connect(&self, user: UserIdentity) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (handle, rx) = ClientHandle::new(user.clone());
        let connection_id = handle.connection_id();

        self.connections.write().await.insert(
            connection_id,
            ConnectionState {
                handle,
                sessions: HashSet::new(),
                channels: HashSet::new(),
            },
        );
        self.presence.user_online(connection_id, user).await;
        tracing::info!(connection = %connection_id, "client connected");
        (connection_id, rx)
    }

    /// Run the disconnect cascade for a connection
    ///
    /// Disconnect is an implicit leave-session (releasing a held lock) for
    /// every joined document and an implicit leave/stop-typing for every
    /// joined channel, then the presence entry goes away.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let Some(state) = self.connections.write().await.remove(&connection_id) else {
            return;
        };
        let user_id = state.handle.user_id();

        for key in &state.sessions {
            if let Ok(session) = self.sessions.get(key).await {
                let _ = session.leave(user_id);
            }
        }
        self.chat.disconnect(user_id).await;
        self.presence.user_offline(connection_id).await;
        tracing::info!(connection = %connection_id, "client disconnected");
    }

    /// Route one inbound client event
    ///
    /// Operation-level failures are pushed to the originating client as
    /// `operation-error` events and reported here as `Ok`; only failures
    /// the transport itself should see (unknown connection, session-level
    /// rejections) surface as `Err`.
    pub async fn handle_event(&self, connection_id: ConnectionId, event: ClientEvent) -> Result<(), EngineError> {
        let handle = {
            let connections = self.connections.read().await;
            connections
                .get(&connection_id)
                .map(|c| c.handle.clone())
                .ok_or(EngineError::SessionClosed)?
        };
        let user = handle.user().clone();

        match event {
            ClientEvent::JoinDocument {
                document_type,
                document_id,
            } => {
                let key = SessionKey::new(document_type, document_id);
                let snapshot = self.sessions.join_session(&key, user, handle.clone()).await?;
                self.track_session(connection_id, key).await;
                handle.send(ServerEvent::DocumentState {
                    state: snapshot.state,
                    participants: snapshot.participants,
                    locked_by: snapshot.locked_by,
                });
                Ok(())
            }

            ClientEvent::LeaveDocument {
                document_type,
                document_id,
            } => {
                let key = SessionKey::new(document_type, document_id);
                if let Ok(session) = self.sessions.get(&key).await {
                    // An already-terminated actor means the session is gone;
                    // nothing left to leave.
                    let _ = session.leave(user.id);
                }
                self.untrack_session(connection_id, &key).await;
                Ok(())
            }

            ClientEvent::DocumentOperation {
                document_type,
                document_id,
                operation,
                revision,
            } => {
                let key = SessionKey::new(document_type, document_id);
                match self.sessions.get(&key).await {
                    Ok(session) => session.submit(operation, revision),
                    // Submitting against a session never joined is an
                    // operation-level failure for this client only.
                    Err(error) => {
                        handle.send(ServerEvent::OperationError {
                            operation_id: Some(operation.id),
                            error,
                        });
                        Ok(())
                    }
                }
            }

            ClientEvent::DocumentLock {
                document_type,
                document_id,
            } => {
                let key = SessionKey::new(document_type, document_id);
                let session = self.sessions.get(&key).await?;
                session.lock(user.id).await
            }

            ClientEvent::DocumentUnlock {
                document_type,
                document_id,
            } => {
                let key = SessionKey::new(document_type, document_id);
                let session = self.sessions.get(&key).await?;
                session.unlock(user.id).await
            }

            ClientEvent::UpdateStatus {
                document_type,
                document_id,
                status,
                cursor,
            } => {
                let key = SessionKey::new(document_type, document_id);
                let session = self.sessions.get(&key).await?;
                session.update_status(user.id, StatusChange { status, cursor })
            }

            ClientEvent::JoinChat { channel_id } => {
                let history = self.chat.join_channel(&channel_id, handle.clone()).await;
                for message in history {
                    handle.send(ServerEvent::NewMessage { message });
                }
                self.track_channel(connection_id, channel_id).await;
                Ok(())
            }

            ClientEvent::LeaveChat { channel_id } => {
                self.chat.leave_channel(&channel_id, user.id).await;
                self.untrack_channel(connection_id, &channel_id).await;
                Ok(())
            }

            ClientEvent::SendMessage {
                channel_id,
                content,
                kind,
                metadata,
            } => {
                self.chat
                    .send_message(&channel_id, &user, content, kind, metadata)
                    .await?;
                Ok(())
            }

            ClientEvent::TypingStart { channel_id } => {
                self.chat.typing_start(&channel_id, &user).await;
                Ok(())
            }

            ClientEvent::TypingStop { channel_id } => {
                self.chat.typing_stop(&channel_id, user.id).await;
                Ok(())
            }

            ClientEvent::GetOnlineUsers => {
                let users = self.presence.online_users().await;
                handle.send(ServerEvent::OnlineUsers { users });
                Ok(())
            }
        }
    }

    /// Push an event to one connection, if it is still registered
    ///
    /// Used by the transport layer to deliver session-level rejections
    /// (lock conflicts, unauthorized joins) back to the offending client.
    pub async fn notify(&self, connection_id: ConnectionId, event: ServerEvent) {
        let connections = self.connections.read().await;
        if let Some(state) = connections.get(&connection_id) {
            state.handle.send(event);
        }
    }

    async fn track_session(&self, connection_id: ConnectionId, key: SessionKey) {
        if let Some(state) = self.connections.write().await.get_mut(&connection_id) {
            state.sessions.insert(key);
        }
    }

    async fn untrack_session(&self, connection_id: ConnectionId, key: &SessionKey) {
        if let Some(state) = self.connections.write().await.get_mut(&connection_id) {
            state.sessions.remove(key);
        }
    }

    async fn track_channel(&self, connection_id: ConnectionId, channel_id: String) {
        if let Some(state) = self.connections.write().await.get_mut(&connection_id) {
            state.channels.insert(channel_id);
        }
    }

    async fn untrack_channel(&self, connection_id: ConnectionId, channel_id: &str) {
        if let Some(state) = self.connections.write().await.get_mut(&connection_id) {
            state.channels.remove(channel_id);
        }
    }

    /// Forward presence transitions to every live connection
    fn spawn_presence_fanout(&self) {
        let mut rx = self.presence.subscribe();
        let connections = self.connections.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let connections = connections.read().await;
                        for state in connections.values() {
                            state.handle.send(event.clone());
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("presence fan-out lagged, skipped {} events", skipped);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}
