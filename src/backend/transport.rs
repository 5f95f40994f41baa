/**
 * Transport Channel Contract
 *
 * The engine communicates with each client over a per-connection event
 * stream with an authenticated identity attached at connect time. This
 * module defines the engine's half of that contract: a cheap, cloneable
 * handle that components use to push `ServerEvent`s toward one client.
 *
 * The actual socket (WebSocket, SSE, in-process channel) lives outside the
 * engine; it only has to drain the receiver returned by `ClientHandle::new`
 * and to call `Engine::disconnect` when the stream dies.
 */
use crate::shared::event::ServerEvent;
use crate::shared::user::UserIdentity;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifies one live transport connection
pub type ConnectionId = Uuid;

/// Sending half of one client's event stream
///
/// Cloned freely into session actors and channel state; dropping the last
/// clone does not close the stream, disconnect handling does.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    connection_id: ConnectionId,
    user: UserIdentity,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ClientHandle {
    /// Create a handle and the receiving end the transport drains
    pub fn new(user: UserIdentity) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                connection_id: Uuid::new_v4(),
                user,
                tx,
            },
            rx,
        )
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// Push an event toward the client
    ///
    /// A closed receiver means the transport already went away; the
    /// disconnect cascade will clean the handle up, so the send failure is
    /// only worth a debug line.
    pub fn send(&self, event: ServerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!(
                connection = %self.connection_id,
                user = %self.user.username,
                "dropping event for disconnected client"
            );
        }
    }

    /// Whether the transport side has hung up
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
