/**
 * Session Actor
 *
 * One task per live session consumes an inbox of typed commands and is the
 * only code that touches that session's state. Commands from concurrent
 * clients are applied one at a time in receipt order, which is what makes
 * the document's revision counter meaningful. Cross-document sessions run
 * fully in parallel.
 *
 * The actor exits when its last participant leaves and the inbox holds no
 * further commands; the session manager sweeps terminated handles out of
 * its registry.
 */
use crate::backend::presence::PresenceRegistry;
use crate::backend::session::state::{SessionKey, SessionState};
use crate::backend::transport::ClientHandle;
use crate::shared::config::EngineConfig;
use crate::shared::error::EngineError;
use crate::shared::event::ServerEvent;
use crate::shared::operation::{DocumentState, EditOperation};
use crate::shared::user::{SessionParticipant, StatusChange, UserIdentity};
use crate::backend::oplog::ApplyOutcome;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// What a joining participant receives: the authoritative snapshot
#[derive(Debug, Clone)]
pub struct JoinSnapshot {
    pub state: DocumentState,
    pub participants: Vec<SessionParticipant>,
    pub locked_by: Option<Uuid>,
}

/// Commands processed by a session actor, one at a time
#[derive(Debug)]
pub enum SessionCommand {
    Join {
        user: UserIdentity,
        handle: ClientHandle,
        reply: oneshot::Sender<JoinSnapshot>,
    },
    Leave {
        user_id: Uuid,
    },
    Submit {
        operation: EditOperation,
        based_on: u64,
    },
    Lock {
        user_id: Uuid,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Unlock {
        user_id: Uuid,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    UpdateStatus {
        user_id: Uuid,
        change: StatusChange,
    },
}

/// Cheap, cloneable handle to one session's inbox
#[derive(Debug, Clone)]
pub struct SessionHandle {
    key: SessionKey,
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Whether the actor behind this handle has terminated
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn join(&self, user: UserIdentity, handle: ClientHandle) -> Result<JoinSnapshot, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Join { user, handle, reply })
            .map_err(|_| EngineError::SessionClosed)?;
        rx.await.map_err(|_| EngineError::SessionClosed)
    }

    pub fn leave(&self, user_id: Uuid) -> Result<(), EngineError> {
        self.tx
            .send(SessionCommand::Leave { user_id })
            .map_err(|_| EngineError::SessionClosed)
    }

    /// Queue an operation for application in receipt order
    ///
    /// The outcome travels back over the submitter's event stream as an
    /// `operation-ack` or `operation-error`, never as a return value: the
    /// submitter must not block the inbox.
    pub fn submit(&self, operation: EditOperation, based_on: u64) -> Result<(), EngineError> {
        self.tx
            .send(SessionCommand::Submit { operation, based_on })
            .map_err(|_| EngineError::SessionClosed)
    }

    pub async fn lock(&self, user_id: Uuid) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Lock { user_id, reply })
            .map_err(|_| EngineError::SessionClosed)?;
        rx.await.map_err(|_| EngineError::SessionClosed)?
    }

    pub async fn unlock(&self, user_id: Uuid) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Unlock { user_id, reply })
            .map_err(|_| EngineError::SessionClosed)?;
        rx.await.map_err(|_| EngineError::SessionClosed)?
    }

    pub fn update_status(&self, user_id: Uuid, change: StatusChange) -> Result<(), EngineError> {
        self.tx
            .send(SessionCommand::UpdateStatus { user_id, change })
            .map_err(|_| EngineError::SessionClosed)
    }
}

/// Spawn the actor task for one session and return its handle
pub fn spawn(key: SessionKey, config: Arc<EngineConfig>, presence: PresenceRegistry) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = SessionHandle { key: key.clone(), tx };
    tokio::spawn(run(key, rx, config, presence));
    handle
}

async fn run(
    key: SessionKey,
    mut inbox: mpsc::UnboundedReceiver<SessionCommand>,
    config: Arc<EngineConfig>,
    presence: PresenceRegistry,
) {
    tracing::debug!(session = %key, "session actor started");
    let mut state = SessionState::new(key.clone());
    let mut ever_joined = false;

    while let Some(command) = inbox.recv().await {
        match command {
            SessionCommand::Join { user, handle, reply } => {
                ever_joined = true;
                let newly_joined = state.join(&user, handle);
                if newly_joined {
                    presence.joined_document(&key, user.id).await;
                    if let Some(participant) = state
                        .participants()
                        .iter()
                        .find(|p| p.user_id == user.id)
                        .cloned()
                    {
                        state.broadcast(
                            &ServerEvent::UserJoinedDocument {
                                document_type: key.document_type.clone(),
                                document_id: key.document_id.clone(),
                                participant,
                            },
                            Some(user.id),
                        );
                    }
                    tracing::info!(session = %key, user = %user.username, "participant joined");
                }
                let snapshot = JoinSnapshot {
                    state: state.core.state().clone(),
                    participants: state.participants().to_vec(),
                    locked_by: state.lock.holder(),
                };
                let _ = reply.send(snapshot);
            }

            SessionCommand::Leave { user_id } => {
                handle_leave(&mut state, &key, user_id, &presence).await;
            }

            SessionCommand::Submit { operation, based_on } => {
                let submitter = operation.user_id;
                let operation_id = operation.id;
                state.touch();
                match state
                    .core
                    .apply(operation.clone(), based_on, &config, state.lock.holder())
                {
                    Ok(ApplyOutcome::Applied(revision)) => {
                        state.send_to(
                            submitter,
                            ServerEvent::OperationAck {
                                operation_id,
                                revision,
                            },
                        );
                        state.broadcast(
                            &ServerEvent::DocumentOperation {
                                document_type: key.document_type.clone(),
                                document_id: key.document_id.clone(),
                                operation,
                                revision,
                            },
                            Some(submitter),
                        );
                    }
                    Ok(ApplyOutcome::Duplicate(revision)) => {
                        // Re-acknowledge without re-applying or rebroadcasting.
                        state.send_to(
                            submitter,
                            ServerEvent::OperationAck {
                                operation_id,
                                revision,
                            },
                        );
                    }
                    Err(error) => {
                        tracing::debug!(session = %key, %operation_id, "operation rejected: {}", error);
                        state.send_to(
                            submitter,
                            ServerEvent::OperationError {
                                operation_id: Some(operation_id),
                                error,
                            },
                        );
                    }
                }
            }

            SessionCommand::Lock { user_id, reply } => {
                let result = state.lock.lock(user_id);
                if result.is_ok() {
                    state.touch();
                    state.broadcast(
                        &ServerEvent::DocumentLocked {
                            document_type: key.document_type.clone(),
                            document_id: key.document_id.clone(),
                            user_id,
                        },
                        None,
                    );
                    tracing::info!(session = %key, %user_id, "document locked");
                }
                let _ = reply.send(result);
            }

            SessionCommand::Unlock { user_id, reply } => {
                let result = state.lock.unlock(user_id);
                if result.is_ok() {
                    state.touch();
                    state.broadcast(
                        &ServerEvent::DocumentUnlocked {
                            document_type: key.document_type.clone(),
                            document_id: key.document_id.clone(),
                        },
                        None,
                    );
                    tracing::info!(session = %key, %user_id, "document unlocked");
                }
                let _ = reply.send(result);
            }

            SessionCommand::UpdateStatus { user_id, change } => {
                if change.is_empty() {
                    continue;
                }
                if let Some(participant) = state.participant_mut(user_id) {
                    participant.apply(&change);
                    state.broadcast(
                        &ServerEvent::ParticipantStatusChanged {
                            document_type: key.document_type.clone(),
                            document_id: key.document_id.clone(),
                            user_id,
                            changes: change,
                        },
                        Some(user_id),
                    );
                }
            }
        }

        if ever_joined && state.is_empty() {
            break;
        }
    }

    tracing::debug!(session = %key, "session actor stopped");
}

async fn handle_leave(state: &mut SessionState, key: &SessionKey, user_id: Uuid, presence: &PresenceRegistry) {
    if state.leave(user_id).is_none() {
        return;
    }
    presence.left_document(key, user_id).await;

    // A leaving lock holder releases the lock for the remaining
    // participants.
    if state.lock.release_if_held(user_id) {
        state.broadcast(
            &ServerEvent::DocumentUnlocked {
                document_type: key.document_type.clone(),
                document_id: key.document_id.clone(),
            },
            None,
        );
        tracing::info!(session = %key, %user_id, "lock released on leave");
    }

    state.broadcast(
        &ServerEvent::UserLeftDocument {
            document_type: key.document_type.clone(),
            document_id: key.document_id.clone(),
            user_id,
        },
        None,
    );
    tracing::info!(session = %key, %user_id, "participant left");
}
