/**
 * Chat Channel Manager
 *
 * Owns every chat channel's membership, its append-only message history,
 * and its typing state. Messages are broadcast to all channel members on
 * arrival; the server assigns ids and timestamps, so every subscriber sees
 * the same canonical record, the author included.
 *
 * A background sweeper expires idle typing indicators and announces the
 * implicit stop, so indicators cannot get stuck when a client vanishes.
 */
use crate::backend::chat::typing::TypingTracker;
use crate::backend::transport::ClientHandle;
use crate::shared::config::EngineConfig;
use crate::shared::error::EngineError;
use crate::shared::event::ServerEvent;
use crate::shared::message::{ChatMessage, MessageKind};
use crate::shared::user::UserIdentity;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// State for one chat channel
#[derive(Debug)]
struct ChannelState {
    members: HashMap<Uuid, ClientHandle>,
    messages: Vec<ChatMessage>,
    typing: TypingTracker,
}

impl ChannelState {
    fn new(typing_idle: Duration) -> Self {
        Self {
            members: HashMap::new(),
            messages: Vec::new(),
            typing: TypingTracker::new(typing_idle),
        }
    }

    fn broadcast(&self, event: &ServerEvent, except: Option<Uuid>) {
        for (user_id, handle) in &self.members {
            if Some(*user_id) == except {
                continue;
            }
            handle.send(event.clone());
        }
    }
}

/// Registry of chat channels
#[derive(Debug, Clone)]
pub struct ChatChannelManager {
    channels: Arc<RwLock<HashMap<String, ChannelState>>>,
    config: Arc<EngineConfig>,
}

impl ChatChannelManager {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Subscribe a user to a channel, creating it lazily
    ///
    /// Returns the recent message history (bounded by `chat_history_limit`)
    /// so a joining client can render context immediately.
    pub async fn join_channel(&self, channel_id: &str, handle: ClientHandle) -> Vec<ChatMessage> {
        let mut channels = self.channels.write().await;
        let idle = Duration::from_millis(self.config.typing_idle_ms);
        let channel = channels
            .entry(channel_id.to_string())
            .or_insert_with(|| ChannelState::new(idle));
        channel.members.insert(handle.user_id(), handle);

        let limit = self.config.chat_history_limit;
        let start = channel.messages.len().saturating_sub(limit);
        channel.messages[start..].to_vec()
    }

    /// Unsubscribe a user from a channel; empty channels with no history
    /// are dropped
    pub async fn leave_channel(&self, channel_id: &str, user_id: Uuid) {
        let mut channels = self.channels.write().await;
        let Some(channel) = channels.get_mut(channel_id) else {
            return;
        };
        channel.members.remove(&user_id);
        if channel.typing.stop(user_id) {
            channel.broadcast(
                &ServerEvent::UserStoppedTyping {
                    channel_id: channel_id.to_string(),
                    user_id,
                },
                None,
            );
        }
        if channel.members.is_empty() && channel.messages.is_empty() {
            channels.remove(channel_id);
        }
    }

    /// Append a message and broadcast it to every channel member
    ///
    /// The sender must be subscribed; whether an identity may join at all
    /// is the outer authorization layer's decision, not the engine's.
    pub async fn send_message(
        &self,
        channel_id: &str,
        author: &UserIdentity,
        content: impl Into<String>,
        kind: MessageKind,
        metadata: Option<serde_json::Value>,
    ) -> Result<ChatMessage, EngineError> {
        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(channel_id)
            .filter(|c| c.members.contains_key(&author.id))
            .ok_or_else(|| EngineError::unauthorized(author.id, format!("send to channel {channel_id}")))?;

        let message = ChatMessage::new(channel_id, author, content, kind, metadata);
        channel.messages.push(message.clone());

        // Sending a message is also an implicit stop-typing.
        if channel.typing.stop(author.id) {
            channel.broadcast(
                &ServerEvent::UserStoppedTyping {
                    channel_id: channel_id.to_string(),
                    user_id: author.id,
                },
                None,
            );
        }

        channel.broadcast(&ServerEvent::NewMessage { message: message.clone() }, None);
        tracing::debug!(channel = channel_id, author = %author.username, "message appended");
        Ok(message)
    }

    /// Record typing activity and announce new typists to the other members
    pub async fn typing_start(&self, channel_id: &str, user: &UserIdentity) {
        let mut channels = self.channels.write().await;
        let Some(channel) = channels.get_mut(channel_id) else {
            return;
        };
        if !channel.members.contains_key(&user.id) {
            return;
        }
        if channel.typing.start(user.id, Instant::now()) {
            channel.broadcast(
                &ServerEvent::UserTyping {
                    channel_id: channel_id.to_string(),
                    user_id: user.id,
                    username: user.username.clone(),
                },
                Some(user.id),
            );
        }
    }

    /// Explicit stop-typing signal
    pub async fn typing_stop(&self, channel_id: &str, user_id: Uuid) {
        let mut channels = self.channels.write().await;
        let Some(channel) = channels.get_mut(channel_id) else {
            return;
        };
        if channel.typing.stop(user_id) {
            channel.broadcast(
                &ServerEvent::UserStoppedTyping {
                    channel_id: channel_id.to_string(),
                    user_id,
                },
                None,
            );
        }
    }

    /// Expire idle typing indicators across all channels, announcing each
    /// implicit stop
    pub async fn sweep_typing(&self) {
        let now = Instant::now();
        let mut channels = self.channels.write().await;
        for (channel_id, channel) in channels.iter_mut() {
            for user_id in channel.typing.expire(now) {
                channel.broadcast(
                    &ServerEvent::UserStoppedTyping {
                        channel_id: channel_id.clone(),
                        user_id,
                    },
                    None,
                );
            }
        }
    }

    /// Remove a disconnecting user from every channel
    pub async fn disconnect(&self, user_id: Uuid) {
        let channel_ids: Vec<String> = {
            let channels = self.channels.read().await;
            channels
                .iter()
                .filter(|(_, c)| c.members.contains_key(&user_id))
                .map(|(id, _)| id.clone())
                .collect()
        };
        for channel_id in channel_ids {
            self.leave_channel(&channel_id, user_id).await;
        }
    }

    /// Start the periodic typing sweep task
    pub fn spawn_typing_sweeper(&self) {
        let manager = self.clone();
        let period = Duration::from_millis(manager.config.typing_sweep_ms.max(10));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                manager.sweep_typing().await;
            }
        });
    }

    /// Users currently typing in a channel
    pub async fn typing_users(&self, channel_id: &str) -> Vec<Uuid> {
        let channels = self.channels.read().await;
        channels
            .get(channel_id)
            .map(|c| c.typing.typing_users())
            .unwrap_or_default()
    }
}
