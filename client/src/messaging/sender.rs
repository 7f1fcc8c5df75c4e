//! Confirmation-first sending: nothing enters the store before the server
//! acknowledges it.

use super::{MessagingError, Result};
use crate::events::{EventBus, SyncEvent};
use crate::polling::{PollingManager, ScopeKey};
use crate::state::SessionState;
use crate::transport::Transport;
use fitchat_messaging::{Message, UserId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of a confirmed send.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message: Message,
    /// The conversation was local-only before this send.
    pub promoted: bool,
}

/// Sends messages on the open conversation and reconciles local state with
/// the server's answer.
pub struct SendCoordinator {
    transport: Arc<dyn Transport>,
    sender: UserId,
}

impl SendCoordinator {
    pub fn new(transport: Arc<dyn Transport>, sender: UserId) -> Self {
        Self { transport, sender }
    }

    /// Send `body` to the open conversation.
    ///
    /// Validation failures never reach the transport. On a transport failure
    /// the pending draft is dropped and no state is kept. Polls of the open
    /// conversation issued before the confirmation are made stale, since their
    /// history predates the sent message.
    pub async fn send(
        &self,
        state: &Mutex<SessionState>,
        polling: &PollingManager,
        events: &EventBus,
        body: &str,
    ) -> Result<SendOutcome> {
        let body = body.trim();
        let (peer, placeholder) = {
            let mut state = state.lock().await;
            if body.is_empty() {
                return Err(MessagingError::EmptyBody);
            }
            let peer = state.open_peer.ok_or(MessagingError::NoPeerSelected)?;
            let draft = Message::draft(self.sender, peer, body);
            let placeholder = draft.id;
            state.pending = Some(draft);
            (peer, placeholder)
        };

        debug!(%peer, "sending message");
        let result = self.transport.send_message(peer, body).await;

        let mut state = state.lock().await;
        if state.pending.as_ref().is_some_and(|draft| draft.id == placeholder) {
            state.pending = None;
        }

        let message = match result {
            Ok(message) => message,
            Err(err) => {
                warn!(%peer, %err, "send failed");
                return Err(MessagingError::SendFailure(err));
            }
        };

        // The user may have switched conversations while the send was in flight.
        if state.is_open(peer) {
            polling.supersede(ScopeKey::Conversation(peer));
            state.store.append(message.clone());
            events.emit(SyncEvent::MessagesChanged {
                peer,
                messages: state.store.messages().to_vec(),
            });
            state.scroll.force_now();
            events.emit(SyncEvent::ScrollRequested { peer });
        }

        let promoted = state.registry.promote(peer, &message);
        if promoted {
            info!(%peer, message_id = %message.id, "local conversation promoted");
        }
        events.emit(SyncEvent::ConversationsChanged {
            conversations: state.registry.visible().to_vec(),
        });

        Ok(SendOutcome { message, promoted })
    }
}
