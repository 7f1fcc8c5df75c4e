//! A signed-in user's chat session: polling loops, local state and UI intents.

use crate::events::{EventBus, SyncEvent};
use crate::messaging::{MessagingError, Result, SendCoordinator, SendOutcome};
use crate::polling::{Poller, PollingManager, RequestTicket, ScopeKey};
use crate::scroll::{ScrollDecision, ScrollPosition};
use crate::state::{SessionContext, SessionState};
use crate::transport::{IdentityProvider, Transport, TransportError, TransportResult};
use crate::SyncConfig;
use async_trait::async_trait;
use fitchat_messaging::{Conversation, Message, User, UserId};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// State shared between the session handle and its polling tasks.
struct Shared {
    transport: Arc<dyn Transport>,
    state: Mutex<SessionState>,
    events: EventBus,
}

impl Shared {
    fn commit_conversations(&self, state: &mut SessionState, remote: Vec<Conversation>) {
        if state.registry.merge_remote(remote) {
            self.events.emit(SyncEvent::ConversationsChanged {
                conversations: state.registry.visible().to_vec(),
            });
        }
    }

    fn commit_messages(&self, state: &mut SessionState, peer: UserId, history: Vec<Message>) {
        if !state.store.replace(history) {
            state.scroll.on_messages_unchanged();
            return;
        }
        self.events.emit(SyncEvent::MessagesChanged {
            peer,
            messages: state.store.messages().to_vec(),
        });
        match state.scroll.on_messages_changed() {
            ScrollDecision::ScrollToBottom => self.events.emit(SyncEvent::ScrollRequested { peer }),
            ScrollDecision::Suppressed => debug!(%peer, "auto-scroll suppressed while reading history"),
        }
    }

    fn report(&self, ticket: &RequestTicket, error: TransportError) {
        self.events.emit(SyncEvent::FetchFailed {
            scope: ticket.scope(),
            error,
        });
    }
}

struct ConversationListPoller {
    shared: Arc<Shared>,
}

#[async_trait]
impl Poller for ConversationListPoller {
    type Output = Vec<Conversation>;

    async fn fetch(&self) -> TransportResult<Vec<Conversation>> {
        self.shared.transport.fetch_conversations().await
    }

    async fn apply(&self, ticket: &RequestTicket, output: Vec<Conversation>) {
        let mut state = self.shared.state.lock().await;
        if ticket.is_current() {
            self.shared.commit_conversations(&mut state, output);
        }
    }

    async fn on_error(&self, ticket: &RequestTicket, error: TransportError) {
        self.shared.report(ticket, error);
    }
}

struct ConversationPoller {
    shared: Arc<Shared>,
    peer: UserId,
}

#[async_trait]
impl Poller for ConversationPoller {
    type Output = Vec<Message>;

    async fn fetch(&self) -> TransportResult<Vec<Message>> {
        self.shared.transport.fetch_messages(self.peer).await
    }

    async fn apply(&self, ticket: &RequestTicket, output: Vec<Message>) {
        let mut state = self.shared.state.lock().await;
        if ticket.is_current() && state.is_open(self.peer) {
            self.shared.commit_messages(&mut state, self.peer, output);
        }
    }

    async fn on_error(&self, ticket: &RequestTicket, error: TransportError) {
        self.shared.report(ticket, error);
    }
}

/// Entry point for the UI layer.
///
/// Dropping the session stops every polling loop it started.
pub struct ChatSession {
    context: SessionContext,
    config: SyncConfig,
    shared: Arc<Shared>,
    identity: Arc<dyn IdentityProvider>,
    sender: SendCoordinator,
    polling: PollingManager,
}

impl ChatSession {
    pub fn new(
        context: SessionContext,
        config: SyncConfig,
        transport: Arc<dyn Transport>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let shared = Arc::new(Shared {
            transport: Arc::clone(&transport),
            state: Mutex::new(SessionState::new(&config)),
            events: EventBus::new(config.event_capacity),
        });

        Self {
            sender: SendCoordinator::new(transport, context.user_id()),
            context,
            config,
            shared,
            identity,
            polling: PollingManager::new(),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    /// Begin polling the conversation list. Must be called from within a
    /// Tokio runtime.
    pub fn start(&self) {
        info!(user = %self.context.user_id(), role = ?self.context.role, "chat session started");
        self.polling.start(
            ScopeKey::ConversationList,
            self.config.list_poll_interval,
            ConversationListPoller {
                shared: Arc::clone(&self.shared),
            },
        );
    }

    /// Open the conversation with `peer`, replacing whichever was open.
    pub async fn select_conversation(&self, peer: UserId) {
        let mut state = self.shared.state.lock().await;
        if let Some(previous) = state.open_peer.replace(peer) {
            if previous != peer {
                self.polling.stop(ScopeKey::Conversation(previous));
            }
        }

        state.store.clear();
        state.scroll.reset();
        state.scroll.force_once();
        if state.registry.mark_read(peer) {
            self.shared.events.emit(SyncEvent::ConversationsChanged {
                conversations: state.registry.visible().to_vec(),
            });
        }
        self.shared.events.emit(SyncEvent::MessagesChanged {
            peer,
            messages: Vec::new(),
        });

        debug!(%peer, "conversation opened");
        self.polling.start(
            ScopeKey::Conversation(peer),
            self.config.conversation_poll_interval,
            ConversationPoller {
                shared: Arc::clone(&self.shared),
                peer,
            },
        );
    }

    /// Close the open conversation, if any.
    pub async fn close_conversation(&self) {
        let mut state = self.shared.state.lock().await;
        if let Some(peer) = state.open_peer.take() {
            self.polling.stop(ScopeKey::Conversation(peer));
            state.store.clear();
            state.scroll.reset();
            debug!(%peer, "conversation closed");
        }
    }

    /// Start a local conversation with an assigned peer and open it.
    pub async fn start_new_conversation(&self, peer: UserId) -> Result<Conversation> {
        let roster = self.identity.roster().await.map_err(MessagingError::Roster)?;
        let user = roster
            .find(peer)
            .ok_or(MessagingError::PeerNotAssigned(peer))?;

        let conversation = {
            let mut state = self.shared.state.lock().await;
            let conversation = state.registry.add_local(user)?.clone();
            self.shared.events.emit(SyncEvent::ConversationsChanged {
                conversations: state.registry.visible().to_vec(),
            });
            conversation
        };
        info!(%peer, "local conversation started");

        self.select_conversation(peer).await;
        Ok(conversation)
    }

    /// Send `body` to the open conversation, then refresh the conversation
    /// list so server and local state reconverge.
    pub async fn send(&self, body: &str) -> Result<SendOutcome> {
        let outcome = self
            .sender
            .send(&self.shared.state, &self.polling, &self.shared.events, body)
            .await?;

        if let Err(err) = self.refresh_conversations().await {
            warn!(%err, "conversation refresh after send failed");
        }
        Ok(outcome)
    }

    /// Fetch the conversation list now. Transport errors go to the caller.
    pub async fn refresh_conversations(&self) -> Result<()> {
        let ticket = self.polling.issue(ScopeKey::ConversationList);
        let remote = self
            .shared
            .transport
            .fetch_conversations()
            .await
            .map_err(MessagingError::Refresh)?;

        let mut state = self.shared.state.lock().await;
        if ticket.is_current() {
            self.shared.commit_conversations(&mut state, remote);
        } else {
            debug!(request_id = ticket.request_id(), "manual refresh superseded");
        }
        Ok(())
    }

    /// Assigned peers that have no conversation yet.
    pub async fn available_peers(&self) -> Result<Vec<User>> {
        let roster = self.identity.roster().await.map_err(MessagingError::Roster)?;
        let state = self.shared.state.lock().await;
        Ok(state.registry.available_peers(&roster.peers))
    }

    pub async fn user_scrolled(&self, position: ScrollPosition) {
        self.shared.state.lock().await.scroll.user_scrolled(position);
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.shared.state.lock().await.registry.visible().to_vec()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.shared.state.lock().await.store.messages().to_vec()
    }

    pub async fn open_peer(&self) -> Option<UserId> {
        self.shared.state.lock().await.open_peer
    }

    /// Message currently awaiting server confirmation.
    pub async fn pending_send(&self) -> Option<Message> {
        self.shared.state.lock().await.pending.clone()
    }

    pub async fn total_unread(&self) -> u32 {
        self.shared.state.lock().await.registry.total_unread()
    }

    pub fn is_polling(&self, scope: ScopeKey) -> bool {
        self.polling.is_active(scope)
    }

    pub fn polling_scopes(&self) -> Vec<ScopeKey> {
        self.polling.active_scopes()
    }

    /// Stop every polling loop.
    pub fn shutdown(&self) {
        self.polling.stop_all();
        info!(user = %self.context.user_id(), "chat session stopped");
    }
}
