//! In-process backend used by the demo binary and the test suites.

use super::{IdentityProvider, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use fitchat_messaging::{Conversation, Message, MessageId, Roster, User, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct BackendState {
    users: HashMap<UserId, User>,
    assignments: HashMap<UserId, Vec<UserId>>,
    messages: Vec<Message>,
    next_message_id: i64,
    failing_fetches: usize,
    failing_sends: usize,
    latency: Duration,
}

#[derive(Debug, Default)]
struct CallCounters {
    conversations: AtomicUsize,
    messages: AtomicUsize,
    sends: AtomicUsize,
}

/// Shared in-memory message store seen from one user's perspective.
///
/// Clones made with [`InMemoryBackend::for_viewer`] share the same data, so a
/// coach and a client session can talk to each other.
#[derive(Clone)]
pub struct InMemoryBackend {
    viewer: UserId,
    state: Arc<RwLock<BackendState>>,
    calls: Arc<CallCounters>,
}

impl InMemoryBackend {
    pub fn new(viewer: UserId) -> Self {
        Self {
            viewer,
            state: Arc::new(RwLock::new(BackendState {
                next_message_id: 1,
                ..BackendState::default()
            })),
            calls: Arc::new(CallCounters::default()),
        }
    }

    /// Same backend data, seen by another user, with its own call counters.
    pub fn for_viewer(&self, viewer: UserId) -> Self {
        Self {
            viewer,
            state: Arc::clone(&self.state),
            calls: Arc::new(CallCounters::default()),
        }
    }

    pub fn viewer(&self) -> UserId {
        self.viewer
    }

    pub async fn add_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    /// Assign `a` and `b` to each other (coach and trainee).
    pub async fn assign(&self, a: UserId, b: UserId) {
        let mut state = self.state.write().await;
        for (from, to) in [(a, b), (b, a)] {
            let peers = state.assignments.entry(from).or_default();
            if !peers.contains(&to) {
                peers.push(to);
            }
        }
    }

    /// Id the next persisted message will receive.
    pub async fn set_next_message_id(&self, id: i64) {
        self.state.write().await.next_message_id = id;
    }

    /// Store a message as if `from` had sent it from another device.
    pub async fn deliver(&self, from: UserId, to: UserId, body: &str) -> Message {
        let mut state = self.state.write().await;
        persist(&mut state, from, to, body)
    }

    /// Make the next `count` fetch calls fail.
    pub async fn fail_fetches(&self, count: usize) {
        self.state.write().await.failing_fetches = count;
    }

    /// Make the next `count` send calls fail.
    pub async fn fail_sends(&self, count: usize) {
        self.state.write().await.failing_sends = count;
    }

    /// Delay applied to every call before it is answered.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.latency = latency;
    }

    pub fn conversation_calls(&self) -> usize {
        self.calls.conversations.load(Ordering::SeqCst)
    }

    pub fn message_calls(&self) -> usize {
        self.calls.messages.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.calls.sends.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = self.state.read().await.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    async fn take_fetch_failure(&self) -> TransportResult<()> {
        let mut state = self.state.write().await;
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(TransportError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for InMemoryBackend {
    async fn fetch_conversations(&self) -> TransportResult<Vec<Conversation>> {
        self.calls.conversations.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.take_fetch_failure().await?;

        let state = self.state.read().await;
        let mut by_peer: HashMap<UserId, Conversation> = HashMap::new();
        for message in state.messages.iter().filter(|m| involves(m, self.viewer)) {
            let peer = message.peer_of(self.viewer);
            let entry = by_peer
                .entry(peer)
                .or_insert_with(|| Conversation::remote(peer, None, 0));
            if message.receiver_id == self.viewer && !message.read {
                entry.unread_count += 1;
            }
            entry.last_message = Some(message.clone());
        }

        // Most recent activity first.
        let mut conversations: Vec<Conversation> = by_peer.into_values().collect();
        conversations.sort_by_key(|c| std::cmp::Reverse(server_id(c.last_message.as_ref())));
        Ok(conversations)
    }

    async fn fetch_messages(&self, peer: UserId) -> TransportResult<Vec<Message>> {
        self.calls.messages.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.take_fetch_failure().await?;

        let mut state = self.state.write().await;
        if !state.users.is_empty() && !state.users.contains_key(&peer) {
            return Err(TransportError::NotFound(format!("user {peer}")));
        }

        let viewer = self.viewer;
        let mut history = Vec::new();
        for message in state.messages.iter_mut() {
            if involves(message, viewer) && message.peer_of(viewer) == peer {
                if message.receiver_id == viewer {
                    message.read = true;
                }
                history.push(message.clone());
            }
        }
        Ok(history)
    }

    async fn send_message(&self, peer: UserId, body: &str) -> TransportResult<Message> {
        self.calls.sends.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut state = self.state.write().await;
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(TransportError::Request("send rejected by test backend".into()));
        }
        if let Some(peers) = state.assignments.get(&self.viewer) {
            if !peers.contains(&peer) {
                return Err(TransportError::Rejected(format!("user {peer} is not assigned")));
            }
        }
        Ok(persist(&mut state, self.viewer, peer, body))
    }
}

#[async_trait]
impl IdentityProvider for InMemoryBackend {
    async fn roster(&self) -> TransportResult<Roster> {
        let state = self.state.read().await;
        let peers: Vec<User> = state
            .assignments
            .get(&self.viewer)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.users.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Roster::new(peers))
    }
}

fn persist(state: &mut BackendState, from: UserId, to: UserId, body: &str) -> Message {
    let id = state.next_message_id;
    state.next_message_id += 1;

    let created_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64;

    let message = Message {
        id: MessageId::Server(id),
        sender_id: from,
        receiver_id: to,
        body: body.to_string(),
        created_ms,
        read: false,
    };
    state.messages.push(message.clone());
    message
}

fn involves(message: &Message, user: UserId) -> bool {
    message.sender_id == user || message.receiver_id == user
}

fn server_id(message: Option<&Message>) -> i64 {
    match message.map(|m| m.id) {
        Some(MessageId::Server(id)) => id,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> InMemoryBackend {
        let backend = InMemoryBackend::new(UserId(1));
        backend.add_user(User::new(UserId(1), "Coach Dana")).await;
        backend.add_user(User::new(UserId(2), "Sam")).await;
        backend.add_user(User::new(UserId(3), "Alex")).await;
        backend.assign(UserId(1), UserId(2)).await;
        backend.assign(UserId(1), UserId(3)).await;
        backend
    }

    #[tokio::test]
    async fn test_conversations_ordered_by_activity() {
        let backend = seeded().await;
        backend.deliver(UserId(2), UserId(1), "morning").await;
        backend.deliver(UserId(3), UserId(1), "done with squats").await;

        let conversations = backend.fetch_conversations().await.unwrap();
        let peers: Vec<UserId> = conversations.iter().map(|c| c.peer_id).collect();
        assert_eq!(peers, vec![UserId(3), UserId(2)]);
        assert!(conversations.iter().all(|c| c.unread_count == 1));
    }

    #[tokio::test]
    async fn test_fetch_messages_marks_incoming_read() {
        let backend = seeded().await;
        backend.deliver(UserId(2), UserId(1), "hi coach").await;

        let history = backend.fetch_messages(UserId(2)).await.unwrap();
        assert_eq!(history.len(), 1);

        let conversations = backend.fetch_conversations().await.unwrap();
        assert_eq!(conversations[0].unread_count, 0);
    }

    #[tokio::test]
    async fn test_send_uses_configured_id_and_checks_assignment() {
        let backend = seeded().await;
        backend.set_next_message_id(99).await;

        let sent = backend.send_message(UserId(2), "hi").await.unwrap();
        assert_eq!(sent.id, MessageId::Server(99));

        backend.add_user(User::new(UserId(4), "Stranger")).await;
        let err = backend.send_message(UserId(4), "hi").await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)));
        assert_eq!(backend.send_calls(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let backend = seeded().await;
        backend.fail_fetches(1).await;

        assert_eq!(backend.fetch_conversations().await, Err(TransportError::Unavailable));
        assert!(backend.fetch_conversations().await.is_ok());
        assert_eq!(backend.conversation_calls(), 2);
    }

    #[tokio::test]
    async fn test_roster_lists_assigned_users() {
        let backend = seeded().await;
        let roster = backend.roster().await.unwrap();
        assert_eq!(roster.peers.len(), 2);

        let client_view = backend.for_viewer(UserId(2));
        let roster = client_view.roster().await.unwrap();
        assert_eq!(roster.peers, vec![User::new(UserId(1), "Coach Dana")]);
    }
}
