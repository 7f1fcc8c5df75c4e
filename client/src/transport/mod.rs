//! Collaborator interfaces the synchronization core talks to.

mod memory;

pub use memory::InMemoryBackend;

use async_trait::async_trait;
use fitchat_messaging::{Conversation, Message, Roster, UserId};

pub type TransportResult<T> = Result<T, TransportError>;

/// Failure reported by the backend transport. Every variant is treated as
/// transient by the polling loops.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("backend unavailable")]
    Unavailable,
    #[error("request failed: {0}")]
    Request(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected by backend: {0}")]
    Rejected(String),
}

/// Request/response access to the messaging backend.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Conversations of the current user, in server order.
    async fn fetch_conversations(&self) -> TransportResult<Vec<Conversation>>;

    /// Full message history with `peer`, oldest first.
    async fn fetch_messages(&self, peer: UserId) -> TransportResult<Vec<Message>>;

    /// Persist a message and return it with its server id.
    async fn send_message(&self, peer: UserId, body: &str) -> TransportResult<Message>;
}

/// Source of the peers the current user is allowed to message.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn roster(&self) -> TransportResult<Roster>;
}
