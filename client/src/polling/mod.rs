//! Timed fetch loops keyed by scope.

mod manager;

pub use manager::{PollingManager, MIN_POLL_INTERVAL};

use crate::transport::{TransportError, TransportResult};
use async_trait::async_trait;
use fitchat_messaging::UserId;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const LIST_SCOPE: &str = "conversation-list";
const CONVERSATION_PREFIX: &str = "conversation:";

/// What a polling session keeps fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    ConversationList,
    Conversation(UserId),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConversationList => f.write_str(LIST_SCOPE),
            Self::Conversation(peer) => write!(f, "{CONVERSATION_PREFIX}{peer}"),
        }
    }
}

impl Serialize for ScopeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Identity of one fetch: the session that issued it plus the scope's
/// monotonic request number. Only the newest request of a live session may
/// commit its result.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    scope: ScopeKey,
    request_id: u64,
    latest: Arc<AtomicU64>,
    token: CancellationToken,
}

impl RequestTicket {
    pub(crate) fn issue(scope: ScopeKey, latest: &Arc<AtomicU64>, token: CancellationToken) -> Self {
        let request_id = latest.fetch_add(1, Ordering::SeqCst) + 1;
        Self {
            scope,
            request_id,
            latest: Arc::clone(latest),
            token,
        }
    }

    pub fn scope(&self) -> ScopeKey {
        self.scope
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// False once the session was stopped or superseded, or a newer request
    /// was issued for the same scope.
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled() && self.latest.load(Ordering::SeqCst) == self.request_id
    }
}

/// Work performed on every tick of a polling session.
#[async_trait]
pub trait Poller: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn fetch(&self) -> TransportResult<Self::Output>;

    /// Commit a fetched result. Only called while `ticket` is current;
    /// implementations that take a lock should re-check it under the lock.
    async fn apply(&self, ticket: &RequestTicket, output: Self::Output);

    /// Called for every failed fetch. The session keeps running.
    async fn on_error(&self, _ticket: &RequestTicket, _error: TransportError) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_key_text_form() {
        assert_eq!(ScopeKey::ConversationList.to_string(), "conversation-list");
        assert_eq!(ScopeKey::Conversation(UserId(7)).to_string(), "conversation:7");
    }

    #[test]
    fn test_ticket_superseded_by_newer_request() {
        let latest = Arc::new(AtomicU64::new(0));
        let token = CancellationToken::new();

        let first = RequestTicket::issue(ScopeKey::ConversationList, &latest, token.clone());
        assert!(first.is_current());

        let second = RequestTicket::issue(ScopeKey::ConversationList, &latest, token.clone());
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(second.request_id(), 2);

        token.cancel();
        assert!(!second.is_current());
    }
}
