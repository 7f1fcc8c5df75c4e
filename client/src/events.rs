//! Notifications delivered to the UI layer.

use crate::polling::ScopeKey;
use crate::transport::TransportError;
use fitchat_messaging::{Conversation, Message, UserId};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// The visible conversation list changed.
    ConversationsChanged { conversations: Vec<Conversation> },
    /// The open conversation's history changed.
    MessagesChanged { peer: UserId, messages: Vec<Message> },
    /// The view should jump to the newest message.
    ScrollRequested { peer: UserId },
    /// A background fetch failed; polling continues.
    FetchFailed {
        scope: ScopeKey,
        #[serde(serialize_with = "display")]
        error: TransportError,
    },
}

/// Fan-out of [`SyncEvent`]s. Emitting with no subscriber is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        if self.tx.send(event).is_err() {
            trace!("sync event dropped, no subscribers");
        }
    }
}

fn display<S: serde::Serializer>(error: &TransportError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_every_subscriber() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(SyncEvent::ScrollRequested { peer: UserId(7) });

        assert!(matches!(first.recv().await.unwrap(), SyncEvent::ScrollRequested { peer } if peer == UserId(7)));
        assert!(matches!(second.recv().await.unwrap(), SyncEvent::ScrollRequested { .. }));
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(8);
        bus.emit(SyncEvent::ScrollRequested { peer: UserId(1) });
    }

    #[test]
    fn test_event_json_shape() {
        let event = SyncEvent::FetchFailed {
            scope: ScopeKey::Conversation(UserId(3)),
            error: TransportError::Unavailable,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "fetch_failed");
        assert_eq!(json["scope"], "conversation:3");
        assert_eq!(json["error"], "backend unavailable");
    }
}
