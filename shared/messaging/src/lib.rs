//! Conversation and message models shared across FitChat clients and services.

pub mod roster;

pub use roster::{Role, Roster};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Backend-assigned identifier of a user (coach or client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| ModelError::InvalidUserId(s.to_string()))
    }
}

/// Read-only reference data about a user, owned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl User {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

/// Identifier of a message.
///
/// Persisted messages carry the server id. A message that has not been
/// acknowledged yet carries a locally generated placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Server(i64),
    Pending(Uuid),
}

impl MessageId {
    pub fn pending() -> Self {
        Self::Pending(Uuid::new_v4())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Pending(uuid) => write!(f, "pending-{uuid}"),
        }
    }
}

/// A single text message between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub body: String,
    pub created_ms: i64,
    pub read: bool,
}

impl Message {
    /// Build an unacknowledged message with a placeholder id.
    pub fn draft(sender_id: UserId, receiver_id: UserId, body: impl Into<String>) -> Self {
        Self {
            id: MessageId::pending(),
            sender_id,
            receiver_id,
            body: body.into(),
            created_ms: now_ms(),
            read: false,
        }
    }

    /// The participant that is not `me`.
    pub fn peer_of(&self, me: UserId) -> UserId {
        if self.sender_id == me {
            self.receiver_id
        } else {
            self.sender_id
        }
    }
}

/// Where a conversation entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Reported by the server.
    Remote,
    /// Started on this client, nothing persisted server-side yet.
    Local,
}

/// One entry of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub peer_id: UserId,
    pub last_message: Option<Message>,
    pub unread_count: u32,
    pub origin: Origin,
}

impl Conversation {
    pub fn remote(peer_id: UserId, last_message: Option<Message>, unread_count: u32) -> Self {
        Self {
            peer_id,
            last_message,
            unread_count,
            origin: Origin::Remote,
        }
    }

    pub fn local(peer_id: UserId) -> Self {
        Self {
            peer_id,
            last_message: None,
            unread_count: 0,
            origin: Origin::Local,
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }

    pub fn last_message_id(&self) -> Option<MessageId> {
        self.last_message.as_ref().map(|m| m.id)
    }
}

/// Model-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_serializes_lowercase() {
        let conversation = Conversation::local(UserId(42));
        let json = serde_json::to_value(&conversation).unwrap();

        assert_eq!(json["origin"], "local");
        assert_eq!(json["peer_id"], 42);
        assert!(json["last_message"].is_null());
    }

    #[test]
    fn server_message_id_is_a_plain_number() {
        let json = r#"{"id":99,"sender_id":1,"receiver_id":2,"body":"hi","created_ms":0,"read":false}"#;
        let message: Message = serde_json::from_str(json).unwrap();

        assert_eq!(message.id, MessageId::Server(99));
        assert!(!message.id.is_pending());
    }

    #[test]
    fn draft_carries_placeholder_id() {
        let draft = Message::draft(UserId(1), UserId(2), "hello");
        assert!(draft.id.is_pending());
        assert_eq!(draft.peer_of(UserId(1)), UserId(2));
        assert_eq!(draft.peer_of(UserId(2)), UserId(1));
    }

    #[test]
    fn user_id_parsing() {
        assert_eq!("17".parse::<UserId>().unwrap(), UserId(17));
        assert!(matches!(
            "seventeen".parse::<UserId>(),
            Err(ModelError::InvalidUserId(_))
        ));
    }
}
