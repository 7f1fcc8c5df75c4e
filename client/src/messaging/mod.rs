//! Open-conversation message state and the confirmation-first send path.

mod sender;
mod store;

pub use sender::{SendCoordinator, SendOutcome};
pub use store::MessageStore;

use crate::transport::TransportError;
use fitchat_messaging::UserId;

/// Errors surfaced to the caller of a user action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessagingError {
    #[error("a conversation with user {0} already exists")]
    DuplicatePeer(UserId),
    #[error("message body is empty")]
    EmptyBody,
    #[error("no conversation is open")]
    NoPeerSelected,
    #[error("user {0} is not assigned to the current user")]
    PeerNotAssigned(UserId),
    #[error("send failed: {0}")]
    SendFailure(#[source] TransportError),
    #[error("conversation refresh failed: {0}")]
    Refresh(#[source] TransportError),
    #[error("roster unavailable: {0}")]
    Roster(#[source] TransportError),
}

pub type Result<T> = std::result::Result<T, MessagingError>;
