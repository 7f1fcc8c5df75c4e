use crate::conversations::ConversationRegistry;
use crate::messaging::MessageStore;
use crate::scroll::ScrollCoordinator;
use crate::SyncConfig;
use fitchat_messaging::{Message, Role, User, UserId};

/// Who is signed in. Provided once when the session is created.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user: User,
    pub role: Role,
}

impl SessionContext {
    pub fn new(user: User, role: Role) -> Self {
        Self { user, role }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }
}

/// Everything the merge steps mutate. Guarded by a single lock so a merge
/// is never observed half-applied.
#[derive(Debug)]
pub struct SessionState {
    pub open_peer: Option<UserId>,
    pub store: MessageStore,
    pub registry: ConversationRegistry,
    pub scroll: ScrollCoordinator,
    /// Outgoing message awaiting server confirmation. Never part of `store`.
    pub pending: Option<Message>,
}

impl SessionState {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            open_peer: None,
            store: MessageStore::new(),
            registry: ConversationRegistry::new(),
            scroll: ScrollCoordinator::new(config.scroll_threshold, config.scroll_grace),
            pending: None,
        }
    }

    pub fn is_open(&self, peer: UserId) -> bool {
        self.open_peer == Some(peer)
    }
}
