//! Merged view of server-reported and locally started conversations.

use crate::messaging::{MessagingError, Result};
use fitchat_messaging::{Conversation, Message, Origin, User, UserId};
use std::collections::HashSet;
use tracing::debug;

/// Conversation list state.
///
/// Three disjoint sets feed the visible list: the latest server payload,
/// conversations promoted on this client that the server has not reported
/// yet, and local conversations nothing has been sent in.
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    remote: Vec<Conversation>,
    promoted: Vec<Conversation>,
    local: Vec<Conversation>,
    promoted_peers: HashSet<UserId>,
    visible: Vec<Conversation>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a server payload and report whether the visible list changed.
    pub fn merge_remote(&mut self, remote_list: Vec<Conversation>) -> bool {
        let mut seen = HashSet::new();
        let mut remote = Vec::with_capacity(remote_list.len());
        for mut conversation in remote_list {
            if seen.insert(conversation.peer_id) {
                conversation.origin = Origin::Remote;
                remote.push(conversation);
            } else {
                debug!(peer = %conversation.peer_id, "dropping duplicate peer in server payload");
            }
        }

        let promoted_peers = &mut self.promoted_peers;
        self.local.retain(|local| {
            if seen.contains(&local.peer_id) {
                debug!(peer = %local.peer_id, "local conversation promoted by server");
                promoted_peers.insert(local.peer_id);
                false
            } else {
                true
            }
        });
        self.promoted.retain(|c| !seen.contains(&c.peer_id));
        self.remote = remote;

        self.rebuild()
    }

    /// Start a conversation that only exists on this client.
    pub fn add_local(&mut self, peer: &User) -> Result<&Conversation> {
        if self.contains(peer.id) || self.promoted_peers.contains(&peer.id) {
            return Err(MessagingError::DuplicatePeer(peer.id));
        }

        self.local.push(Conversation::local(peer.id));
        self.rebuild();
        self.get(peer.id)
            .ok_or(MessagingError::DuplicatePeer(peer.id))
    }

    /// Record a confirmed outgoing message, promoting a local conversation.
    ///
    /// Returns `true` when a local entry was promoted.
    pub fn promote(&mut self, peer: UserId, message: &Message) -> bool {
        let was_local = match self.local.iter().position(|c| c.peer_id == peer) {
            Some(pos) => {
                self.local.remove(pos);
                self.promoted_peers.insert(peer);
                true
            }
            None => false,
        };

        if let Some(existing) = self.remote.iter_mut().find(|c| c.peer_id == peer) {
            existing.last_message = Some(message.clone());
        } else if let Some(existing) = self.promoted.iter_mut().find(|c| c.peer_id == peer) {
            existing.last_message = Some(message.clone());
        } else {
            self.promoted_peers.insert(peer);
            self.promoted
                .push(Conversation::remote(peer, Some(message.clone()), 0));
        }

        self.rebuild();
        was_local
    }

    /// Clear the unread counter of `peer` locally. Returns whether it changed.
    pub fn mark_read(&mut self, peer: UserId) -> bool {
        let mut changed = false;
        for conversation in self
            .remote
            .iter_mut()
            .chain(self.promoted.iter_mut())
            .filter(|c| c.peer_id == peer && c.unread_count > 0)
        {
            conversation.unread_count = 0;
            changed = true;
        }
        if changed {
            self.rebuild();
        }
        changed
    }

    /// Assigned peers without any conversation entry yet.
    pub fn available_peers(&self, assigned: &[User]) -> Vec<User> {
        assigned
            .iter()
            .filter(|user| !self.contains(user.id) && !self.promoted_peers.contains(&user.id))
            .cloned()
            .collect()
    }

    pub fn visible(&self) -> &[Conversation] {
        &self.visible
    }

    pub fn get(&self, peer: UserId) -> Option<&Conversation> {
        self.visible.iter().find(|c| c.peer_id == peer)
    }

    pub fn contains(&self, peer: UserId) -> bool {
        self.get(peer).is_some()
    }

    pub fn is_local(&self, peer: UserId) -> bool {
        self.get(peer).is_some_and(Conversation::is_local)
    }

    pub fn total_unread(&self) -> u32 {
        self.visible.iter().map(|c| c.unread_count).sum()
    }

    fn rebuild(&mut self) -> bool {
        let next: Vec<Conversation> = self
            .remote
            .iter()
            .chain(self.promoted.iter())
            .chain(self.local.iter())
            .cloned()
            .collect();
        let changed = has_changed(&self.visible, &next);
        self.visible = next;
        changed
    }
}

/// Whether a redraw is needed to go from `previous` to `next`.
pub fn has_changed(previous: &[Conversation], next: &[Conversation]) -> bool {
    if previous.len() != next.len() {
        return true;
    }

    next.iter().any(|candidate| {
        match previous.iter().find(|p| p.peer_id == candidate.peer_id) {
            Some(before) => {
                before.unread_count != candidate.unread_count
                    || before.origin != candidate.origin
                    || before.last_message_id() != candidate.last_message_id()
            }
            None => true,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitchat_messaging::MessageId;

    fn user(id: i64) -> User {
        User::new(UserId(id), format!("user {id}"))
    }

    fn message(id: i64, peer: i64) -> Message {
        Message {
            id: MessageId::Server(id),
            sender_id: UserId(1),
            receiver_id: UserId(peer),
            body: "hello".into(),
            created_ms: 0,
            read: true,
        }
    }

    fn remote(peer: i64, last: Option<i64>, unread: u32) -> Conversation {
        Conversation::remote(UserId(peer), last.map(|id| message(id, peer)), unread)
    }

    fn peers(registry: &ConversationRegistry) -> Vec<UserId> {
        registry.visible().iter().map(|c| c.peer_id).collect()
    }

    #[test]
    fn test_merge_keeps_server_order_then_local() {
        let mut registry = ConversationRegistry::new();
        registry.add_local(&user(9)).unwrap();

        assert!(registry.merge_remote(vec![remote(3, Some(10), 0), remote(2, Some(8), 1)]));
        assert_eq!(peers(&registry), vec![UserId(3), UserId(2), UserId(9)]);
        assert!(registry.is_local(UserId(9)));
    }

    #[test]
    fn test_remote_shadows_local_with_same_peer() {
        let mut registry = ConversationRegistry::new();
        registry.add_local(&user(4)).unwrap();
        registry.add_local(&user(5)).unwrap();

        registry.merge_remote(vec![remote(4, Some(20), 1)]);

        assert_eq!(peers(&registry), vec![UserId(4), UserId(5)]);
        let entry = registry.get(UserId(4)).unwrap();
        assert_eq!(entry.origin, Origin::Remote);
        assert_eq!(entry.last_message_id(), Some(MessageId::Server(20)));
    }

    #[test]
    fn test_duplicate_peers_in_payload_collapse() {
        let mut registry = ConversationRegistry::new();
        registry.merge_remote(vec![remote(2, Some(5), 0), remote(2, Some(6), 3)]);

        assert_eq!(peers(&registry), vec![UserId(2)]);
        assert_eq!(registry.get(UserId(2)).unwrap().unread_count, 0);
    }

    #[test]
    fn test_add_local_rejects_duplicates_and_leaves_registry_unchanged() {
        let mut registry = ConversationRegistry::new();
        registry.merge_remote(vec![remote(2, Some(5), 0)]);
        registry.add_local(&user(42)).unwrap();
        let before = registry.visible().to_vec();

        assert_eq!(
            registry.add_local(&user(42)).unwrap_err(),
            MessagingError::DuplicatePeer(UserId(42))
        );
        assert_eq!(
            registry.add_local(&user(2)).unwrap_err(),
            MessagingError::DuplicatePeer(UserId(2))
        );
        assert_eq!(registry.visible(), before.as_slice());
    }

    #[test]
    fn test_promotion_is_not_undone_by_lagging_server() {
        let mut registry = ConversationRegistry::new();
        registry.add_local(&user(42)).unwrap();

        assert!(registry.promote(UserId(42), &message(99, 42)));
        let entry = registry.get(UserId(42)).unwrap();
        assert_eq!(entry.origin, Origin::Remote);
        assert_eq!(entry.last_message_id(), Some(MessageId::Server(99)));

        // Server has not caught up yet.
        registry.merge_remote(vec![remote(3, Some(1), 0)]);
        assert!(!registry.is_local(UserId(42)));
        assert_eq!(registry.get(UserId(42)).unwrap().origin, Origin::Remote);
        assert!(registry.add_local(&user(42)).is_err());

        // Server caught up: its entry replaces the promoted one.
        registry.merge_remote(vec![remote(42, Some(99), 0), remote(3, Some(1), 0)]);
        assert_eq!(peers(&registry), vec![UserId(42), UserId(3)]);

        // Server drops it again: still never local.
        registry.merge_remote(vec![remote(3, Some(1), 0)]);
        assert_eq!(peers(&registry), vec![UserId(3)]);
        assert!(registry.available_peers(&[user(42)]).is_empty());
    }

    #[test]
    fn test_promote_existing_remote_only_updates_last_message() {
        let mut registry = ConversationRegistry::new();
        registry.merge_remote(vec![remote(2, Some(5), 0)]);

        assert!(!registry.promote(UserId(2), &message(6, 2)));
        assert_eq!(peers(&registry), vec![UserId(2)]);
        assert_eq!(
            registry.get(UserId(2)).unwrap().last_message_id(),
            Some(MessageId::Server(6))
        );
    }

    #[test]
    fn test_identical_poll_is_not_a_change() {
        let mut registry = ConversationRegistry::new();
        assert!(registry.merge_remote(vec![remote(2, Some(5), 1)]));
        assert!(!registry.merge_remote(vec![remote(2, Some(5), 1)]));
        assert!(registry.merge_remote(vec![remote(2, Some(5), 2)]));
        assert!(registry.merge_remote(vec![remote(2, Some(6), 2)]));
        assert!(registry.merge_remote(Vec::new()));
        assert!(!registry.merge_remote(Vec::new()));
    }

    #[test]
    fn test_has_changed_rules() {
        let a = vec![remote(1, Some(1), 0), remote(2, Some(2), 0)];

        assert!(!has_changed(&a, &a.clone()));
        assert!(has_changed(&a, &a[..1]));
        assert!(has_changed(&a, &[remote(1, Some(1), 0), remote(3, Some(2), 0)]));
        assert!(has_changed(&a, &[remote(1, Some(1), 4), remote(2, Some(2), 0)]));
        assert!(has_changed(&a, &[remote(1, Some(7), 0), remote(2, Some(2), 0)]));
        assert!(!has_changed(&[], &[]));
    }

    #[test]
    fn test_available_peers_excludes_remote_and_local() {
        let mut registry = ConversationRegistry::new();
        registry.merge_remote(vec![remote(2, Some(5), 0)]);
        registry.add_local(&user(3)).unwrap();

        let assigned = vec![user(2), user(3), user(4)];
        assert_eq!(registry.available_peers(&assigned), vec![user(4)]);
    }

    #[test]
    fn test_mark_read_and_total_unread() {
        let mut registry = ConversationRegistry::new();
        registry.merge_remote(vec![remote(2, Some(5), 2), remote(3, Some(6), 1)]);
        assert_eq!(registry.total_unread(), 3);

        assert!(registry.mark_read(UserId(2)));
        assert!(!registry.mark_read(UserId(2)));
        assert_eq!(registry.total_unread(), 1);
    }
}
