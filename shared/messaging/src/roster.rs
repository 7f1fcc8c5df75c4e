//! Coaching assignments: who the current user is allowed to message.

use crate::{User, UserId};
use serde::{Deserialize, Serialize};

/// Role of the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Messages every trainee assigned to them.
    Coach,
    /// Messages their assigned coach.
    Client,
}

/// Peers assigned to the current user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    pub peers: Vec<User>,
}

impl Roster {
    pub fn new(peers: Vec<User>) -> Self {
        Self { peers }
    }

    /// Look up an assigned peer by id.
    pub fn find(&self, peer_id: UserId) -> Option<&User> {
        self.peers.iter().find(|user| user.id == peer_id)
    }

    pub fn contains(&self, peer_id: UserId) -> bool {
        self.find(peer_id).is_some()
    }
}
