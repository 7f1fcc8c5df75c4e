//! Ordered messages of the currently open conversation.

use fitchat_messaging::{Message, MessageId};

/// In-memory message list with cheap change detection.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored history with a freshly fetched one.
    ///
    /// Reports no change when both sequences have the same length and the same
    /// last id, which covers the common "no new activity" poll. Two empty
    /// histories compare equal.
    pub fn replace(&mut self, messages: Vec<Message>) -> bool {
        let same_len = self.messages.len() == messages.len();
        let same_tail = self.messages.last().map(|m| m.id) == messages.last().map(|m| m.id);
        if same_len && same_tail {
            return false;
        }

        self.messages = messages;
        true
    }

    /// Add a confirmed message. A message whose id is already stored is
    /// updated in place rather than duplicated.
    pub fn append(&mut self, message: Message) -> bool {
        match self.position(&message.id) {
            Some(pos) => self.messages[pos] = message,
            None => self.messages.push(message),
        }
        true
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == *id)
    }
}
