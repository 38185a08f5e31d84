//! Append-only message thread

use super::message::{Message, MessageId};
use super::sink::RenderSink;

/// Ordered, append-only log of messages for the session.
///
/// There is no removal or mutation; ids are positions in append order.
#[derive(Debug, Default)]
pub struct ThreadStore {
    messages: Vec<Message>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` to the end of the thread and render it.
    pub fn append(&mut self, message: Message, sink: &mut dyn RenderSink) -> MessageId {
        let id = MessageId(self.messages.len());
        sink.append(id, &message);
        self.messages.push(message);
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(id.0)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent system message, if any
    pub fn latest_system(&self) -> Option<MessageId> {
        self.messages
            .iter()
            .rposition(Message::is_system)
            .map(MessageId)
    }
}
