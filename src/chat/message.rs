//! Thread messages

use chrono::{DateTime, Local, Timelike};

use crate::protocol::PageRef;

/// Position of a message in the thread. Assigned by the thread store on append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub(crate) usize);

impl MessageId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    System,
}

/// A rendered chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    text: String,
    timestamp: String,
    source_refs: Vec<PageRef>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into(), Vec::new())
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text.into(), Vec::new())
    }

    /// A system answer citing source pages
    pub fn answer(text: impl Into<String>, source_refs: Vec<PageRef>) -> Self {
        Self::new(Role::System, text.into(), source_refs)
    }

    fn new(role: Role, text: String, source_refs: Vec<PageRef>) -> Self {
        Self {
            role,
            text,
            timestamp: clock_text(&Local::now()),
            source_refs,
        }
    }

    /// Replace the generated timestamp (used when replaying fixed transcripts)
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn source_refs(&self) -> &[PageRef] {
        &self.source_refs
    }

    /// Source annotation shown under an answer, e.g. `（第 12, 13 頁）`.
    /// Empty when the answer cites no pages.
    pub fn source_annotation(&self) -> String {
        if self.source_refs.is_empty() {
            return String::new();
        }
        let pages = self
            .source_refs
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!("（第 {pages} 頁）")
    }
}

/// Format a wall-clock time the way the chat box shows it: `下午 03:04`
pub fn clock_text(time: &DateTime<Local>) -> String {
    let (is_pm, hour) = time.hour12();
    let half = if is_pm { "下午" } else { "上午" };
    format!("{half} {hour:02}:{:02}", time.minute())
}
