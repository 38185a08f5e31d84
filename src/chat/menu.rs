//! Shortcut menu: canned replies that never touch the network

use super::feedback::FeedbackController;
use super::message::{Message, MessageId};
use super::sink::RenderSink;
use super::thread::ThreadStore;

/// A shortcut topic and its canned reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuEntry {
    pub key: &'static str,
    pub reply: &'static str,
}

/// The four shortcut topics, in menu order
pub const MENU_ENTRIES: [MenuEntry; 4] = [
    MenuEntry {
        key: "交通路況",
        reply: "您想查哪一路段的交通路況呢？",
    },
    MenuEntry {
        key: "行車安全",
        reply: "您想了解哪一類行車安全資訊呢？例如道路交通規則、速限與酒駕規範、惡劣天候行車建議、事故處理與通報流程等。",
    },
    MenuEntry {
        key: "服務資訊",
        reply: "請問您欲查詢哪一項服務資訊呢？如收費與計費方式、服務區設施與營業時段、停車與轉乘、客服通道等，我將為您詳盡說明。",
    },
    MenuEntry {
        key: "常見問題",
        reply: "請告訴我您關心的主題，我可提供帳號設定、功能使用指引、故障排除、通知與權限等常見問題的解答。",
    },
];

/// Routes exact shortcut keys to their canned replies
#[derive(Debug, Clone, Copy)]
pub struct MenuRouter {
    entries: &'static [MenuEntry],
}

impl Default for MenuRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuRouter {
    pub fn new() -> Self {
        Self {
            entries: &MENU_ENTRIES,
        }
    }

    pub fn entries(&self) -> &'static [MenuEntry] {
        self.entries
    }

    /// Exact-match lookup, no side effects
    pub fn lookup(&self, key: &str) -> Option<&'static MenuEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// Answer a shortcut locally: user message, canned reply, fresh feedback prompt.
    ///
    /// Returns the entry and the id of the reply, or `None` when `key` is not a
    /// shortcut (nothing is rendered in that case).
    pub fn route(
        &self,
        key: &str,
        thread: &mut ThreadStore,
        feedback: &mut FeedbackController,
        sink: &mut dyn RenderSink,
    ) -> Option<(&'static MenuEntry, MessageId)> {
        let entry = self.lookup(key)?;
        thread.append(Message::user(entry.key), sink);
        let reply = thread.append(Message::system(entry.reply), sink);
        feedback.attach(reply, sink);
        Some((entry, reply))
    }
}
