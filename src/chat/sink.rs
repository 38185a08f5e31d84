//! Render sinks
//!
//! The state machine never draws anything itself. Every visible effect goes
//! through a [`RenderSink`], so the same widget can drive the terminal UI, a
//! plain console, or an in-memory transcript in tests.

use std::io::Write;

use super::message::{Message, MessageId, Role};

/// What the feedback area under an answer should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackView {
    /// Helpful / not-helpful choice
    Prompt { target: MessageId },
    /// Free-text detail box with submit/cancel
    DetailForm { target: MessageId, text: String },
    /// Final acknowledgment replacing the widget; it stays in the thread
    Thanks { target: MessageId, text: &'static str },
    /// The live widget under `target` is gone without an acknowledgment
    Removed { target: MessageId },
}

impl FeedbackView {
    pub fn target(&self) -> MessageId {
        match self {
            FeedbackView::Prompt { target }
            | FeedbackView::DetailForm { target, .. }
            | FeedbackView::Thanks { target, .. }
            | FeedbackView::Removed { target } => *target,
        }
    }
}

/// Output channel of the chat widget
pub trait RenderSink {
    /// Show `message` at the end of the thread and scroll to it.
    fn append(&mut self, id: MessageId, message: &Message);

    /// Update the single feedback area.
    fn render_feedback(&mut self, view: &FeedbackView);

    /// Enable or disable the input surface and send control.
    fn set_input_enabled(&mut self, enabled: bool);
}

/// One recorded sink call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Appended(MessageId),
    Feedback(FeedbackView),
    InputEnabled(bool),
}

/// In-memory rendering of the thread.
///
/// Holds exactly what a page would show: the messages, the one live feedback
/// widget, the acknowledgments left behind by finished widgets and whether
/// input is accepted. A transcript built with [`Transcript::recording`] also
/// logs every call in `events`.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub messages: Vec<(MessageId, Message)>,
    pub live_feedback: Option<FeedbackView>,
    pub acknowledgments: Vec<(MessageId, &'static str)>,
    pub input_enabled: bool,
    pub events: Vec<SinkEvent>,
    record_events: bool,
    /// Set on every append; hosts clear it once they have scrolled
    pub scroll_pending: bool,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            live_feedback: None,
            acknowledgments: Vec::new(),
            input_enabled: true,
            events: Vec::new(),
            record_events: false,
            scroll_pending: false,
        }
    }

    /// A transcript that also keeps the call log in `events`
    pub fn recording() -> Self {
        Self {
            record_events: true,
            ..Self::new()
        }
    }

    fn record(&mut self, event: SinkEvent) {
        if self.record_events {
            self.events.push(event);
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last().map(|(_, m)| m)
    }

    /// Acknowledgment left under `target`, if its feedback was submitted
    pub fn acknowledgment_for(&self, target: MessageId) -> Option<&'static str> {
        self.acknowledgments
            .iter()
            .find(|(id, _)| *id == target)
            .map(|(_, text)| *text)
    }

    /// Count of visible interactive feedback widgets (always 0 or 1)
    pub fn live_feedback_count(&self) -> usize {
        usize::from(self.live_feedback.is_some())
    }
}

impl RenderSink for Transcript {
    fn append(&mut self, id: MessageId, message: &Message) {
        self.messages.push((id, message.clone()));
        self.scroll_pending = true;
        self.record(SinkEvent::Appended(id));
    }

    fn render_feedback(&mut self, view: &FeedbackView) {
        match view {
            FeedbackView::Prompt { .. } | FeedbackView::DetailForm { .. } => {
                self.live_feedback = Some(view.clone());
            }
            FeedbackView::Thanks { target, text } => {
                self.live_feedback = None;
                self.acknowledgments.push((*target, *text));
            }
            FeedbackView::Removed { .. } => {
                self.live_feedback = None;
            }
        }
        self.record(SinkEvent::Feedback(view.clone()));
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
        self.record(SinkEvent::InputEnabled(enabled));
    }
}

/// Line-oriented sink for plain console mode
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print a host message that is not part of the thread
    pub fn notice(&mut self, text: &str) {
        self.line(text);
    }

    fn line(&mut self, text: &str) {
        // Console output is best effort; a closed stdout ends the session elsewhere.
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }
}

impl<W: Write> RenderSink for ConsoleSink<W> {
    fn append(&mut self, _id: MessageId, message: &Message) {
        let who = match message.role() {
            Role::User => "你",
            Role::System => "客服",
        };
        self.line(&format!("[{}] {}: {}", message.timestamp(), who, message.text()));
        let annotation = message.source_annotation();
        if !annotation.is_empty() {
            self.line(&format!("    {annotation}"));
        }
    }

    fn render_feedback(&mut self, view: &FeedbackView) {
        match view {
            FeedbackView::Prompt { .. } => {
                self.line("    這則回覆是否有幫助？ /good 滿意 | /bad 不滿意");
            }
            FeedbackView::DetailForm { text, .. } => {
                if text.is_empty() {
                    self.line("    可簡述哪裡不滿意（選填）: /detail <內容> 送出 | /cancel 取消");
                }
            }
            FeedbackView::Thanks { text, .. } => self.line(&format!("    {text}")),
            FeedbackView::Removed { .. } => {}
        }
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.line("    …查詢中，請稍候");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_thanks_clears_live_widget() {
        let mut t = Transcript::new();
        let id = MessageId(0);
        t.append(id, &Message::system("答案"));
        t.render_feedback(&FeedbackView::Prompt { target: id });
        assert_eq!(t.live_feedback_count(), 1);

        t.render_feedback(&FeedbackView::Thanks { target: id, text: "感謝您的回饋！" });
        assert_eq!(t.live_feedback_count(), 0);
        assert_eq!(t.acknowledgment_for(id), Some("感謝您的回饋！"));
    }

    #[test]
    fn test_transcript_records_only_when_asked() {
        let mut plain = Transcript::new();
        plain.append(MessageId(0), &Message::user("q"));
        plain.set_input_enabled(false);
        assert!(plain.events.is_empty());
        assert_eq!(plain.messages.len(), 1);

        let mut recording = Transcript::recording();
        recording.append(MessageId(0), &Message::user("q"));
        recording.set_input_enabled(false);
        assert_eq!(
            recording.events,
            vec![SinkEvent::Appended(MessageId(0)), SinkEvent::InputEnabled(false)]
        );
    }

    #[test]
    fn test_transcript_append_requests_scroll() {
        let mut t = Transcript::new();
        assert!(!t.scroll_pending);
        t.append(MessageId(0), &Message::user("hi"));
        assert!(t.scroll_pending);
        assert_eq!(t.events, vec![SinkEvent::Appended(MessageId(0))]);
    }

    #[test]
    fn test_console_sink_prints_sources() {
        let mut sink = ConsoleSink::new(Vec::new());
        let msg = Message::answer("道路已恢復通車", vec![12.into()]).with_timestamp("上午 09:00");
        sink.append(MessageId(1), &msg);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("[上午 09:00] 客服: 道路已恢復通車"));
        assert!(out.contains("（第 12 頁）"));
    }
}
