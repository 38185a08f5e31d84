//! Chat widget state machine
//!
//! Four cooperating parts, composed by [`ChatWidget`]:
//! - [`ThreadStore`]: append-only message log
//! - [`RequestGate`]: one outstanding question at a time
//! - [`MenuRouter`]: shortcut topics answered locally
//! - [`FeedbackController`]: one satisfaction prompt under the latest answer
//!
//! All callbacks run to completion on one task. The only suspension point is
//! the remote call, which sits between [`ChatWidget::submit_text`] and
//! [`ChatWidget::settle`].

mod feedback;
mod gate;
mod menu;
mod message;
mod sink;
mod thread;

pub use feedback::{
    FeedbackController, FeedbackPhase, FeedbackRecord, FeedbackState, DETAIL_PLACEHOLDER,
    DETAIL_THANKS_TEXT, HELPFUL_LABEL, NOT_HELPFUL_LABEL, PROMPT_TITLE, THANKS_TEXT,
};
pub use gate::{GateState, RequestGate, Ticket};
pub use menu::{MenuEntry, MenuRouter, MENU_ENTRIES};
pub use message::{clock_text, Message, MessageId, Role};
pub use sink::{ConsoleSink, FeedbackView, RenderSink, SinkEvent, Transcript};
pub use thread::ThreadStore;

use tracing::{info, warn};

use crate::backend::AnswerService;
use crate::protocol::{AnswerResponse, FeedbackReport, QueryRequest, DEFAULT_MENU};
use crate::Result;

/// Shown when the service answers without a usable `answer`
pub const DEFAULT_ANSWER: &str = "很抱歉，找不到答案。";

/// Shown when the remote call fails for any reason
pub const ERROR_TEXT: &str = "❌ 系統發生錯誤，請稍後再試。";

/// Opening message of every session
pub const GREETING: &str = "歡迎使用1968智能客服！\n可詢問：交通狀況、事故通報、國道即時路況等。";

/// A typed question that passed the gate and awaits its remote answer
#[derive(Debug)]
pub struct PendingQuestion {
    ticket: Ticket,
    request: QueryRequest,
}

impl PendingQuestion {
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    pub fn seq(&self) -> u64 {
        self.ticket.seq()
    }
}

/// What happened to a user action
#[derive(Debug)]
pub enum Submission {
    /// Empty or whitespace-only text, or an unknown shortcut key; nothing changed
    Ignored,
    /// A question is outstanding; the action was dropped
    Blocked,
    /// Answered locally from the shortcut menu
    Shortcut {
        entry: &'static MenuEntry,
        reply: MessageId,
    },
    /// The remote call must now be issued, then passed to [`ChatWidget::settle`]
    Pending(PendingQuestion),
}

/// The complete chat widget, rendering through `S`
pub struct ChatWidget<S: RenderSink> {
    thread: ThreadStore,
    gate: RequestGate,
    router: MenuRouter,
    feedback: FeedbackController,
    sink: S,
    menu_label: String,
}

impl<S: RenderSink> ChatWidget<S> {
    pub fn new(sink: S) -> Self {
        Self {
            thread: ThreadStore::new(),
            gate: RequestGate::new(),
            router: MenuRouter::new(),
            feedback: FeedbackController::new(),
            sink,
            menu_label: DEFAULT_MENU.to_string(),
        }
    }

    /// Set the `menu` field sent with typed questions
    pub fn with_menu_label(mut self, label: impl Into<String>) -> Self {
        self.menu_label = label.into();
        self
    }

    /// Append the opening message. No feedback is attached to it.
    pub fn greet(&mut self) -> MessageId {
        self.thread.append(Message::system(GREETING), &mut self.sink)
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn is_busy(&self) -> bool {
        !self.gate.is_idle()
    }

    pub fn thread(&self) -> &ThreadStore {
        &self.thread
    }

    pub fn feedback(&self) -> &FeedbackController {
        &self.feedback
    }

    pub fn router(&self) -> &MenuRouter {
        &self.router
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Handle typed text from the input surface.
    ///
    /// Text equal to a shortcut key is answered locally. Anything else opens
    /// the gate, renders the user message and returns the question to send.
    pub fn submit_text(&mut self, text: &str) -> Submission {
        let text = text.trim();
        if text.is_empty() {
            return Submission::Ignored;
        }
        if self.is_busy() {
            return Submission::Blocked;
        }
        if let Some((entry, reply)) =
            self.router
                .route(text, &mut self.thread, &mut self.feedback, &mut self.sink)
        {
            info!(key = entry.key, "Shortcut answered locally");
            return Submission::Shortcut { entry, reply };
        }

        // Unreachable while idle, but the gate stays the single authority.
        let Some(ticket) = self.gate.try_begin(&mut self.sink) else {
            return Submission::Blocked;
        };
        self.feedback.destroy(&mut self.sink);
        self.thread.append(Message::user(text), &mut self.sink);
        info!(seq = ticket.seq(), "Question submitted");

        Submission::Pending(PendingQuestion {
            ticket,
            request: QueryRequest::new(text, self.menu_label.clone()),
        })
    }

    /// Handle a pick from the shortcut menu panel.
    ///
    /// Refused while a question is outstanding, like typed input.
    pub fn select_shortcut(&mut self, key: &str) -> Submission {
        if self.is_busy() {
            return Submission::Blocked;
        }
        match self
            .router
            .route(key, &mut self.thread, &mut self.feedback, &mut self.sink)
        {
            Some((entry, reply)) => {
                info!(key = entry.key, "Shortcut answered locally");
                Submission::Shortcut { entry, reply }
            }
            None => Submission::Ignored,
        }
    }

    /// Settle an outstanding question with the remote outcome.
    ///
    /// Always renders one system message, re-opens the gate and attaches a
    /// fresh feedback prompt to that message.
    pub fn settle(&mut self, pending: PendingQuestion, outcome: Result<AnswerResponse>) -> MessageId {
        let message = match outcome {
            Ok(response) => {
                info!(seq = pending.seq(), pages = response.pages.len(), "Answer received");
                let text = response.answer.unwrap_or_else(|| DEFAULT_ANSWER.to_string());
                Message::answer(text, response.pages)
            }
            Err(e) => {
                warn!(seq = pending.seq(), "Answer service failed: {}", e);
                Message::system(ERROR_TEXT)
            }
        };

        let id = self.thread.append(message, &mut self.sink);
        self.gate.settle(pending.ticket, &mut self.sink);
        self.feedback.attach(id, &mut self.sink);
        id
    }

    /// Submit and wait for the answer in one step.
    ///
    /// Returns the id of the system message produced, or `None` when the
    /// text was ignored or blocked.
    pub async fn submit<A>(&mut self, text: &str, service: &A) -> Option<MessageId>
    where
        A: AnswerService + ?Sized,
    {
        match self.submit_text(text) {
            Submission::Pending(pending) => {
                let outcome = service.ask(pending.request()).await;
                Some(self.settle(pending, outcome))
            }
            Submission::Shortcut { reply, .. } => Some(reply),
            Submission::Ignored | Submission::Blocked => None,
        }
    }

    pub fn accept_feedback(&mut self) -> Option<FeedbackReport> {
        let record = self.feedback.accept(&mut self.sink)?;
        Some(self.report_for(record))
    }

    pub fn reject_feedback(&mut self) -> bool {
        self.feedback.reject(&mut self.sink)
    }

    pub fn edit_feedback(&mut self, text: &str) -> bool {
        self.feedback.edit_detail(text, &mut self.sink)
    }

    pub fn cancel_feedback(&mut self) -> bool {
        self.feedback.cancel(&mut self.sink)
    }

    pub fn submit_feedback_detail(&mut self, text: &str) -> Option<FeedbackReport> {
        let record = self.feedback.submit_detail(text, &mut self.sink)?;
        Some(self.report_for(record))
    }

    fn report_for(&self, record: FeedbackRecord) -> FeedbackReport {
        let answer = self
            .thread
            .get(record.target)
            .map(|m| m.text().to_string())
            .unwrap_or_default();
        FeedbackReport {
            answer,
            verdict: record.verdict,
            content: record.detail,
        }
    }
}
