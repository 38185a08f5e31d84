//! Satisfaction feedback under the latest answer
//!
//! At most one feedback widget is live in the whole thread. The controller
//! owns the only slot; `attach` replaces whatever is in it, in any phase.
//!
//! ```text
//!   attach ──> Prompted ──accept──────────────> Submitted (slot emptied)
//!                 │   ^
//!           reject│   │cancel (text cleared)
//!                 v   │
//!            DetailFormOpen ──submit_detail──> Submitted (slot emptied)
//! ```

use tracing::debug;

use super::message::MessageId;
use super::sink::{FeedbackView, RenderSink};
use crate::protocol::Verdict;

pub const PROMPT_TITLE: &str = "這則回覆是否有幫助？";
pub const HELPFUL_LABEL: &str = "滿意";
pub const NOT_HELPFUL_LABEL: &str = "不滿意";
pub const DETAIL_PLACEHOLDER: &str = "可簡述哪裡不滿意（選填）";
pub const THANKS_TEXT: &str = "感謝您的回饋！";
pub const DETAIL_THANKS_TEXT: &str = "已收到您的意見，感謝提供！";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackPhase {
    Prompted,
    DetailFormOpen,
    Submitted,
}

/// The live feedback widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackState {
    pub target: MessageId,
    pub phase: FeedbackPhase,
    /// Text typed into the detail box; only meaningful in `DetailFormOpen`
    pub detail: String,
}

/// What a finished widget collected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRecord {
    pub target: MessageId,
    /// Always `Submitted`; the slot is empty once a record exists
    pub phase: FeedbackPhase,
    pub verdict: Verdict,
    pub detail: String,
}

/// Owner of the single feedback slot
#[derive(Debug, Default)]
pub struct FeedbackController {
    slot: Option<FeedbackState>,
}

impl FeedbackController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<&FeedbackState> {
        self.slot.as_ref()
    }

    pub fn phase(&self) -> Option<FeedbackPhase> {
        self.slot.as_ref().map(|s| s.phase)
    }

    pub fn target(&self) -> Option<MessageId> {
        self.slot.as_ref().map(|s| s.target)
    }

    /// Drop any live widget, then prompt under `target`.
    pub fn attach(&mut self, target: MessageId, sink: &mut dyn RenderSink) {
        self.destroy(sink);
        self.slot = Some(FeedbackState {
            target,
            phase: FeedbackPhase::Prompted,
            detail: String::new(),
        });
        debug!(msg_id = target.index(), "Feedback prompt attached");
        sink.render_feedback(&FeedbackView::Prompt { target });
    }

    /// Remove the live widget without an acknowledgment. No-op when empty.
    pub fn destroy(&mut self, sink: &mut dyn RenderSink) {
        if let Some(old) = self.slot.take() {
            debug!(msg_id = old.target.index(), phase = ?old.phase, "Feedback widget removed");
            sink.render_feedback(&FeedbackView::Removed { target: old.target });
        }
    }

    /// "Helpful" on a prompted widget. Finishes the widget.
    pub fn accept(&mut self, sink: &mut dyn RenderSink) -> Option<FeedbackRecord> {
        let state = self.take_in_phase(FeedbackPhase::Prompted)?;
        Some(Self::finish(state, Verdict::Helpful, String::new(), THANKS_TEXT, sink))
    }

    /// "Not helpful" on a prompted widget. Opens the detail form.
    pub fn reject(&mut self, sink: &mut dyn RenderSink) -> bool {
        match self.slot.as_mut() {
            Some(state) if state.phase == FeedbackPhase::Prompted => {
                state.phase = FeedbackPhase::DetailFormOpen;
                state.detail.clear();
                sink.render_feedback(&FeedbackView::DetailForm {
                    target: state.target,
                    text: String::new(),
                });
                true
            }
            _ => false,
        }
    }

    /// Replace the text of an open detail form.
    pub fn edit_detail(&mut self, text: &str, sink: &mut dyn RenderSink) -> bool {
        match self.slot.as_mut() {
            Some(state) if state.phase == FeedbackPhase::DetailFormOpen => {
                state.detail = text.to_string();
                sink.render_feedback(&FeedbackView::DetailForm {
                    target: state.target,
                    text: state.detail.clone(),
                });
                true
            }
            _ => false,
        }
    }

    /// Close the detail form, clear its text and go back to the prompt.
    pub fn cancel(&mut self, sink: &mut dyn RenderSink) -> bool {
        match self.slot.as_mut() {
            Some(state) if state.phase == FeedbackPhase::DetailFormOpen => {
                state.phase = FeedbackPhase::Prompted;
                state.detail.clear();
                sink.render_feedback(&FeedbackView::Prompt { target: state.target });
                true
            }
            _ => false,
        }
    }

    /// Submit the detail form. `text` may be empty.
    pub fn submit_detail(&mut self, text: &str, sink: &mut dyn RenderSink) -> Option<FeedbackRecord> {
        let state = self.take_in_phase(FeedbackPhase::DetailFormOpen)?;
        let detail = text.trim().to_string();
        Some(Self::finish(state, Verdict::NotHelpful, detail, DETAIL_THANKS_TEXT, sink))
    }

    fn take_in_phase(&mut self, phase: FeedbackPhase) -> Option<FeedbackState> {
        if self.phase() == Some(phase) {
            self.slot.take()
        } else {
            None
        }
    }

    fn finish(
        state: FeedbackState,
        verdict: Verdict,
        detail: String,
        thanks: &'static str,
        sink: &mut dyn RenderSink,
    ) -> FeedbackRecord {
        debug!(msg_id = state.target.index(), ?verdict, "Feedback submitted");
        sink.render_feedback(&FeedbackView::Thanks {
            target: state.target,
            text: thanks,
        });
        FeedbackRecord {
            target: state.target,
            phase: FeedbackPhase::Submitted,
            verdict,
            detail,
        }
    }
}
