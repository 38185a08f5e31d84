//! Custom widgets for the chat box

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::theme::Theme;
use crate::chat::{
    FeedbackView, Message, Role, Transcript, DETAIL_PLACEHOLDER, ERROR_TEXT, HELPFUL_LABEL,
    NOT_HELPFUL_LABEL, PROMPT_TITLE,
};

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Wrap a long string into multiple lines, respecting unicode width
pub fn wrap_text(text: &str, max_width: usize, indent: &str) -> Vec<String> {
    if max_width == 0 {
        return vec![text.to_string()];
    }

    let content_width = max_width.saturating_sub(indent.width());
    if content_width == 0 || text.width() <= content_width {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_width = 0;

    for c in text.chars() {
        let char_width = c.width().unwrap_or(1);
        if current_width + char_width > content_width && !current_line.is_empty() {
            lines.push(std::mem::take(&mut current_line));
            current_width = 0;
        }
        current_line.push(c);
        current_width += char_width;
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines
}

/// Render one message: badge line, wrapped body and source annotation
pub fn render_message_lines(msg: &Message, max_width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let content_width = max_width.saturating_sub(4);

    let (badge_text, badge_style) = match msg.role() {
        Role::User => (" 你 ", Theme::user_badge()),
        Role::System => (" 客服 ", Theme::bot_badge()),
    };
    lines.push(Line::from(vec![
        Span::styled(badge_text, badge_style),
        Span::styled(format!(" {}", msg.timestamp()), Theme::muted()),
    ]));

    let body_style = if msg.text() == ERROR_TEXT {
        Theme::error()
    } else {
        Theme::text()
    };
    for content_line in msg.text().lines() {
        for (i, wrapped) in wrap_text(content_line, content_width, "  ").into_iter().enumerate() {
            let indent = if i == 0 { "  " } else { "    " };
            lines.push(Line::from(vec![
                Span::raw(indent),
                Span::styled(wrapped, body_style),
            ]));
        }
    }

    let annotation = msg.source_annotation();
    if !annotation.is_empty() {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(annotation, Theme::source()),
        ]));
    }

    lines
}

/// Render the feedback area under an answer
pub fn render_feedback_lines(view: &FeedbackView, max_width: usize) -> Vec<Line<'static>> {
    let button = |key: &str, label: &str| {
        Span::styled(format!("[{key} {label}]"), Theme::button())
    };

    match view {
        FeedbackView::Prompt { .. } => vec![Line::from(vec![
            Span::raw("  "),
            Span::styled(PROMPT_TITLE, Theme::warning()),
            Span::raw(" "),
            button("+", HELPFUL_LABEL),
            Span::raw(" "),
            button("-", NOT_HELPFUL_LABEL),
        ])],
        FeedbackView::DetailForm { text, .. } => {
            let mut lines = vec![Line::from(vec![
                Span::raw("  "),
                Span::styled(PROMPT_TITLE, Theme::warning()),
            ])];
            if text.is_empty() {
                lines.push(Line::from(vec![
                    Span::styled("  │ ", Theme::border_focused()),
                    Span::styled(DETAIL_PLACEHOLDER, Theme::muted()),
                ]));
            } else {
                for wrapped in wrap_text(text, max_width.saturating_sub(4), "  │ ") {
                    lines.push(Line::from(vec![
                        Span::styled("  │ ", Theme::border_focused()),
                        Span::styled(wrapped, Theme::text()),
                    ]));
                }
            }
            lines.push(Line::from(vec![
                Span::raw("  "),
                button("Enter", "送出"),
                Span::raw(" "),
                button("Esc", "取消"),
            ]));
            lines
        }
        FeedbackView::Thanks { text, .. } => vec![acknowledgment_line(text)],
        FeedbackView::Removed { .. } => Vec::new(),
    }
}

fn acknowledgment_line(text: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("✓ {text}"), Theme::success()),
    ])
}

/// Render the whole thread with its feedback areas
pub fn render_thread_lines(transcript: &Transcript, max_width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (id, msg) in &transcript.messages {
        lines.extend(render_message_lines(msg, max_width));
        if let Some(text) = transcript.acknowledgment_for(*id) {
            lines.push(acknowledgment_line(text));
        }
        if let Some(view) = transcript.live_feedback.as_ref().filter(|v| v.target() == *id) {
            lines.extend(render_feedback_lines(view, max_width));
        }
        lines.push(Line::from(""));
    }
    lines
}

/// Header bar with the assistant name
pub struct HeaderBar<'a> {
    pub title: &'a str,
    pub web_root: &'a str,
}

impl Widget for HeaderBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 {
            return;
        }

        let title_line = Line::from(vec![
            Span::styled("◆ ", Theme::accent()),
            Span::styled(self.title, Theme::title()),
        ]);
        buf.set_line(area.x + 1, area.y, &title_line, area.width.saturating_sub(2));

        let root_str = format!("{} ", self.web_root);
        let root_len = root_str.width() as u16;
        let root_x = area.x + area.width.saturating_sub(root_len + 1);
        buf.set_span(root_x, area.y, &Span::styled(root_str, Theme::muted()), root_len + 1);
    }
}

/// Status line: spinner while a question is outstanding, otherwise the
/// latest notice
pub struct StatusBar<'a> {
    pub is_sending: bool,
    pub spinner_frame: usize,
    pub notice: Option<&'a str>,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let line = if self.is_sending {
            let frame = SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()];
            Line::from(vec![
                Span::styled(format!("{frame} "), Theme::accent()),
                Span::styled("查詢中，請稍候…", Theme::accent()),
            ])
        } else if let Some(notice) = self.notice {
            Line::from(vec![
                Span::styled("! ", Theme::warning()),
                Span::styled(notice, Theme::warning()),
            ])
        } else {
            Line::from(vec![
                Span::styled("● ", Theme::success()),
                Span::styled("就緒", Theme::dim()),
            ])
        };
        buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(2));
    }
}

/// Input box; greyed out and read-only while disabled
pub struct InputBox<'a> {
    pub content: &'a str,
    pub enabled: bool,
}

impl Widget for InputBox<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.enabled {
            Theme::border_focused()
        } else {
            Theme::border()
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(Span::styled(" 訊息 ", Theme::muted()));

        let inner = block.inner(area);
        block.render(area, buf);

        let (display_text, style) = if !self.enabled {
            ("…等待回覆中", Theme::muted().add_modifier(Modifier::ITALIC))
        } else if self.content.is_empty() {
            ("輸入訊息...", Theme::muted())
        } else {
            (self.content, Theme::text())
        };

        Paragraph::new(display_text)
            .style(style)
            .wrap(Wrap { trim: false })
            .render(inner, buf);
    }
}

/// Key bindings, depending on what currently has focus
pub struct HelpBar {
    pub detail_form_open: bool,
}

impl Widget for HelpBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bindings: &[(&str, &str)] = if self.detail_form_open {
            &[("Enter", "送出意見"), ("Esc", "取消"), ("Ctrl+C", "離開")]
        } else {
            &[
                ("Enter", "傳送"),
                ("Ctrl+O", "選單"),
                ("+/-", "回饋"),
                ("PgUp/PgDn", "捲動"),
                ("Ctrl+C", "離開"),
            ]
        };

        let mut spans = vec![Span::raw(" ")];
        for (i, (key, desc)) in bindings.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", Theme::muted()));
            }
            spans.push(Span::styled(*key, Theme::key()));
            spans.push(Span::styled(format!(" {desc}"), Theme::key_desc()));
        }

        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}
