//! Main TUI application

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Margin},
    text::Line,
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::commands::{apply, parse_command, ChatCommand, CommandOutcome, ParsedCommand};
use super::input::{InputAction, InputState};
use super::menu_panel::{MenuAction, MenuPanel};
use super::theme::Theme;
use super::widgets::{render_thread_lines, HeaderBar, HelpBar, InputBox, StatusBar};
use crate::backend::{spawn_query, AnswerService, FeedbackReporter};
use crate::chat::{ChatWidget, FeedbackPhase, PendingQuestion, Submission, Transcript};
use crate::protocol::{AnswerResponse, FeedbackReport};
use crate::Result;

const TITLE: &str = "AI 路況小幫手";
const BUSY_NOTICE: &str = "查詢中，請稍候";
const SCROLL_PAGE: usize = 10;
const SCROLL_WHEEL: usize = 3;

/// Everything the chat box shows and how keys drive it, without a terminal
pub struct ChatScreen {
    widget: ChatWidget<Transcript>,
    service: Arc<dyn AnswerService>,
    reporter: Option<FeedbackReporter>,
    input: InputState,
    /// Buffer behind the "not helpful" detail form
    detail_input: InputState,
    menu: MenuPanel,
    /// The question whose answer is on its way over `answer_rx`
    in_flight: Option<PendingQuestion>,
    answer_tx: mpsc::UnboundedSender<Result<AnswerResponse>>,
    answer_rx: mpsc::UnboundedReceiver<Result<AnswerResponse>>,
    notice: Option<String>,
    /// Lines scrolled up from the bottom of the thread
    scroll_offset: usize,
    should_quit: bool,
}

impl ChatScreen {
    pub fn new(
        service: Arc<dyn AnswerService>,
        reporter: Option<FeedbackReporter>,
        menu_label: &str,
    ) -> Self {
        let mut widget = ChatWidget::new(Transcript::new()).with_menu_label(menu_label);
        widget.greet();
        let menu = MenuPanel::new(widget.router().entries());
        let (answer_tx, answer_rx) = mpsc::unbounded_channel();

        Self {
            widget,
            service,
            reporter,
            input: InputState::new(),
            detail_input: InputState::new(),
            menu,
            in_flight: None,
            answer_tx,
            answer_rx,
            notice: None,
            scroll_offset: 0,
            should_quit: false,
        }
    }

    pub fn widget(&self) -> &ChatWidget<Transcript> {
        &self.widget
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn menu_visible(&self) -> bool {
        self.menu.visible
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn detail_form_open(&self) -> bool {
        self.widget.feedback().phase() == Some(FeedbackPhase::DetailFormOpen)
    }

    /// Route one key press to whatever currently has focus
    pub fn handle_key(&mut self, key: KeyEvent) {
        self.notice = None;
        if self.menu.visible {
            self.handle_menu_key(key);
        } else if self.detail_form_open() {
            self.handle_detail_key(key);
        } else {
            self.handle_main_key(key);
        }
    }

    fn handle_menu_key(&mut self, key: KeyEvent) {
        if let MenuAction::Select(entry_key) = self.menu.handle_key(key) {
            if let Submission::Blocked = self.widget.select_shortcut(entry_key) {
                self.notice = Some(BUSY_NOTICE.to_string());
            }
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        // Enter submits even an empty form
        if key.code == KeyCode::Enter {
            let text = std::mem::take(&mut self.detail_input.buffer);
            self.detail_input.clear();
            if let Some(report) = self.widget.submit_feedback_detail(&text) {
                self.send_report(report);
            }
            return;
        }

        match self.detail_input.handle_key(key) {
            InputAction::Edited => {
                self.widget.edit_feedback(&self.detail_input.buffer);
            }
            InputAction::Escape => {
                self.detail_input.clear();
                self.widget.cancel_feedback();
            }
            InputAction::Quit => self.should_quit = true,
            InputAction::ScrollUp => self.scroll_up(SCROLL_PAGE),
            InputAction::ScrollDown => self.scroll_down(SCROLL_PAGE),
            _ => {}
        }
    }

    fn handle_main_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if !self.widget.sink().input_enabled {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('d') if ctrl => self.should_quit = true,
                KeyCode::PageUp => self.scroll_up(SCROLL_PAGE),
                KeyCode::PageDown => self.scroll_down(SCROLL_PAGE),
                _ => self.notice = Some(BUSY_NOTICE.to_string()),
            }
            return;
        }

        // `+` / `-` answer the feedback prompt when nothing is being typed
        if !ctrl
            && self.input.is_empty()
            && self.widget.feedback().phase() == Some(FeedbackPhase::Prompted)
        {
            match key.code {
                KeyCode::Char('+') => {
                    if let Some(report) = self.widget.accept_feedback() {
                        self.send_report(report);
                    }
                    return;
                }
                KeyCode::Char('-') => {
                    self.detail_input.clear();
                    self.widget.reject_feedback();
                    return;
                }
                _ => {}
            }
        }

        match self.input.handle_key(key) {
            InputAction::Submit(text) => self.submit(&text),
            InputAction::Quit => self.should_quit = true,
            InputAction::ToggleMenu => self.menu.toggle(),
            InputAction::ScrollUp => self.scroll_up(SCROLL_PAGE),
            InputAction::ScrollDown => self.scroll_down(SCROLL_PAGE),
            InputAction::Edited | InputAction::Escape | InputAction::None => {}
        }
    }

    fn submit(&mut self, text: &str) {
        if let Some(parsed) = parse_command(text) {
            self.run_command(parsed);
            return;
        }

        match self.widget.submit_text(text) {
            Submission::Pending(pending) => {
                spawn_query(
                    Arc::clone(&self.service),
                    pending.request().clone(),
                    self.answer_tx.clone(),
                );
                self.in_flight = Some(pending);
            }
            Submission::Blocked => self.notice = Some(BUSY_NOTICE.to_string()),
            Submission::Shortcut { .. } | Submission::Ignored => {}
        }
        self.follow_thread();
    }

    fn run_command(&mut self, parsed: ParsedCommand) {
        let (cmd, args) = match parsed {
            ParsedCommand::Command(cmd, args) => (cmd, args),
            ParsedCommand::Unknown(name) => {
                self.notice = Some(format!("未知的指令 /{name}，輸入 /help 查看說明"));
                return;
            }
        };

        match apply(&mut self.widget, cmd, &args) {
            CommandOutcome::Done => {}
            CommandOutcome::Report(report) => self.send_report(report),
            CommandOutcome::ShowMenu => self.menu.open(),
            CommandOutcome::ShowHelp => {
                let names: Vec<String> = ChatCommand::all().iter().map(ToString::to_string).collect();
                self.notice = Some(format!("指令：{}", names.join(" ")));
            }
            CommandOutcome::Quit => self.should_quit = true,
            CommandOutcome::Refused(why) => self.notice = Some(why.to_string()),
        }
        self.follow_thread();
    }

    fn send_report(&self, report: FeedbackReport) {
        match &self.reporter {
            Some(reporter) => {
                reporter.report(report);
            }
            None => debug!(verdict = ?report.verdict, "Feedback kept local, no report endpoint"),
        }
    }

    /// Settle every answer that has arrived, without waiting
    pub fn poll_answers(&mut self) {
        while let Ok(outcome) = self.answer_rx.try_recv() {
            self.settle(outcome);
        }
    }

    /// Wait for the next answer and settle it
    pub async fn next_answer(&mut self) {
        if let Some(outcome) = self.answer_rx.recv().await {
            self.settle(outcome);
        }
    }

    fn settle(&mut self, outcome: Result<AnswerResponse>) {
        match self.in_flight.take() {
            Some(pending) => {
                self.widget.settle(pending, outcome);
            }
            None => warn!("Answer arrived with no question outstanding"),
        }
        self.follow_thread();
    }

    /// Jump back to the newest message after anything was appended
    fn follow_thread(&mut self) {
        if self.widget.sink().scroll_pending {
            self.scroll_offset = 0;
            self.widget.sink_mut().scroll_pending = false;
        }
    }

    fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }
}

/// Terminal front end around a [`ChatScreen`]
pub struct App {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    screen: ChatScreen,
    web_root: String,
    spinner_frame: usize,
}

impl App {
    pub fn new(screen: ChatScreen, web_root: impl Into<String>) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, crossterm::event::EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            screen,
            web_root: web_root.into(),
            spinner_frame: 0,
        })
    }

    /// Run the main event loop
    pub async fn run(&mut self) -> io::Result<()> {
        let poll_timeout = Duration::from_millis(16);
        let spinner_interval = Duration::from_millis(80);
        let mut last_spinner_update = Instant::now();

        while !self.screen.should_quit() {
            self.screen.poll_answers();

            if last_spinner_update.elapsed() >= spinner_interval {
                self.spinner_frame = self.spinner_frame.wrapping_add(1);
                last_spinner_update = Instant::now();
            }

            self.draw()?;

            if event::poll(poll_timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        self.screen.handle_key(key);
                    }
                    Event::Mouse(mouse) => match mouse.kind {
                        MouseEventKind::ScrollUp => self.screen.scroll_up(SCROLL_WHEEL),
                        MouseEventKind::ScrollDown => self.screen.scroll_down(SCROLL_WHEEL),
                        _ => {}
                    },
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn draw(&mut self) -> io::Result<()> {
        let screen = &mut self.screen;
        let web_root = &self.web_root;
        let spinner_frame = self.spinner_frame;

        self.terminal.draw(|f| {
            let size = f.area();

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(1), // Header
                    Constraint::Length(1), // Status
                    Constraint::Min(6),    // Thread
                    Constraint::Length(3), // Input
                    Constraint::Length(1), // Help
                ])
                .split(size);

            f.render_widget(
                HeaderBar {
                    title: TITLE,
                    web_root,
                },
                chunks[0],
            );

            f.render_widget(
                StatusBar {
                    is_sending: screen.widget.is_busy(),
                    spinner_frame,
                    notice: screen.notice.as_deref(),
                },
                chunks[1],
            );

            // Thread, bottom-aligned with scrollback
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title_top(Line::styled(" 對話 ", Theme::muted()));
            let inner = block.inner(chunks[2]);
            f.render_widget(block, chunks[2]);

            let all_lines = render_thread_lines(screen.widget.sink(), inner.width as usize);
            let total_lines = all_lines.len();
            let visible_height = inner.height as usize;
            let max_scroll = total_lines.saturating_sub(visible_height);
            screen.scroll_offset = screen.scroll_offset.min(max_scroll);
            let start = max_scroll - screen.scroll_offset;
            let visible: Vec<Line> = all_lines
                .into_iter()
                .skip(start)
                .take(visible_height)
                .collect();
            f.render_widget(Paragraph::new(visible), inner);

            if total_lines > visible_height {
                let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                    .begin_symbol(Some("▲"))
                    .end_symbol(Some("▼"))
                    .track_symbol(Some("│"))
                    .thumb_symbol("█");
                let mut scrollbar_state =
                    ScrollbarState::new(max_scroll).position(max_scroll - screen.scroll_offset);
                f.render_stateful_widget(
                    scrollbar,
                    chunks[2].inner(Margin {
                        vertical: 1,
                        horizontal: 0,
                    }),
                    &mut scrollbar_state,
                );
            }

            let detail_form_open = screen.detail_form_open();
            let typing = screen.widget.sink().input_enabled && !detail_form_open;
            f.render_widget(
                InputBox {
                    content: &screen.input.buffer,
                    enabled: screen.widget.sink().input_enabled,
                },
                chunks[3],
            );
            if typing && !screen.menu.visible {
                let cursor_x = chunks[3].x + 1 + screen.input.cursor_display_width() as u16;
                f.set_cursor_position((
                    cursor_x.min(chunks[3].x + chunks[3].width.saturating_sub(2)),
                    chunks[3].y + 1,
                ));
            }

            f.render_widget(HelpBar { detail_form_open }, chunks[4]);

            screen.menu.render(chunks[3], f.buffer_mut());
        })?;

        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            crossterm::event::DisableMouseCapture,
            LeaveAlternateScreen
        );
        let _ = self.terminal.show_cursor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{GateState, Role, DETAIL_THANKS_TEXT, MENU_ENTRIES, THANKS_TEXT};
    use crate::protocol::{PageRef, QueryRequest};
    use async_trait::async_trait;

    /// Answers every question with its own text, citing page 1
    struct Echo;

    #[async_trait]
    impl AnswerService for Echo {
        async fn ask(&self, request: &QueryRequest) -> Result<AnswerResponse> {
            Ok(AnswerResponse::new(
                format!("答：{}", request.question),
                vec![PageRef::Number(1)],
            ))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    /// Never answers
    struct Silent;

    #[async_trait]
    impl AnswerService for Silent {
        async fn ask(&self, _request: &QueryRequest) -> Result<AnswerResponse> {
            std::future::pending().await
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_line(screen: &mut ChatScreen, text: &str) {
        for c in text.chars() {
            screen.handle_key(key(KeyCode::Char(c)));
        }
        screen.handle_key(key(KeyCode::Enter));
    }

    fn screen(service: Arc<dyn AnswerService>) -> ChatScreen {
        ChatScreen::new(service, None, "系統QA")
    }

    #[tokio::test]
    async fn test_question_round_trip() {
        let mut s = screen(Arc::new(Echo));
        type_line(&mut s, "國道一號");
        assert_eq!(s.widget().gate_state(), GateState::Sending);

        s.next_answer().await;
        let thread = s.widget().thread().messages();
        assert_eq!(thread.len(), 3);
        assert_eq!(thread[1].role(), Role::User);
        assert_eq!(thread[2].text(), "答：國道一號");
        assert_eq!(s.widget().gate_state(), GateState::Idle);
        assert_eq!(s.widget().feedback().phase(), Some(FeedbackPhase::Prompted));
    }

    #[tokio::test]
    async fn test_keys_refused_while_sending() {
        let mut s = screen(Arc::new(Silent));
        type_line(&mut s, "第一題");
        s.handle_key(key(KeyCode::Char('x')));
        assert!(s.input().is_empty());
        assert_eq!(s.notice(), Some(BUSY_NOTICE));
        assert_eq!(s.widget().thread().len(), 2);
    }

    #[tokio::test]
    async fn test_plus_accepts_feedback() {
        let mut s = screen(Arc::new(Echo));
        type_line(&mut s, "q");
        s.next_answer().await;

        s.handle_key(key(KeyCode::Char('+')));
        let target = s.widget().thread().latest_system().unwrap();
        assert_eq!(s.widget().sink().acknowledgment_for(target), Some(THANKS_TEXT));
        assert!(s.input().is_empty());
    }

    #[tokio::test]
    async fn test_minus_opens_detail_form_then_enter_submits() {
        let mut s = screen(Arc::new(Echo));
        type_line(&mut s, "q");
        s.next_answer().await;

        s.handle_key(key(KeyCode::Char('-')));
        assert!(s.detail_form_open());
        type_line(&mut s, "太慢");
        let target = s.widget().thread().latest_system().unwrap();
        assert_eq!(
            s.widget().sink().acknowledgment_for(target),
            Some(DETAIL_THANKS_TEXT)
        );
        assert!(s.widget().feedback().state().is_none());
    }

    #[tokio::test]
    async fn test_escape_cancels_detail_form() {
        let mut s = screen(Arc::new(Echo));
        type_line(&mut s, "q");
        s.next_answer().await;

        s.handle_key(key(KeyCode::Char('-')));
        s.handle_key(key(KeyCode::Char('慢')));
        s.handle_key(key(KeyCode::Esc));
        let state = s.widget().feedback().state().unwrap();
        assert_eq!(state.phase, FeedbackPhase::Prompted);
        assert!(state.detail.is_empty());
        assert_eq!(s.widget().sink().live_feedback_count(), 1);
        assert!(s.widget().sink().acknowledgments.is_empty());

        // The prompt answers keys again
        s.handle_key(key(KeyCode::Char('+')));
        assert_eq!(s.widget().sink().acknowledgments.len(), 1);
    }

    #[tokio::test]
    async fn test_typing_plus_into_text_is_literal() {
        let mut s = screen(Arc::new(Echo));
        type_line(&mut s, "q");
        s.next_answer().await;

        s.handle_key(key(KeyCode::Char('a')));
        s.handle_key(key(KeyCode::Char('+')));
        assert_eq!(s.input().buffer, "a+");
        assert_eq!(s.widget().feedback().phase(), Some(FeedbackPhase::Prompted));
    }

    #[tokio::test]
    async fn test_menu_panel_selects_shortcut() {
        let mut s = screen(Arc::new(Silent));
        s.handle_key(KeyEvent::new(KeyCode::Char('o'), KeyModifiers::CONTROL));
        assert!(s.menu_visible());
        s.handle_key(key(KeyCode::Enter));

        assert!(!s.menu_visible());
        let last = s.widget().thread().messages().last().unwrap();
        assert_eq!(last.text(), MENU_ENTRIES[0].reply);
        assert_eq!(s.widget().gate_state(), GateState::Idle);
    }

    #[tokio::test]
    async fn test_slash_commands_in_input() {
        let mut s = screen(Arc::new(Silent));
        type_line(&mut s, "/menu 常見問題");
        assert_eq!(
            s.widget().thread().messages().last().unwrap().text(),
            MENU_ENTRIES[3].reply
        );

        type_line(&mut s, "/nope");
        assert!(s.notice().unwrap().contains("/nope"));

        type_line(&mut s, "/quit");
        assert!(s.should_quit());
    }

    #[tokio::test]
    async fn test_scroll_resets_on_new_message() {
        let mut s = screen(Arc::new(Echo));
        s.handle_key(key(KeyCode::PageUp));
        assert_eq!(s.scroll_offset, SCROLL_PAGE);
        type_line(&mut s, "q");
        assert_eq!(s.scroll_offset, 0);
    }
}
