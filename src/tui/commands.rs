//! Slash commands
//!
//! Plain console mode has no buttons, so the shortcut menu and the feedback
//! controls are reached through `/xxx` commands. The terminal UI accepts the
//! same commands in its input box.

use std::fmt;

use crate::chat::{ChatWidget, RenderSink, Submission};
use crate::protocol::FeedbackReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// List shortcut topics, or pick one: `/menu 交通路況`
    Menu,
    /// Mark the latest answer as helpful
    Good,
    /// Mark the latest answer as not helpful and open the detail form
    Bad,
    /// Submit detail text: `/detail 資訊過時`
    Detail,
    /// Close the detail form without a verdict
    Cancel,
    Help,
    Quit,
}

impl ChatCommand {
    pub fn all() -> &'static [ChatCommand] {
        &[
            ChatCommand::Menu,
            ChatCommand::Good,
            ChatCommand::Bad,
            ChatCommand::Detail,
            ChatCommand::Cancel,
            ChatCommand::Help,
            ChatCommand::Quit,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChatCommand::Menu => "menu",
            ChatCommand::Good => "good",
            ChatCommand::Bad => "bad",
            ChatCommand::Detail => "detail",
            ChatCommand::Cancel => "cancel",
            ChatCommand::Help => "help",
            ChatCommand::Quit => "quit",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChatCommand::Menu => "列出或選擇快捷選單",
            ChatCommand::Good => "回覆有幫助",
            ChatCommand::Bad => "回覆沒有幫助",
            ChatCommand::Detail => "送出不滿意的原因",
            ChatCommand::Cancel => "取消填寫原因",
            ChatCommand::Help => "顯示指令說明",
            ChatCommand::Quit => "離開",
        }
    }

    pub fn takes_args(&self) -> bool {
        matches!(self, ChatCommand::Menu | ChatCommand::Detail)
    }

    pub fn parse(name: &str) -> Option<ChatCommand> {
        let name = name.to_lowercase();
        match name.as_str() {
            "exit" => return Some(ChatCommand::Quit),
            "?" => return Some(ChatCommand::Help),
            _ => {}
        }
        Self::all().iter().find(|cmd| cmd.name() == name).copied()
    }
}

impl fmt::Display for ChatCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Command(ChatCommand, String),
    Unknown(String),
}

/// Parse a `/xxx args` line. Returns `None` for ordinary text.
pub fn parse_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim().strip_prefix('/')?;
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    match ChatCommand::parse(name) {
        Some(cmd) => Some(ParsedCommand::Command(cmd, args.to_string())),
        None => Some(ParsedCommand::Unknown(name.to_string())),
    }
}

/// Result of running a command against the widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The widget rendered the effect itself
    Done,
    /// Feedback finished; the host forwards the report
    Report(FeedbackReport),
    /// `/menu` without a topic; the host shows the choices
    ShowMenu,
    ShowHelp,
    Quit,
    /// Nothing happened; tell the user why
    Refused(&'static str),
}

/// Run `cmd` against the widget
pub fn apply<S: RenderSink>(widget: &mut ChatWidget<S>, cmd: ChatCommand, args: &str) -> CommandOutcome {
    match cmd {
        ChatCommand::Menu if args.is_empty() => CommandOutcome::ShowMenu,
        ChatCommand::Menu => match widget.select_shortcut(args) {
            Submission::Blocked => CommandOutcome::Refused("查詢中，請稍候"),
            Submission::Ignored => CommandOutcome::Refused("沒有這個選項"),
            _ => CommandOutcome::Done,
        },
        ChatCommand::Good => match widget.accept_feedback() {
            Some(report) => CommandOutcome::Report(report),
            None => CommandOutcome::Refused("目前沒有可評分的回覆"),
        },
        ChatCommand::Bad => {
            if widget.reject_feedback() {
                CommandOutcome::Done
            } else {
                CommandOutcome::Refused("目前沒有可評分的回覆")
            }
        }
        ChatCommand::Detail => match widget.submit_feedback_detail(args) {
            Some(report) => CommandOutcome::Report(report),
            None => CommandOutcome::Refused("請先以 /bad 開啟意見欄"),
        },
        ChatCommand::Cancel => {
            if widget.cancel_feedback() {
                CommandOutcome::Done
            } else {
                CommandOutcome::Refused("目前沒有開啟的意見欄")
            }
        }
        ChatCommand::Help => CommandOutcome::ShowHelp,
        ChatCommand::Quit => CommandOutcome::Quit,
    }
}

/// One line per command, for `/help`
pub fn help_lines() -> Vec<String> {
    ChatCommand::all()
        .iter()
        .map(|cmd| {
            let usage = if cmd.takes_args() {
                format!("{cmd} [內容]")
            } else {
                cmd.to_string()
            };
            format!("  {usage:<16} {}", cmd.description())
        })
        .collect()
}
