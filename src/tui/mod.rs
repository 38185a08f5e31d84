//! Terminal User Interface module
//!
//! A full-screen chat box: thread, feedback card, shortcut menu panel and
//! an input line that locks while a question is outstanding.

mod app;
pub mod commands;
mod input;
mod menu_panel;
mod theme;
mod widgets;

pub use app::{App, ChatScreen};
pub use commands::{apply, help_lines, parse_command, ChatCommand, CommandOutcome, ParsedCommand};
pub use theme::Theme;
