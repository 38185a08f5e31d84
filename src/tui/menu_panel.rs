//! Shortcut menu panel: the four topics as a 2×2 grid of cards

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Stylize,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use super::theme::Theme;
use crate::chat::MenuEntry;

const COLUMNS: usize = 2;
/// Narrower than this and the popup is not drawn
const MIN_WIDTH: u16 = 6;

/// Result of a key press while the panel is open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    None,
    Select(&'static str),
    Close,
}

#[derive(Debug, Clone)]
pub struct MenuPanel {
    pub visible: bool,
    entries: &'static [MenuEntry],
    selected: usize,
}

impl MenuPanel {
    pub fn new(entries: &'static [MenuEntry]) -> Self {
        Self {
            visible: false,
            entries,
            selected: 0,
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Open with the first card focused
    pub fn open(&mut self) {
        self.visible = true;
        self.selected = 0;
    }

    pub fn close(&mut self) {
        self.visible = false;
    }

    pub fn toggle(&mut self) {
        if self.visible {
            self.close();
        } else {
            self.open();
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> MenuAction {
        let len = self.entries.len();
        if len == 0 {
            return MenuAction::Close;
        }
        match key.code {
            KeyCode::Left => {
                if self.selected % COLUMNS > 0 {
                    self.selected -= 1;
                }
            }
            KeyCode::Right => {
                if self.selected % COLUMNS + 1 < COLUMNS && self.selected + 1 < len {
                    self.selected += 1;
                }
            }
            KeyCode::Up => {
                if self.selected >= COLUMNS {
                    self.selected -= COLUMNS;
                }
            }
            KeyCode::Down => {
                if self.selected + COLUMNS < len {
                    self.selected += COLUMNS;
                }
            }
            KeyCode::Tab => self.selected = (self.selected + 1) % len,
            KeyCode::Enter | KeyCode::Char(' ') => {
                let key = self.entries[self.selected].key;
                self.close();
                return MenuAction::Select(key);
            }
            KeyCode::Esc => {
                self.close();
                return MenuAction::Close;
            }
            _ => {}
        }
        MenuAction::None
    }

    /// Render the grid just above `anchor` (the input box)
    pub fn render(&self, anchor: Rect, buf: &mut Buffer) {
        if !self.visible || self.entries.is_empty() {
            return;
        }

        let card_width = self
            .entries
            .iter()
            .map(|e| e.key.width())
            .max()
            .unwrap_or(0)
            + 4;
        let rows = self.entries.len().div_ceil(COLUMNS);
        let width = ((card_width * COLUMNS + 3) as u16).min(anchor.width.saturating_sub(1));
        let height = (rows as u16 + 2).min(anchor.y);
        let area = Rect::new(anchor.x + 1, anchor.y - height, width, height).intersection(buf.area);
        if area.width < MIN_WIDTH || area.height < 3 {
            return;
        }

        Clear.render(area, buf);

        let lines: Vec<Line> = self
            .entries
            .chunks(COLUMNS)
            .enumerate()
            .map(|(row, chunk)| {
                let mut spans = Vec::new();
                for (col, entry) in chunk.iter().enumerate() {
                    let index = row * COLUMNS + col;
                    let label = format!(" {} ", entry.key);
                    let pad = card_width.saturating_sub(label.width());
                    let style = if index == self.selected {
                        Theme::accent().bold().reversed()
                    } else {
                        Theme::text()
                    };
                    spans.push(Span::styled(label, style));
                    spans.push(Span::raw(" ".repeat(pad)));
                }
                Line::from(spans)
            })
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::accent())
            .title_top(Line::styled(" 選單 ", Theme::title()))
            .title_bottom(Line::styled(" ←↑↓→ Enter Esc ", Theme::muted()));

        Paragraph::new(lines).block(block).render(area, buf);
    }
}
