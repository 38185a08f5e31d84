//! Input handling for the chat box

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_width::UnicodeWidthChar;

/// Result of handling a key event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// No action needed
    None,
    /// Submit the current input (already trimmed, never empty)
    Submit(String),
    /// Quit the application
    Quit,
    /// Scroll the thread up one page
    ScrollUp,
    /// Scroll the thread down one page
    ScrollDown,
    /// Open or close the shortcut menu
    ToggleMenu,
    /// Buffer content changed
    Edited,
    /// Escape pressed
    Escape,
}

/// Editable single-line buffer
///
/// Note: `cursor` is a CHARACTER index, not a byte index, so CJK input
/// edits correctly.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Current input buffer
    pub buffer: String,
    /// Cursor position in buffer (character index)
    pub cursor: usize,
    /// Previously submitted lines
    pub history: Vec<String>,
    /// Current history index (`None` means editing fresh input)
    history_index: Option<usize>,
    /// Fresh input saved while browsing history
    saved_input: String,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.history_index = None;
    }

    fn char_count(&self) -> usize {
        self.buffer.chars().count()
    }

    fn char_to_byte_index(&self, char_idx: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_idx)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.buffer.len())
    }

    fn insert_char(&mut self, c: char) {
        let byte_idx = self.char_to_byte_index(self.cursor);
        self.buffer.insert(byte_idx, c);
        self.cursor += 1;
    }

    fn remove_char_before_cursor(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let byte_idx = self.char_to_byte_index(self.cursor);
        self.buffer.remove(byte_idx);
        true
    }

    fn remove_char_at_cursor(&mut self) -> bool {
        if self.cursor >= self.char_count() {
            return false;
        }
        let byte_idx = self.char_to_byte_index(self.cursor);
        self.buffer.remove(byte_idx);
        true
    }

    /// Handle a key event and return the action
    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => InputAction::Quit,
            KeyCode::Char('o') if ctrl => InputAction::ToggleMenu,
            KeyCode::F(2) => InputAction::ToggleMenu,

            KeyCode::Enter => {
                let text = self.buffer.trim().to_string();
                if text.is_empty() {
                    return InputAction::None;
                }
                self.history.push(text.clone());
                self.clear();
                InputAction::Submit(text)
            }

            KeyCode::Backspace => {
                if self.remove_char_before_cursor() {
                    InputAction::Edited
                } else {
                    InputAction::None
                }
            }
            KeyCode::Delete => {
                if self.remove_char_at_cursor() {
                    InputAction::Edited
                } else {
                    InputAction::None
                }
            }
            KeyCode::Char('u') if ctrl => {
                self.buffer.clear();
                self.cursor = 0;
                InputAction::Edited
            }
            KeyCode::Char('w') if ctrl => {
                self.delete_word();
                InputAction::Edited
            }

            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                InputAction::None
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.char_count());
                InputAction::None
            }
            KeyCode::Home => {
                self.cursor = 0;
                InputAction::None
            }
            KeyCode::Char('a') if ctrl => {
                self.cursor = 0;
                InputAction::None
            }
            KeyCode::End => {
                self.cursor = self.char_count();
                InputAction::None
            }
            KeyCode::Char('e') if ctrl => {
                self.cursor = self.char_count();
                InputAction::None
            }

            KeyCode::Up => {
                self.history_prev();
                InputAction::Edited
            }
            KeyCode::Down => {
                self.history_next();
                InputAction::Edited
            }

            KeyCode::PageUp => InputAction::ScrollUp,
            KeyCode::PageDown => InputAction::ScrollDown,

            KeyCode::Esc => InputAction::Escape,

            KeyCode::Char(c) if !ctrl => {
                self.insert_char(c);
                InputAction::Edited
            }

            _ => InputAction::None,
        }
    }

    fn delete_word(&mut self) {
        while self.cursor > 0 && self.buffer.chars().nth(self.cursor - 1) == Some(' ') {
            self.remove_char_before_cursor();
        }
        while self.cursor > 0 && self.buffer.chars().nth(self.cursor - 1) != Some(' ') {
            self.remove_char_before_cursor();
        }
    }

    fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.history_index {
            None => {
                self.saved_input = self.buffer.clone();
                0
            }
            Some(i) if i + 1 < self.history.len() => i + 1,
            Some(i) => i,
        };
        self.history_index = Some(next);
        self.buffer = self.history[self.history.len() - 1 - next].clone();
        self.cursor = self.char_count();
    }

    fn history_next(&mut self) {
        match self.history_index {
            Some(0) => {
                self.history_index = None;
                self.buffer = std::mem::take(&mut self.saved_input);
            }
            Some(i) => {
                self.history_index = Some(i - 1);
                self.buffer = self.history[self.history.len() - i].clone();
            }
            None => return,
        }
        self.cursor = self.char_count();
    }

    /// Cursor position in terminal columns (CJK characters take two)
    pub fn cursor_display_width(&self) -> usize {
        self.buffer
            .chars()
            .take(self.cursor)
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }
}
