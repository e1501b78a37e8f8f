//! Input buffer and submit triggers.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_width::UnicodeWidthChar;

use crate::view::{wrapped_height, Wrapper};

/// What a key press meant to the input box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// A submit trigger fired (Enter without modifier, or the send action).
    Submit,
    /// The buffer or cursor changed.
    Edited,
    /// The key is not handled by the input box.
    Ignored,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[derive(Debug, Default, Clone)]
pub struct InputController {
    buffer: String,
    cursor: usize, // in chars
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        let newline_modifier = key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT);

        match key.code {
            KeyCode::Enter if newline_modifier => {
                self.insert_char('\n');
                InputAction::Edited
            }
            KeyCode::Enter => InputAction::Submit,
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                InputAction::Submit
            }
            KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => {
                InputAction::Ignored
            }
            KeyCode::Char(c) => {
                self.insert_char(c);
                InputAction::Edited
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let byte_pos = char_to_byte_index(&self.buffer, self.cursor);
                    self.buffer.remove(byte_pos);
                }
                InputAction::Edited
            }
            KeyCode::Delete => {
                if self.cursor < self.buffer.chars().count() {
                    let byte_pos = char_to_byte_index(&self.buffer, self.cursor);
                    self.buffer.remove(byte_pos);
                }
                InputAction::Edited
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                InputAction::Edited
            }
            KeyCode::Right => {
                let char_count = self.buffer.chars().count();
                self.cursor = (self.cursor + 1).min(char_count);
                InputAction::Edited
            }
            KeyCode::Home => {
                self.cursor = 0;
                InputAction::Edited
            }
            KeyCode::End => {
                self.cursor = self.buffer.chars().count();
                InputAction::Edited
            }
            _ => InputAction::Ignored,
        }
    }

    /// Insert pasted text verbatim; pasting never submits.
    pub fn handle_paste(&mut self, text: &str) {
        let byte_pos = char_to_byte_index(&self.buffer, self.cursor);
        self.buffer.insert_str(byte_pos, text);
        self.cursor += text.chars().count();
    }

    fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.buffer, self.cursor);
        self.buffer.insert(byte_pos, c);
        self.cursor += 1;
    }

    /// Take the trimmed buffer for sending.
    ///
    /// Returns `None` and leaves the buffer alone when it is blank. Otherwise
    /// the buffer is cleared, which also shrinks the box back to one line.
    pub fn take_submission(&mut self) -> Option<String> {
        let trimmed = self.buffer.trim();
        if trimmed.is_empty() {
            return None;
        }
        let text = trimmed.to_string();
        self.buffer.clear();
        self.cursor = 0;
        Some(text)
    }

    pub fn line_count(&self) -> usize {
        self.buffer.split('\n').count()
    }

    /// Rows needed to show the whole buffer at `width`; at least one.
    pub fn height(&self, width: u16) -> u16 {
        self.buffer
            .split('\n')
            .map(|line| wrapped_height(line, width))
            .fold(0u16, u16::saturating_add)
    }

    /// Cursor (column, row) inside the box when hard-wrapped at `width`.
    ///
    /// The cursor sits on the cell where the character under it is drawn. At
    /// the end of a line that fills the row it stays on the last cell, since
    /// [`height`](Self::height) does not reserve a row past it.
    pub fn cursor_position(&self, width: u16) -> (u16, u16) {
        let mut row = 0usize;
        let mut wrapper = Wrapper::new(width);
        let mut chars = self.buffer.chars();

        for c in chars.by_ref().take(self.cursor) {
            if c == '\n' {
                row += wrapper.row() + 1;
                wrapper = Wrapper::new(width);
            } else {
                wrapper.place(c);
            }
        }

        let mut col = wrapper.col();
        if let Some(next) = chars.next().filter(|&c| c != '\n') {
            wrapper.place(next);
            // Step back over the character just placed
            col = wrapper.col().saturating_sub(next.width().unwrap_or(0));
        }

        let col = col.min(wrapper.width() - 1);
        (to_u16(col), to_u16(row + wrapper.row()))
    }
}

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}
