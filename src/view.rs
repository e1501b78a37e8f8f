//! Conversation thread state.
//!
//! The view owns every rendered entry. Entries are only ever appended at the
//! end; removal is by handle and never reorders what remains. Every mutation
//! scrolls so the newest entry is fully visible.

use unicode_width::UnicodeWidthChar;

use crate::exchange::ExchangeId;
use crate::format::{self, FormattedText, Inline};
use crate::message::{Message, Sender};

pub const RETRY_PROMPT: &str = "Would you like to try again?";
pub const RETRY_BUTTON: &str = "[ Retry ]";

/// Handle to a rendered entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Message {
        message: Message,
        formatted: FormattedText,
    },
    /// Transient "in-progress" bot entry
    Placeholder { label: String },
    /// Bot entry carrying the retry action for a failed exchange
    RetryOffer { exchange: ExchangeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    pub kind: EntryKind,
}

impl Entry {
    pub fn sender(&self) -> Sender {
        match &self.kind {
            EntryKind::Message { message, .. } => message.sender,
            EntryKind::Placeholder { .. } | EntryKind::RetryOffer { .. } => Sender::Bot,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, EntryKind::Placeholder { .. })
    }

    /// Message text, if this entry renders a message.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Message { message, .. } => Some(&message.text),
            _ => None,
        }
    }

    /// Body lines as displayed, before wrapping. Paragraphs are separated by
    /// an empty line.
    pub fn display_lines(&self) -> Vec<Vec<Inline>> {
        match &self.kind {
            EntryKind::Message { formatted, .. } => {
                let mut lines = Vec::new();
                for (i, paragraph) in formatted.paragraphs.iter().enumerate() {
                    if i > 0 {
                        lines.push(Vec::new());
                    }
                    let mut current = Vec::new();
                    for inline in &paragraph.inlines {
                        match inline {
                            Inline::LineBreak => lines.push(std::mem::take(&mut current)),
                            text => current.push(text.clone()),
                        }
                    }
                    lines.push(current);
                }
                lines
            }
            EntryKind::Placeholder { label } => vec![vec![Inline::plain(label.clone())]],
            EntryKind::RetryOffer { .. } => vec![
                vec![Inline::plain(RETRY_PROMPT)],
                vec![Inline::plain(RETRY_BUTTON)],
            ],
        }
    }

    /// Rows this entry occupies at the given width: sender line, wrapped
    /// body, trailing blank line.
    pub fn height(&self, width: u16) -> u16 {
        let body: u16 = self
            .display_lines()
            .iter()
            .map(|line| line_height(line, width))
            .sum();
        body.saturating_add(2)
    }
}

fn line_height(line: &[Inline], width: u16) -> u16 {
    let mut wrapper = Wrapper::new(width);
    for inline in line {
        if let Inline::Text { text, .. } = inline {
            for c in text.chars() {
                wrapper.place(c);
            }
        }
    }
    wrapper.height()
}

/// Column tracker for hard-wrapping text at a fixed terminal width.
///
/// Widths come from `unicode-width`, so a CJK glyph or emoji takes two
/// columns. A character that does not fit in what is left of the row starts
/// the next one. Rendering, scroll arithmetic and the input cursor all wrap
/// through this type, which keeps them in agreement.
#[derive(Debug, Clone, Copy)]
pub struct Wrapper {
    width: usize,
    col: usize,
    rows: usize,
}

impl Wrapper {
    pub fn new(width: u16) -> Self {
        Self {
            width: usize::from(width.max(1)),
            col: 0,
            rows: 1,
        }
    }

    /// Place `c` on the current row. Returns true if it went to a new row.
    pub fn place(&mut self, c: char) -> bool {
        let w = c.width().unwrap_or(0);
        let wrapped = self.col > 0 && self.col + w > self.width;
        if wrapped {
            self.rows += 1;
            self.col = 0;
        }
        self.col += w;
        wrapped
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Columns used on the current row.
    pub fn col(&self) -> usize {
        self.col
    }

    /// Zero-based index of the current row.
    pub fn row(&self) -> usize {
        self.rows - 1
    }

    pub fn height(&self) -> u16 {
        u16::try_from(self.rows).unwrap_or(u16::MAX)
    }
}

/// Rows `text` (one line, no newlines) takes when hard-wrapped at `width`.
pub fn wrapped_height(text: &str, width: u16) -> u16 {
    let mut wrapper = Wrapper::new(width);
    for c in text.chars() {
        wrapper.place(c);
    }
    wrapper.height()
}

#[derive(Debug)]
pub struct ConversationView {
    entries: Vec<Entry>,
    next_id: u64,
    scroll: u16,
    viewport_width: u16,
    viewport_height: u16,
    // Cleared when the user scrolls away from the newest entry
    pinned: bool,
}

impl Default for ConversationView {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationView {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            scroll: 0,
            viewport_width: 0,
            viewport_height: 0,
            pinned: true,
        }
    }

    fn push(&mut self, kind: EntryKind) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, kind });
        self.scroll_to_bottom();
        id
    }

    /// Append a message; its text is formatted here, once.
    pub fn append(&mut self, message: Message) -> EntryId {
        let formatted = format::format(&message.text);
        self.push(EntryKind::Message { message, formatted })
    }

    pub fn append_placeholder(&mut self, label: &str) -> EntryId {
        self.push(EntryKind::Placeholder {
            label: label.to_string(),
        })
    }

    pub fn append_retry_offer(&mut self, exchange: ExchangeId) -> EntryId {
        self.push(EntryKind::RetryOffer { exchange })
    }

    /// Remove the entry behind `id`. Returns false if it was already gone.
    pub fn remove(&mut self, id: EntryId) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.id == id) else {
            return false;
        };
        self.entries.remove(pos);
        self.scroll_to_bottom();
        true
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn placeholder_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_placeholder()).count()
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    /// Record the inner size of the conversation pane (called during render).
    pub fn set_viewport(&mut self, width: u16, height: u16) {
        if (width, height) == (self.viewport_width, self.viewport_height) {
            return;
        }
        self.viewport_width = width;
        self.viewport_height = height;
        if self.pinned {
            self.scroll_to_bottom();
        }
    }

    /// Total rows of all entries at the current viewport width.
    pub fn total_height(&self) -> u16 {
        let width = if self.viewport_width > 0 {
            self.viewport_width
        } else {
            50
        };
        self.entries
            .iter()
            .fold(0u16, |acc, e| acc.saturating_add(e.height(width)))
    }

    fn max_scroll(&self) -> u16 {
        let visible_height = if self.viewport_height > 0 {
            self.viewport_height
        } else {
            20
        };
        self.total_height().saturating_sub(visible_height)
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
        self.pinned = true;
    }

    pub fn scroll_up(&mut self, rows: u16) {
        self.scroll = self.scroll.saturating_sub(rows);
        self.pinned = self.scroll >= self.max_scroll();
    }

    pub fn scroll_down(&mut self, rows: u16) {
        let max = self.max_scroll();
        self.scroll = self.scroll.saturating_add(rows).min(max);
        self.pinned = self.scroll >= max;
    }
}
