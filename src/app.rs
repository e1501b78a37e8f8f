use std::time::Duration;

use ratatui::layout::Rect;

use crate::exchange::ExchangeId;
use crate::widget::ChatWidget;

/// Frame rate of the "Thinking..." ellipsis.
pub const SPINNER_INTERVAL: Duration = Duration::from_millis(300);

pub struct App {
    pub should_quit: bool,
    pub widget: ChatWidget,
    pub endpoint: String,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Areas for mouse hit-testing (updated during render)
    pub conversation_area: Option<Rect>,
    pub send_button_area: Option<Rect>,
    pub retry_targets: Vec<(Rect, ExchangeId)>,
}

impl App {
    pub fn new(widget: ChatWidget, endpoint: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            widget,
            endpoint: endpoint.into(),
            animation_frame: 0,
            conversation_area: None,
            send_button_area: None,
            retry_targets: Vec::new(),
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.widget.awaiting_count() > 0 {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Retry button under the given cell, if any.
    pub fn retry_at(&self, x: u16, y: u16) -> Option<ExchangeId> {
        self.retry_targets
            .iter()
            .find(|(rect, _)| point_in_rect(x, y, *rect))
            .map(|(_, id)| *id)
    }

    pub fn on_send_button(&self, x: u16, y: u16) -> bool {
        self.send_button_area
            .is_some_and(|rect| point_in_rect(x, y, rect))
    }

    pub fn in_conversation(&self, x: u16, y: u16) -> bool {
        self.conversation_area
            .is_some_and(|rect| point_in_rect(x, y, rect))
    }
}

pub fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}
