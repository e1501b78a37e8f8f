use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use tracing::debug;

use crate::app::App;
use crate::tui::AppEvent;

const WHEEL_ROWS: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => app.widget.handle_paste(&text),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('q') if ctrl => app.should_quit = true,
        KeyCode::Char('r') if ctrl => {
            if app.widget.retry_latest().is_none() {
                debug!("nothing to retry");
            }
        }
        KeyCode::PageUp => {
            let rows = page_rows(app);
            app.widget.view_mut().scroll_up(rows);
        }
        KeyCode::PageDown => {
            let rows = page_rows(app);
            app.widget.view_mut().scroll_down(rows);
        }
        _ => {
            app.widget.handle_key(key);
        }
    }
}

fn page_rows(app: &App) -> u16 {
    app.conversation_area
        .map_or(10, |r| r.height.saturating_sub(2).max(1))
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let (x, y) = (mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollDown if app.in_conversation(x, y) => {
            app.widget.view_mut().scroll_down(WHEEL_ROWS);
        }
        MouseEventKind::ScrollUp if app.in_conversation(x, y) => {
            app.widget.view_mut().scroll_up(WHEEL_ROWS);
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(exchange) = app.retry_at(x, y) {
                app.widget.retry(exchange);
            } else if app.on_send_button(x, y) {
                app.widget.submit_input();
            }
        }
        _ => {}
    }
}
