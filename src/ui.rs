use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::format::Inline;
use crate::message::Sender;
use crate::view::{EntryKind, Wrapper, RETRY_BUTTON, RETRY_PROMPT};

const SEND_BUTTON: &str = " [ Send ] ";

fn inline_style(strong: bool, emphasis: bool) -> Style {
    let mut style = Style::default();
    if strong {
        style = style.add_modifier(Modifier::BOLD);
    }
    if emphasis {
        style = style.add_modifier(Modifier::ITALIC);
    }
    style
}

/// Hard-wrap one display line at `width` terminal columns.
///
/// Row counts match [`crate::view::wrapped_height`], which the view uses for
/// scrolling.
fn wrap_line(line: &[Inline], width: u16, base: Style) -> Vec<Line<'static>> {
    let mut wrapper = Wrapper::new(width);
    let mut rows: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();

    for inline in line {
        let Inline::Text { text, strong, emphasis } = inline else {
            continue;
        };
        let style = base.patch(inline_style(*strong, *emphasis));
        let mut chunk = String::new();

        for c in text.chars() {
            if wrapper.place(c) {
                if !chunk.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut chunk), style));
                }
                rows.push(Line::from(std::mem::take(&mut current)));
            }
            chunk.push(c);
        }
        if !chunk.is_empty() {
            current.push(Span::styled(chunk, style));
        }
    }

    rows.push(Line::from(current));
    rows
}

fn sender_line(sender: Sender) -> Line<'static> {
    let color = match sender {
        Sender::User => Color::Cyan,
        Sender::Bot => Color::Yellow,
    };
    Line::from(Span::styled(
        format!("{}:", sender.label()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // The input box grows with its content; the layout caps it at what fits
    let input_width = area.width.saturating_sub(2);
    let input_height = app.widget.input().height(input_width).saturating_add(2);

    let [header_area, conversation_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_conversation(app, frame, conversation_area);
    render_input(app, frame, input_area);
    render_footer(frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let waiting = app.widget.awaiting_count();
    let status = if waiting > 0 {
        format!(" waiting ({waiting}) ")
    } else {
        " ready ".to_string()
    };

    let title = Line::from(vec![
        Span::styled(" wattchat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("{} ", app.endpoint), Style::default().fg(Color::Gray)),
        Span::styled(status, Style::default().fg(Color::Black).bg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_conversation(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");
    let inner = block.inner(area);

    app.conversation_area = Some(area);
    app.retry_targets.clear();

    let view = app.widget.view_mut();
    view.set_viewport(inner.width, inner.height);
    let scroll = view.scroll();

    if view.is_empty() {
        let empty = Paragraph::new(Text::from(Span::styled(
            "Send a message to start chatting...",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let dots = ".".repeat(usize::from(app.animation_frame) + 1);
    let mut lines: Vec<Line> = Vec::new();
    let mut retry_rows = Vec::new();

    for entry in app.widget.view().entries() {
        lines.push(sender_line(entry.sender()));

        match &entry.kind {
            EntryKind::Message { .. } => {
                for line in entry.display_lines() {
                    lines.extend(wrap_line(&line, inner.width, Style::default()));
                }
            }
            EntryKind::Placeholder { label } => {
                // Animated ellipsis never makes the label longer than stored
                let animated = format!("{}{}", label.trim_end_matches('.'), dots);
                let style = Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC);
                lines.extend(wrap_line(&[Inline::plain(animated)], inner.width, style));
            }
            EntryKind::RetryOffer { exchange } => {
                lines.extend(wrap_line(
                    &[Inline::plain(RETRY_PROMPT)],
                    inner.width,
                    Style::default(),
                ));
                retry_rows.push((lines.len(), *exchange));
                let button = Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD);
                lines.extend(wrap_line(&[Inline::plain(RETRY_BUTTON)], inner.width, button));
            }
        }

        lines.push(Line::default());
    }

    for (row, exchange) in retry_rows {
        let row = u16::try_from(row).unwrap_or(u16::MAX);
        if row >= scroll && row - scroll < inner.height {
            let width = u16::try_from(RETRY_BUTTON.width())
                .unwrap_or(u16::MAX)
                .min(inner.width);
            app.retry_targets
                .push((Rect::new(inner.x, inner.y + (row - scroll), width, 1), exchange));
        }
    }

    let total_lines = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let paragraph = Paragraph::new(lines).block(block).scroll((scroll, 0));
    frame.render_widget(paragraph, area);

    if total_lines > inner.height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state = ScrollbarState::new(usize::from(total_lines))
            .position(usize::from(scroll));

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Message ")
        .title_top(
            Line::from(Span::styled(
                SEND_BUTTON,
                Style::default().fg(Color::Black).bg(Color::Cyan).bold(),
            ))
            .right_aligned(),
        );
    let inner = block.inner(area);

    let button_width = u16::try_from(SEND_BUTTON.width()).unwrap_or(0);
    app.send_button_area = (area.width > button_width + 2).then(|| {
        Rect::new(area.x + area.width - 1 - button_width, area.y, button_width, 1)
    });

    let input = app.widget.input();
    let mut lines: Vec<Line> = Vec::new();
    for line in input.text().split('\n') {
        lines.extend(wrap_line(
            &[Inline::plain(line)],
            inner.width,
            Style::default().fg(Color::Cyan),
        ));
    }

    // Keep the cursor row visible when the box is capped by the terminal
    let (cursor_x, cursor_y) = input.cursor_position(inner.width);
    let input_scroll = cursor_y.saturating_sub(inner.height.saturating_sub(1));

    let paragraph = Paragraph::new(lines).block(block).scroll((input_scroll, 0));
    frame.render_widget(paragraph, area);

    frame.set_cursor_position((inner.x + cursor_x, inner.y + cursor_y - input_scroll));
}

fn render_footer(frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" Shift+Enter ", key_style),
        Span::styled(" newline ", label_style),
        Span::styled(" Ctrl+R ", key_style),
        Span::styled(" retry ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Ctrl+C ", key_style),
        Span::styled(" quit ", label_style),
    ];

    let footer = Paragraph::new(Line::from(hints)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
