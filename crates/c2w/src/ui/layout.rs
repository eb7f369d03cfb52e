//! Main screen layout.
//!
//! Divides the terminal into three areas:
//!
//! ```text
//! +-- Room --------+-- Chat ---------------------------+
//! | Main room      | alice: hey                         |
//! | * alice        | bob: anyone up for the Matrix?     |
//! |   bob (movie)  |                                    |
//! | -- Movies --   |                                    |
//! | > Matrix       |                                    |
//! |   Up           |                                    |
//! +----------------+------------------------------------+
//! | > type a message...                                 |
//! +------------------------------------------------------+
//! | c2w | Main room | Connected                         |
//! +------------------------------------------------------+
//! ```
//!
//! Uses ratatui's `Layout` with `Constraint`s to define proportional
//! and fixed-size regions.

use crate::app::TuiApp;
use crate::ui::{chat, input, room_list};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

/// Renders the complete TUI to the given frame.
pub fn render(frame: &mut Frame, app: &mut TuiApp) {
    let size = frame.area();

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Content (room list + chat)
            Constraint::Length(3), // Input box
            Constraint::Length(1), // Status bar
        ])
        .split(size);

    let content_area = vertical[0];
    let input_area = vertical[1];
    let status_area = vertical[2];

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30), // Room list
            Constraint::Percentage(70), // Chat
        ])
        .split(content_area);

    let room_list_area = horizontal[0];
    let chat_area = horizontal[1];

    app.panel_rects.room_list = room_list_area;
    app.panel_rects.chat = chat_area;
    app.panel_rects.input = input_area;

    room_list::render(frame, app, room_list_area);
    chat::render(frame, app, chat_area);
    input::render(frame, app, input_area);
    render_status_bar(frame, app, status_area);
}

fn render_status_bar(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let status_text = Line::from(vec![
        Span::styled(" c2w ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw("| "),
        Span::styled(format!("{}", app.current_room), Style::default().fg(Color::Green)),
        Span::raw(" | "),
        Span::styled(&app.status, Style::default().fg(Color::DarkGray)),
        Span::raw(" | "),
        Span::styled(&app.our_name, Style::default().fg(Color::Yellow)),
    ]);

    let status_bar =
        Paragraph::new(status_text).style(Style::default().bg(Color::DarkGray).fg(Color::White));

    frame.render_widget(status_bar, area);
}
