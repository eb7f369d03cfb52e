//! Chat transcript panel (right side).
//!
//! Shows every chat message received so far, oldest at top.
//!
//! ```text
//! +-- Chat ----------------------------------------+
//! | alice: hey everyone                            |
//! | bob: anyone up for the Matrix?                 |
//! +--------------------------------------------------+
//! ```

use crate::app::{FocusedPanel, TuiApp};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

pub fn render(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let is_focused = app.focused == FocusedPanel::Chat;

    let border_style = if is_focused { Style::default().fg(Color::Cyan) } else { Style::default().fg(Color::DarkGray) };

    let block = Block::default().title(" Chat ").borders(Borders::ALL).border_style(border_style);

    if app.chat_log.is_empty() {
        let empty_msg = Paragraph::new("No messages yet.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty_msg, area);
        return;
    }

    let lines: Vec<Line> = app
        .chat_log
        .iter()
        .map(|(sender, text)| {
            let name_color = if *sender == app.our_name { Color::Cyan } else { Color::Yellow };
            Line::from(vec![
                Span::styled(format!("{sender}: "), Style::default().fg(name_color).add_modifier(Modifier::BOLD)),
                Span::styled(text.clone(), Style::default().fg(Color::White)),
            ])
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false }).scroll((app.chat_scroll, 0));

    frame.render_widget(paragraph, area);
}
