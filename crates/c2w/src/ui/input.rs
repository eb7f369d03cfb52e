//! Text input panel (bottom).
//!
//! ```text
//! +-- Type a message (Enter to send) --------------+
//! | > hey there|                                    |
//! +--------------------------------------------------+
//! ```
//!
//! The cursor is shown as a blinking block when the input is focused.

use crate::app::{FocusedPanel, TuiApp};
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let is_focused = app.focused == FocusedPanel::Input;

    let border_style = if is_focused { Style::default().fg(Color::Cyan) } else { Style::default().fg(Color::DarkGray) };

    let title = if is_focused { " Type a message (Enter to send) " } else { " Type a message... " };

    let block = Block::default().title(title).borders(Borders::ALL).border_style(border_style);

    let display_text = if app.input.is_empty() && !is_focused { String::new() } else { format!("> {}", app.input) };

    let input_widget = Paragraph::new(display_text).style(Style::default().fg(Color::White)).block(block);

    frame.render_widget(input_widget, area);

    if is_focused {
        let cursor_x = area.x + 1 + 2 + visual_cursor_offset(&app.input, app.input_cursor) as u16;
        let cursor_y = area.y + 1;
        frame.set_cursor_position((cursor_x, cursor_y));
    }
}

/// Calculates the visual column offset for the cursor. Each character
/// contributes one column regardless of its byte length — a
/// simplification that works well outside combining-character scripts.
fn visual_cursor_offset(input: &str, byte_cursor: usize) -> usize {
    input[..byte_cursor].chars().count()
}
