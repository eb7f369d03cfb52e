//! Room list panel (left side): the current room's roster, followed by
//! the movie catalog.
//!
//! ```text
//! +-- Room: Main room ----+
//! | * alice               |  <- in the same room as us
//! |   bob (movie)         |  <- in some movie room (which one is lossy,
//! |                       |     see the status-bit note on ClientRole)
//! | -- Movies ------------|
//! | > Matrix              |  <- selected, Enter to join
//! |   Up                  |
//! +------------------------+
//! ```

use crate::app::{FocusedPanel, TuiApp};
use c2w_core::room::RoomId;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};
use ratatui::Frame;

pub fn render(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let is_focused = app.focused == FocusedPanel::RoomList;

    let border_style = if is_focused { Style::default().fg(Color::Cyan) } else { Style::default().fg(Color::DarkGray) };

    let block = Block::default()
        .title(format!(" Room: {} ", app.current_room))
        .borders(Borders::ALL)
        .border_style(border_style);

    let mut items: Vec<ListItem> = app
        .roster
        .iter()
        .map(|entry| {
            let is_us = entry.name == app.our_name;
            let marker = if is_us { "*" } else { " " };
            let suffix = match &entry.room {
                RoomId::Main => String::new(),
                RoomId::Movie(title) => format!(" ({title})"),
                RoomId::OutOfSystem => " (left)".to_string(),
            };
            let line = Line::from(vec![
                Span::styled(format!(" {marker} "), Style::default().fg(Color::Green)),
                Span::raw(entry.name.clone()),
                Span::styled(suffix, Style::default().fg(Color::DarkGray)),
            ]);
            ListItem::new(line)
        })
        .collect();

    items.push(ListItem::new(Line::from(Span::styled(
        " -- Movies -- ",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    ))));

    let roster_len = app.roster.len() + 1;
    items.extend(app.movies.iter().map(|movie| ListItem::new(Line::from(movie.title.clone()))));

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol(">> ");

    let mut list_state = ListState::default();
    list_state.select(app.selected_movie_idx.map(|idx| idx + roster_len));

    frame.render_stateful_widget(list, area, &mut list_state);
}
