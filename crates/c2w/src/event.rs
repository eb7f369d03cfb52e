//! Event handling for the TUI.
//!
//! Converts raw terminal events (from crossterm) into `Action`s that
//! the `TuiApp` can process. This module is the bridge between the
//! physical keyboard and the application logic.
//!
//! # Key Bindings
//!
//! | Key          | Context     | Action                     |
//! |--------------|-------------|----------------------------|
//! | Tab          | Any         | Switch focus to next panel |
//! | Ctrl+C       | Any         | Quit immediately            |
//! | Esc / q      | Not input   | Leave the system gracefully |
//! | Up / k       | Room list   | Select previous movie       |
//! | Down / j     | Room list   | Select next movie           |
//! | Enter        | Room list   | Join the selected movie     |
//! | b            | Room list   | Back to the main room       |
//! | PageUp       | Chat        | Scroll up (older)           |
//! | PageDown     | Chat        | Scroll down (newer)         |
//! | Enter        | Input       | Send chat message           |
//! | Backspace    | Input       | Delete char before cursor   |
//! | Delete       | Input       | Delete char after cursor    |
//! | Left/Right   | Input       | Move cursor                 |
//! | Home/End     | Input       | Jump to start/end           |
//! | Any char     | Input       | Type that character         |

use crate::app::{Action, FocusedPanel, TuiApp};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};

/// Converts a crossterm `Event` into an optional `Action`.
///
/// Returns `None` if the event doesn't map to any action (e.g., mouse
/// events, resize events, or keys that aren't bound to anything).
pub fn handle_event(event: &Event, app: &TuiApp) -> Option<Action> {
    match event {
        Event::Key(key_event) => handle_key_event(key_event, app),
        // ratatui handles resize automatically in its render loop.
        _ => None,
    }
}

fn handle_key_event(key: &KeyEvent, app: &TuiApp) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }

    if key.code == KeyCode::Tab {
        return Some(Action::NextFocus);
    }

    match app.focused {
        FocusedPanel::RoomList => handle_room_list_key(key),
        FocusedPanel::Chat => handle_chat_key(key),
        FocusedPanel::Input => handle_input_key(key),
    }
}

fn handle_room_list_key(key: &KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(Action::PrevMovie),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::NextMovie),
        KeyCode::Enter => Some(Action::SelectMovie),
        KeyCode::Char('b') => Some(Action::QuitMovie),
        KeyCode::Esc | KeyCode::Char('q') => Some(Action::RequestQuitApp),
        _ => None,
    }
}

fn handle_chat_key(key: &KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::PageUp | KeyCode::Up | KeyCode::Char('k') => Some(Action::ScrollUp),
        KeyCode::PageDown | KeyCode::Down | KeyCode::Char('j') => Some(Action::ScrollDown),
        KeyCode::Esc | KeyCode::Char('q') => Some(Action::RequestQuitApp),
        _ => None,
    }
}

/// Key handling when the text input is focused.
///
/// In input mode, most keys produce text input rather than navigation.
/// Esc requests a graceful quit, same as the other panels.
fn handle_input_key(key: &KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Enter => Some(Action::SendChat),
        KeyCode::Backspace => Some(Action::InputBackspace),
        KeyCode::Delete => Some(Action::InputDelete),
        KeyCode::Left => Some(Action::InputLeft),
        KeyCode::Right => Some(Action::InputRight),
        KeyCode::Home => Some(Action::InputHome),
        KeyCode::End => Some(Action::InputEnd),
        KeyCode::Esc => Some(Action::RequestQuitApp),
        KeyCode::Char(c) => Some(Action::InputChar(c)),
        _ => None,
    }
}
