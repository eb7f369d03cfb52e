//! TUI application state management.
//!
//! `TuiApp` holds all the state needed to render the terminal UI and
//! process user input. It follows the **Elm Architecture** pattern
//! (also known as TEA or Model-View-Update):
//!
//! 1. **Model**: `TuiApp` struct holds the state
//! 2. **Update**: `handle_action()` modifies state based on events
//! 3. **View**: the `ui/` modules render the state to the terminal
//!
//! This separation makes the app easy to test and reason about.

use crate::presentation::ServerEvent;
use c2w_core::presentation::{MovieEntry, RosterEntry};
use c2w_core::room::RoomId;
use ratatui::layout::Rect;

/// Which panel currently has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPanel {
    /// The room/user/movie list (left panel). Arrow keys navigate movies.
    RoomList,
    /// The chat transcript (right panel). PageUp/PageDown scrolls.
    Chat,
    /// The text input (bottom). Typing composes a message.
    Input,
}

/// Actions that modify the application state.
///
/// These are produced by the event handler and consumed by the app.
/// This indirection keeps input handling separate from state mutation.
#[derive(Debug)]
pub enum Action {
    /// User wants to exit the TUI immediately (no protocol quit).
    Quit,
    /// User wants to leave the system gracefully (sends quit-app).
    RequestQuitApp,
    /// Switch focus to the next panel (Tab).
    NextFocus,
    /// Select the next movie in the catalog (Down / j).
    NextMovie,
    /// Select the previous movie in the catalog (Up / k).
    PrevMovie,
    /// Join the selected movie's room (Enter, in the room list).
    SelectMovie,
    /// Leave the current movie room, back to the main room ('b').
    QuitMovie,
    /// Scroll chat up (older).
    ScrollUp,
    /// Scroll chat down (newer).
    ScrollDown,
    /// Append a character to the input buffer.
    InputChar(char),
    /// Delete the character before the cursor.
    InputBackspace,
    /// Delete the character after the cursor.
    InputDelete,
    /// Move cursor left.
    InputLeft,
    /// Move cursor right.
    InputRight,
    /// Move cursor to start of input.
    InputHome,
    /// Move cursor to end of input.
    InputEnd,
    /// Send the current input as a chat message.
    SendChat,
    /// A presentation event arrived from the client role.
    Server(ServerEvent),
}

/// Mouse hit-testing rectangles, recomputed every render.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanelRects {
    pub room_list: Rect,
    pub chat: Rect,
    pub input: Rect,
}

/// The main TUI application state.
pub struct TuiApp {
    /// The server's current view of who's in the system and where.
    pub roster: Vec<RosterEntry>,
    /// The movie catalog, as last advertised by the server.
    pub movies: Vec<MovieEntry>,
    /// Index of the currently selected movie in `movies`.
    pub selected_movie_idx: Option<usize>,
    /// Chat transcript, oldest first: (sender, text).
    pub chat_log: Vec<(String, String)>,
    /// The text input buffer (what the user is currently typing).
    pub input: String,
    /// Cursor position within the input string (byte offset).
    pub input_cursor: usize,
    /// Which panel currently has focus.
    pub focused: FocusedPanel,
    /// Scroll offset for the chat panel (0 = bottom / newest).
    pub chat_scroll: u16,
    /// Our login name.
    pub our_name: String,
    /// The room we believe we're in, mirroring the client role's view.
    pub current_room: RoomId,
    /// Status message shown in the bottom bar.
    pub status: String,
    /// Whether the render loop should exit.
    pub should_quit: bool,
    /// Saved panel rectangles, for mouse hit-testing.
    pub panel_rects: PanelRects,
    /// The room a pending movie-select/quit-movie is headed for; applied
    /// to `current_room` when the corresponding `JoinRoomOk` arrives.
    pub pending_room: Option<RoomId>,
}

impl TuiApp {
    pub fn new(our_name: String) -> Self {
        Self {
            roster: Vec::new(),
            movies: Vec::new(),
            selected_movie_idx: None,
            chat_log: Vec::new(),
            input: String::new(),
            input_cursor: 0,
            focused: FocusedPanel::RoomList,
            chat_scroll: 0,
            our_name,
            current_room: RoomId::OutOfSystem,
            status: "Connecting...".to_string(),
            should_quit: false,
            panel_rects: PanelRects::default(),
            pending_room: None,
        }
    }

    pub fn selected_movie(&self) -> Option<&MovieEntry> {
        self.selected_movie_idx.and_then(|idx| self.movies.get(idx))
    }

    /// Processes an action and updates the state accordingly.
    ///
    /// `SendChat`, `SelectMovie`, and `QuitMovie` are not handled here:
    /// they need the messenger, which this struct doesn't hold. The main
    /// loop intercepts them before calling this method.
    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit | Action::RequestQuitApp => {
                self.should_quit = true;
            }

            Action::NextFocus => {
                self.focused = match self.focused {
                    FocusedPanel::RoomList => FocusedPanel::Chat,
                    FocusedPanel::Chat => FocusedPanel::Input,
                    FocusedPanel::Input => FocusedPanel::RoomList,
                };
            }

            Action::NextMovie => {
                if self.movies.is_empty() {
                    return;
                }
                self.selected_movie_idx = Some(match self.selected_movie_idx {
                    Some(idx) => (idx + 1).min(self.movies.len() - 1),
                    None => 0,
                });
            }

            Action::PrevMovie => {
                if self.movies.is_empty() {
                    return;
                }
                self.selected_movie_idx = Some(match self.selected_movie_idx {
                    Some(idx) => idx.saturating_sub(1),
                    None => 0,
                });
            }

            Action::SelectMovie | Action::QuitMovie => {
                // Handled externally; nothing to mutate locally yet.
            }

            Action::ScrollUp => {
                self.chat_scroll = self.chat_scroll.saturating_add(3);
            }

            Action::ScrollDown => {
                self.chat_scroll = self.chat_scroll.saturating_sub(3);
            }

            Action::InputChar(ch) => {
                self.input.insert(self.input_cursor, ch);
                self.input_cursor += ch.len_utf8();
            }

            Action::InputBackspace => {
                if self.input_cursor > 0 {
                    let prev = self.input[..self.input_cursor]
                        .char_indices()
                        .next_back()
                        .map(|(idx, _)| idx)
                        .unwrap_or(0);
                    self.input.drain(prev..self.input_cursor);
                    self.input_cursor = prev;
                }
            }

            Action::InputDelete => {
                if self.input_cursor < self.input.len() {
                    let next_char_len = self.input[self.input_cursor..]
                        .chars()
                        .next()
                        .map(|c| c.len_utf8())
                        .unwrap_or(0);
                    self.input.drain(self.input_cursor..self.input_cursor + next_char_len);
                }
            }

            Action::InputLeft => {
                if self.input_cursor > 0 {
                    self.input_cursor = self.input[..self.input_cursor]
                        .char_indices()
                        .next_back()
                        .map(|(idx, _)| idx)
                        .unwrap_or(0);
                }
            }

            Action::InputRight => {
                if self.input_cursor < self.input.len() {
                    let next_char_len = self.input[self.input_cursor..]
                        .chars()
                        .next()
                        .map(|c| c.len_utf8())
                        .unwrap_or(0);
                    self.input_cursor += next_char_len;
                }
            }

            Action::InputHome => {
                self.input_cursor = 0;
            }

            Action::InputEnd => {
                self.input_cursor = self.input.len();
            }

            Action::SendChat => {
                // Handled externally (needs the client role) — input is
                // cleared by the caller via `take_input` before sending.
            }

            Action::Server(event) => self.handle_server_event(event),
        }
    }

    fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::InitComplete { roster, movies } => {
                self.roster = roster;
                self.movies = movies;
                if self.selected_movie_idx.is_none() && !self.movies.is_empty() {
                    self.selected_movie_idx = Some(0);
                }
                self.current_room = RoomId::Main;
                self.status = "Connected".to_string();
            }

            ServerEvent::JoinRoomOk => {
                if let Some(room) = self.pending_room.take() {
                    self.current_room = room;
                }
                self.status = format!("now in {}", self.current_room);
            }

            ServerEvent::ChatReceived { sender, text } => {
                self.chat_log.push((sender, text));
                self.chat_scroll = 0;
            }

            ServerEvent::ConnectionRejected { reason } => {
                self.status = format!("rejected: {reason}");
            }

            ServerEvent::UserListUpdated { roster } => {
                self.roster = roster;
            }

            ServerEvent::LeaveSystemOk => {
                self.status = "left the system".to_string();
            }

            ServerEvent::Quit { reason } => {
                self.status = format!("disconnected: {reason}");
                self.should_quit = true;
            }
        }
    }

    /// Takes the current input content and clears the input buffer.
    pub fn take_input(&mut self) -> String {
        let content = self.input.clone();
        self.input.clear();
        self.input_cursor = 0;
        content
    }
}
