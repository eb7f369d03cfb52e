//! UI rendering modules for the c2w TUI.
//!
//! Each module corresponds to a visual component:
//! - `layout`: the overall screen layout (three panels)
//! - `room_list`: left panel showing the room roster and movie catalog
//! - `chat`: right panel showing the chat transcript
//! - `input`: bottom panel for text entry

pub mod chat;
pub mod input;
pub mod layout;
pub mod room_list;
