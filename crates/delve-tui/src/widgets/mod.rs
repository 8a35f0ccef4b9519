//! Custom widgets for the TUI

pub mod history_panel;
pub mod input_box;
pub mod markdown;
pub mod message_list;
pub mod selector;
pub mod spinner;

pub use history_panel::{HistoryPanel, PanelItem, PanelMode};
pub use input_box::InputBox;
pub use message_list::{ChatMessage, MessageKind, MessageList};
pub use selector::{Selector, SelectorItem, SelectorState};
pub use spinner::Spinner;
