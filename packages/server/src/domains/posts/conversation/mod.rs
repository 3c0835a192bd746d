//! Multi-step post authoring over chat.

pub mod checkbox;
pub mod draft;
pub mod machine;
pub mod reply;
pub mod step;

pub use checkbox::{callback_data, parse_callback, CheckboxItem, CheckboxList, SELECTED_MARK};
pub use draft::{Draft, Session};
pub use machine::{
    parse_publish_date, Conversation, ConversationError, ConversationSettings, Interaction, CANCEL,
    CONTINUE, DATE_FORMAT, DEFAULT_TIMEOUT, START_COMMAND,
};
pub use reply::{Controls, Reply};
pub use step::{SelectionKind, Step};
