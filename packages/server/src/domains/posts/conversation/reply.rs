//! What the conversation wants shown to the user.
//!
//! Replies are transport-neutral; the bot front-end turns them into chat
//! messages and keyboards.

use super::checkbox::CheckboxList;
use super::step::SelectionKind;

/// Reply keyboard attached to a text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controls {
    /// Remove any reply keyboard.
    None,
    /// A single cancel button.
    Cancel,
    /// Continue and cancel buttons.
    ContinueOrCancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text { text: String, controls: Controls },
    /// A new message carrying the checkbox list.
    Checkboxes {
        text: String,
        kind: SelectionKind,
        list: CheckboxList,
    },
    /// Redraw the checkbox message the user just clicked.
    RefreshCheckboxes {
        text: String,
        kind: SelectionKind,
        list: CheckboxList,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>, controls: Controls) -> Self {
        Reply::Text {
            text: text.into(),
            controls,
        }
    }

    /// Text of the reply, whatever its shape.
    pub fn body(&self) -> &str {
        match self {
            Reply::Text { text, .. }
            | Reply::Checkboxes { text, .. }
            | Reply::RefreshCheckboxes { text, .. } => text,
        }
    }
}

pub(super) const ASK_TITLE: &str = "Enter the post title.";
pub(super) const ASK_CONTENT: &str = "Enter the post content.";
pub(super) const ASK_TAGS: &str =
    "Enter tags separated by commas and/or pick them below, then press Continue.";
pub(super) const ASK_SOURCES: &str =
    "Enter sources separated by commas and/or pick them below, then press Continue.";
pub(super) const PICK_TAGS: &str = "Available tags:";
pub(super) const PICK_SOURCES: &str = "Available sources:";
pub(super) const NO_TAGS: &str = "No tags yet. Type new ones separated by commas.";
pub(super) const NO_SOURCES: &str = "No sources yet. Type new ones separated by commas.";
pub(super) const EMPTY_TITLE: &str = "The title cannot be empty. Enter the post title.";
pub(super) const EMPTY_CONTENT: &str = "The content cannot be empty. Enter the post content.";
pub(super) const CANCELLED: &str = "Post creation cancelled.";
pub(super) const SCHEDULED: &str = "Post scheduled.";
