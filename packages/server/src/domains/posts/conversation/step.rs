use serde::{Deserialize, Serialize};

/// Where a user is in the authoring flow.
///
/// A user without a session is in the implicit absent state; there is no
/// variant for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    AwaitingTitle,
    AwaitingContent,
    AwaitingTags,
    AwaitingSources,
    AwaitingPublishDate,
}

impl Step {
    /// The kind of checkbox toggle this step accepts, if any.
    pub fn selection(self) -> Option<SelectionKind> {
        match self {
            Step::AwaitingTags => Some(SelectionKind::Tag),
            Step::AwaitingSources => Some(SelectionKind::Source),
            Step::AwaitingTitle | Step::AwaitingContent | Step::AwaitingPublishDate => None,
        }
    }
}

/// What a checkbox list selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionKind {
    Tag,
    Source,
}

impl SelectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionKind::Tag => "tag",
            SelectionKind::Source => "source",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tag" => Some(SelectionKind::Tag),
            "source" => Some(SelectionKind::Source),
            _ => None,
        }
    }
}

impl std::fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
