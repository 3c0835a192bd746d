use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::MediaId;
use crate::domains::posts::models::CreatePost;

use super::checkbox::CheckboxList;
use super::step::Step;

/// The post under construction. Owned by exactly one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub content: String,
    pub tags: BTreeSet<String>,
    pub sources: BTreeSet<String>,
    pub media: Vec<MediaId>,
    pub publish_at: Option<DateTime<Utc>>,
}

impl Draft {
    /// Freeze the draft into a creation request.
    pub fn to_create_post(&self, publish_date: DateTime<Utc>) -> CreatePost {
        CreatePost {
            title: self.title.clone(),
            content: self.content.clone(),
            publish_date,
            tags: self.tags.iter().cloned().collect(),
            sources: self.sources.iter().cloned().collect(),
            media_ids: self.media.clone(),
        }
    }
}

/// Everything stored per user while a conversation is in progress.
///
/// Having a session at all means the user is past `/create_post`; there is
/// no session in the absent state, so draft and step live and die together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub step: Step,
    pub draft: Draft,
    /// Checkboxes of the current selection step. Empty outside of one.
    pub checkboxes: CheckboxList,
}

impl Session {
    pub fn start() -> Self {
        Self {
            step: Step::AwaitingTitle,
            draft: Draft::default(),
            checkboxes: CheckboxList::default(),
        }
    }
}

/// Split comma-separated input into trimmed, non-empty items.
pub fn parse_list(input: &str) -> impl Iterator<Item = String> + '_ {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}
