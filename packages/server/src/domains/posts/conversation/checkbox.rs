//! Toggleable item lists shown while picking tags or sources.

use serde::{Deserialize, Serialize};

use super::step::SelectionKind;

/// Prefix marking a selected item in its label.
pub const SELECTED_MARK: &str = "✅ ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckboxItem {
    pub value: String,
    pub selected: bool,
}

impl CheckboxItem {
    pub fn label(&self) -> String {
        if self.selected {
            format!("{}{}", SELECTED_MARK, self.value)
        } else {
            self.value.clone()
        }
    }
}

/// Ordered checkbox list. Built fresh, all unselected, when a step is entered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckboxList {
    items: Vec<CheckboxItem>,
}

impl CheckboxList {
    pub fn new(values: impl IntoIterator<Item = String>) -> Self {
        let mut items: Vec<CheckboxItem> = Vec::new();
        for value in values {
            if !items.iter().any(|item| item.value == value) {
                items.push(CheckboxItem {
                    value,
                    selected: false,
                });
            }
        }
        Self { items }
    }

    /// Flip `value`. Returns false if the list has no such item.
    pub fn toggle(&mut self, value: &str) -> bool {
        match self.items.iter_mut().find(|item| item.value == value) {
            Some(item) => {
                item.selected = !item.selected;
                true
            }
            None => false,
        }
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(|item| item.selected)
            .map(|item| item.value.as_str())
    }

    pub fn items(&self) -> &[CheckboxItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Callback payload for a checkbox button: `tag:<value>` / `source:<value>`.
pub fn callback_data(kind: SelectionKind, value: &str) -> String {
    format!("{}:{}", kind.as_str(), value)
}

/// Inverse of [`callback_data`]. Values may themselves contain `:`.
pub fn parse_callback(data: &str) -> Option<(SelectionKind, String)> {
    let (kind, value) = data.split_once(':')?;
    Some((SelectionKind::parse(kind)?, value.to_string()))
}
