//! Item record owned by one session key.

use serde::{Deserialize, Serialize};

/// Item id, unique within its owning key.
pub type ItemId = i64;

/// Suffix the home screen's edit action appends to an item name.
pub const EDITED_SUFFIX: &str = " (EDITED)";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
}

impl Item {
    pub fn new(id: ItemId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Name produced by the edit action for this item.
    pub fn edited_name(&self) -> String {
        format!("{}{EDITED_SUFFIX}", self.name)
    }
}

/// Collection every key is seeded with on first observation.
pub fn default_items() -> Vec<Item> {
    vec![Item::new(1, "Task A"), Item::new(2, "Task B")]
}
