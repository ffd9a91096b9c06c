//! Named groups inside a screen.

use serde::{Deserialize, Serialize};

/// Unique identifier for groups within a screen.
pub type GroupId = String;

/// A named grouping of screen children.
///
/// Groups only record their parent; membership lives on the child shapes
/// (`Shape::group_id`), so the hierarchy is a flat list with parent links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    #[serde(default)]
    pub name: String,
    /// Parent group (None = root of its screen).
    #[serde(default)]
    pub parent_group_id: Option<GroupId>,
}

impl Group {
    /// Create a root-level group with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: super::new_id(),
            name: name.into(),
            parent_group_id: None,
        }
    }

    /// Create a group with a specific id.
    pub fn with_id(id: impl Into<GroupId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_group_id: None,
        }
    }

    /// Builder: nest under a parent group.
    pub fn under(mut self, parent: Option<GroupId>) -> Self {
        self.parent_group_id = parent;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_serde_null_parent() {
        let group = Group::with_id("g1", "Header");
        let value = serde_json::to_value(&group).unwrap();
        assert_eq!(value["parentGroupId"], serde_json::Value::Null);

        let parsed: Group = serde_json::from_str(r#"{"id":"g2"}"#).unwrap();
        assert_eq!(parsed.name, "");
        assert!(parsed.parent_group_id.is_none());
    }

    #[test]
    fn test_fresh_ids_differ() {
        assert_ne!(Group::new("a").id, Group::new("a").id);
    }
}
