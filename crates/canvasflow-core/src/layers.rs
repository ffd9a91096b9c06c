//! Layer tree over a screen's flat children and groups lists.
//!
//! Storage stays flat: children point at a group through `groupId` and groups
//! point at their parent through `parentGroupId`. The tree is derived on
//! demand and every mutation below edits only those two fields.

use crate::document::Document;
use crate::shapes::{Group, GroupId, ShapeId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A node of the derived layer tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerNode {
    Group {
        id: GroupId,
        name: String,
        children: Vec<LayerNode>,
    },
    Child {
        id: ShapeId,
    },
}

impl LayerNode {
    /// Child shape ids in this subtree, depth first.
    pub fn child_ids(&self) -> Vec<&str> {
        match self {
            LayerNode::Child { id } => vec![id.as_str()],
            LayerNode::Group { children, .. } => {
                children.iter().flat_map(LayerNode::child_ids).collect()
            }
        }
    }
}

/// Derive the layer tree of a screen.
///
/// Sub-groups come before direct children inside a group, ungrouped children
/// follow the root groups, and groups with no children anywhere below them
/// are left out. Children of a missing group count as ungrouped and groups
/// with a missing parent count as roots.
pub fn build_layer_tree(doc: &Document, screen_id: &str) -> Vec<LayerNode> {
    let Some(screen) = doc.shape(screen_id) else {
        return Vec::new();
    };
    let known: HashSet<&str> = screen.groups.iter().map(|g| g.id.as_str()).collect();

    let mut children_by_group: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut ungrouped = Vec::new();
    for child in doc.screen_children(screen_id) {
        match child.group_id.as_deref() {
            Some(g) if known.contains(g) => {
                children_by_group.entry(g).or_default().push(child.id.as_str())
            }
            _ => ungrouped.push(child.id.as_str()),
        }
    }

    let mut groups_by_parent: HashMap<&str, Vec<&Group>> = HashMap::new();
    let mut roots = Vec::new();
    for group in &screen.groups {
        match group.parent_group_id.as_deref() {
            Some(p) if known.contains(p) && p != group.id => {
                groups_by_parent.entry(p).or_default().push(group)
            }
            _ => roots.push(group),
        }
    }

    let mut visited = HashSet::new();
    let mut tree: Vec<LayerNode> = roots
        .into_iter()
        .filter_map(|g| assemble(g, &children_by_group, &groups_by_parent, &mut visited))
        .collect();

    // Children stranded in a stored cycle are shown at the root.
    let emitted: HashSet<&str> = tree.iter().flat_map(LayerNode::child_ids).collect();
    let stranded: Vec<&str> = children_by_group
        .iter()
        .filter(|(g, _)| !visited.contains(**g))
        .flat_map(|(_, ids)| ids.iter().copied())
        .filter(|id| !emitted.contains(id))
        .collect();
    for id in ungrouped.into_iter().chain(order_like(doc, screen_id, stranded)) {
        tree.push(LayerNode::Child { id: id.to_string() });
    }
    tree
}

fn order_like<'a>(doc: &Document, screen_id: &str, ids: Vec<&'a str>) -> Vec<&'a str> {
    let order: Vec<&str> = doc
        .screen_children(screen_id)
        .into_iter()
        .map(|s| s.id.as_str())
        .collect();
    let mut ids = ids;
    ids.sort_by_key(|id| order.iter().position(|o| o == id));
    ids
}

fn assemble<'a>(
    group: &'a Group,
    children_by_group: &HashMap<&str, Vec<&str>>,
    groups_by_parent: &HashMap<&str, Vec<&'a Group>>,
    visited: &mut HashSet<&'a str>,
) -> Option<LayerNode> {
    if !visited.insert(group.id.as_str()) {
        return None;
    }
    let mut children: Vec<LayerNode> = groups_by_parent
        .get(group.id.as_str())
        .into_iter()
        .flatten()
        .copied()
        .filter_map(|sub| assemble(sub, children_by_group, groups_by_parent, visited))
        .collect();
    children.extend(
        children_by_group
            .get(group.id.as_str())
            .into_iter()
            .flatten()
            .map(|id| LayerNode::Child { id: id.to_string() }),
    );
    if children.is_empty() {
        return None;
    }
    Some(LayerNode::Group {
        id: group.id.clone(),
        name: group.name.clone(),
        children,
    })
}

fn is_child_of(doc: &Document, screen_id: &str, child_id: &str) -> bool {
    doc.screen_children(screen_id)
        .iter()
        .any(|c| c.id == child_id)
}

fn has_group(doc: &Document, screen_id: &str, group_id: &str) -> bool {
    doc.shape(screen_id)
        .is_some_and(|s| s.group(group_id).is_some())
}

/// True if `candidate` is `ancestor` or lies below it.
///
/// Walks parent links up from `candidate`, bounded by the number of groups so
/// a corrupt cyclic list still terminates.
pub fn is_same_or_descendant(groups: &[Group], candidate: &str, ancestor: &str) -> bool {
    let mut current = Some(candidate);
    for _ in 0..=groups.len() {
        let Some(id) = current else {
            return false;
        };
        if id == ancestor {
            return true;
        }
        current = groups
            .iter()
            .find(|g| g.id == id)
            .and_then(|g| g.parent_group_id.as_deref());
    }
    false
}

/// Move a child into a group, or to the root with `None`.
///
/// No-op (returns false) when the child is not in the screen or the target is
/// not one of the screen's groups.
pub fn move_child_to_group(
    doc: &mut Document,
    screen_id: &str,
    child_id: &str,
    target: Option<&str>,
) -> bool {
    if !is_child_of(doc, screen_id, child_id) {
        return false;
    }
    if let Some(target) = target {
        if !has_group(doc, screen_id, target) {
            return false;
        }
    }
    let Some(child) = doc.shape_mut(child_id) else {
        return false;
    };
    let next = target.map(str::to_string);
    if child.group_id == next {
        return false;
    }
    child.group_id = next;
    true
}

/// Reparent a group. Rejected as a no-op if `parent` is the group itself or
/// one of its descendants.
pub fn nest_group(doc: &mut Document, screen_id: &str, group_id: &str, parent: Option<&str>) -> bool {
    let Some(screen) = doc.shape_mut(screen_id) else {
        return false;
    };
    if screen.group(group_id).is_none() {
        return false;
    }
    if let Some(parent) = parent {
        if screen.group(parent).is_none() || is_same_or_descendant(&screen.groups, parent, group_id) {
            log::debug!("Rejected nesting group {group_id} under {parent}: would create a cycle");
            return false;
        }
    }
    let next = parent.map(str::to_string);
    match screen.groups.iter_mut().find(|g| g.id == group_id) {
        Some(group) if group.parent_group_id != next => {
            group.parent_group_id = next;
            true
        }
        _ => false,
    }
}

/// "Group N" with N one past the highest number already in use.
fn next_group_name(groups: &[Group]) -> String {
    let highest = groups
        .iter()
        .filter_map(|g| g.name.strip_prefix("Group ")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("Group {}", highest + 1)
}

/// Create a new group under `parent` holding the given children.
///
/// Children not in the screen are ignored; nothing happens if none remain.
pub fn create_group_with(
    doc: &mut Document,
    screen_id: &str,
    child_ids: &[ShapeId],
    parent: Option<&str>,
) -> Option<GroupId> {
    wrap_into_group(doc, screen_id, child_ids, &[], parent)
}

/// Create a new group under `parent` and move children and existing groups
/// into it.
///
/// Returns None without changes when nothing valid was given, or when
/// `parent` sits inside one of the groups being wrapped.
pub fn wrap_into_group(
    doc: &mut Document,
    screen_id: &str,
    child_ids: &[ShapeId],
    group_ids: &[GroupId],
    parent: Option<&str>,
) -> Option<GroupId> {
    let view: &Document = doc;
    let screen = view.shape(screen_id)?;
    let children: Vec<ShapeId> = child_ids
        .iter()
        .filter(|id| is_child_of(view, screen_id, id))
        .cloned()
        .collect();
    let groups: Vec<GroupId> = group_ids
        .iter()
        .filter(|id| screen.group(id).is_some())
        .cloned()
        .collect();
    if children.is_empty() && groups.is_empty() {
        return None;
    }
    if let Some(parent) = parent {
        if screen.group(parent).is_none() {
            return None;
        }
        if groups
            .iter()
            .any(|g| is_same_or_descendant(&screen.groups, parent, g))
        {
            log::debug!("Rejected wrapping groups into a descendant of themselves");
            return None;
        }
    }

    let group = Group::new(next_group_name(&screen.groups)).under(parent.map(str::to_string));
    let new_id = group.id.clone();

    let screen = doc.shape_mut(screen_id)?;
    for existing in screen.groups.iter_mut() {
        if groups.contains(&existing.id) {
            existing.parent_group_id = Some(new_id.clone());
        }
    }
    screen.groups.push(group);
    for child_id in &children {
        if let Some(child) = doc.shape_mut(child_id) {
            child.group_id = Some(new_id.clone());
        }
    }
    Some(new_id)
}

/// Remove a group; its children and sub-groups move to its parent.
pub fn ungroup(doc: &mut Document, screen_id: &str, group_id: &str) -> bool {
    let Some(screen) = doc.shape_mut(screen_id) else {
        return false;
    };
    let Some(pos) = screen.groups.iter().position(|g| g.id == group_id) else {
        return false;
    };
    let removed = screen.groups.remove(pos);
    for group in screen.groups.iter_mut() {
        if group.parent_group_id.as_deref() == Some(group_id) {
            group.parent_group_id = removed.parent_group_id.clone();
        }
    }
    let members: Vec<ShapeId> = doc
        .screen_children(screen_id)
        .into_iter()
        .filter(|c| c.group_id.as_deref() == Some(group_id))
        .map(|c| c.id.clone())
        .collect();
    for id in members {
        if let Some(child) = doc.shape_mut(&id) {
            child.group_id = removed.parent_group_id.clone();
        }
    }
    true
}

/// Rename a group. Returns false if the group does not exist.
pub fn rename_group(doc: &mut Document, screen_id: &str, group_id: &str, name: &str) -> bool {
    let Some(group) = doc
        .shape_mut(screen_id)
        .and_then(|s| s.groups.iter_mut().find(|g| g.id == group_id))
    else {
        return false;
    };
    group.name = name.to_string();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_SHAPE_SIZE;
    use crate::shapes::{Shape, ShapeKind};

    fn doc_with(groups: Vec<Group>, children: &[(&str, Option<&str>)]) -> Document {
        let mut doc = Document::new(MIN_SHAPE_SIZE);
        let mut screen = Shape::with_id("scr", ShapeKind::Screen, 0.0, 0.0, 800.0, 600.0);
        screen.groups = groups;
        screen.children_ids = Some(Vec::new());
        doc.add_shape(screen);
        for (id, group) in children {
            let mut child = Shape::with_id(*id, ShapeKind::Rectangle, 0.0, 0.0, 40.0, 40.0).in_screen("scr");
            child.group_id = group.map(str::to_string);
            doc.add_shape(child);
        }
        doc
    }

    fn chain() -> Vec<Group> {
        vec![
            Group::with_id("A", "A"),
            Group::with_id("B", "B").under(Some("A".into())),
            Group::with_id("C", "C").under(Some("B".into())),
        ]
    }

    #[test]
    fn test_tree_orders_subgroups_first() {
        let doc = doc_with(chain(), &[("x", Some("A")), ("y", Some("C")), ("z", None)]);
        let tree = build_layer_tree(&doc, "scr");
        assert_eq!(tree.len(), 2);
        let LayerNode::Group { id, children, .. } = &tree[0] else {
            panic!("expected group");
        };
        assert_eq!(id, "A");
        assert!(matches!(&children[0], LayerNode::Group { id, .. } if id == "B"));
        assert_eq!(children[1], LayerNode::Child { id: "x".into() });
        assert_eq!(tree[1], LayerNode::Child { id: "z".into() });
        assert_eq!(tree[0].child_ids(), vec!["y", "x"]);
    }

    #[test]
    fn test_empty_groups_pruned_not_deleted() {
        let doc = doc_with(chain(), &[("z", None)]);
        let tree = build_layer_tree(&doc, "scr");
        assert_eq!(tree, vec![LayerNode::Child { id: "z".into() }]);
        assert_eq!(doc.shape("scr").unwrap().groups.len(), 3);
    }

    #[test]
    fn test_missing_references_fall_back_to_root() {
        let groups = vec![Group::with_id("orphan", "O").under(Some("gone".into()))];
        let doc = doc_with(groups, &[("a", Some("orphan")), ("b", Some("nowhere"))]);
        let tree = build_layer_tree(&doc, "scr");
        assert!(matches!(&tree[0], LayerNode::Group { id, .. } if id == "orphan"));
        assert_eq!(tree[1], LayerNode::Child { id: "b".into() });
    }

    #[test]
    fn test_stored_cycle_does_not_lose_children() {
        let groups = vec![
            Group::with_id("P", "P").under(Some("Q".into())),
            Group::with_id("Q", "Q").under(Some("P".into())),
        ];
        let doc = doc_with(groups, &[("a", Some("P"))]);
        let tree = build_layer_tree(&doc, "scr");
        assert_eq!(tree, vec![LayerNode::Child { id: "a".into() }]);
    }

    #[test]
    fn test_nest_group_rejects_cycle() {
        let mut doc = doc_with(chain(), &[("y", Some("C"))]);
        let before = doc.shape("scr").unwrap().groups.clone();
        assert!(!nest_group(&mut doc, "scr", "A", Some("C")));
        assert!(!nest_group(&mut doc, "scr", "A", Some("A")));
        assert_eq!(doc.shape("scr").unwrap().groups, before);
        assert!(nest_group(&mut doc, "scr", "C", None));
        assert!(doc.shape("scr").unwrap().group("C").unwrap().parent_group_id.is_none());
    }

    #[test]
    fn test_move_child_to_unknown_group_is_noop() {
        let mut doc = doc_with(chain(), &[("x", None)]);
        assert!(!move_child_to_group(&mut doc, "scr", "x", Some("missing")));
        assert!(move_child_to_group(&mut doc, "scr", "x", Some("B")));
        assert_eq!(doc.shape("x").unwrap().group_id.as_deref(), Some("B"));
        assert!(move_child_to_group(&mut doc, "scr", "x", None));
        assert!(doc.shape("x").unwrap().group_id.is_none());
    }

    #[test]
    fn test_create_group_then_prune() {
        let mut doc = doc_with(Vec::new(), &[("a", None), ("b", None)]);
        let gid = create_group_with(&mut doc, "scr", &["a".into(), "b".into()], None).unwrap();
        let tree = build_layer_tree(&doc, "scr");
        assert_eq!(tree.len(), 1);
        assert!(matches!(&tree[0], LayerNode::Group { id, children, .. } if *id == gid && children.len() == 2));

        doc.delete_shape("a");
        doc.delete_shape("b");
        assert!(build_layer_tree(&doc, "scr").is_empty());
        assert!(doc.shape("scr").unwrap().group(&gid).is_some());
    }

    #[test]
    fn test_wrap_into_group_moves_groups() {
        let mut doc = doc_with(chain(), &[("y", Some("C")), ("z", None)]);
        let gid = wrap_into_group(&mut doc, "scr", &["z".into()], &["A".into()], None).unwrap();
        let screen = doc.shape("scr").unwrap();
        assert_eq!(screen.group("A").unwrap().parent_group_id.as_deref(), Some(gid.as_str()));
        assert_eq!(doc.shape("z").unwrap().group_id.as_deref(), Some(gid.as_str()));

        assert!(wrap_into_group(&mut doc, "scr", &[], &["A".into()], Some("C")).is_none());
    }

    #[test]
    fn test_ungroup_lifts_members() {
        let mut doc = doc_with(chain(), &[("x", Some("B")), ("y", Some("C"))]);
        assert!(ungroup(&mut doc, "scr", "B"));
        let screen = doc.shape("scr").unwrap();
        assert!(screen.group("B").is_none());
        assert_eq!(screen.group("C").unwrap().parent_group_id.as_deref(), Some("A"));
        assert_eq!(doc.shape("x").unwrap().group_id.as_deref(), Some("A"));
    }

    #[test]
    fn test_group_names_not_reused_after_ungroup() {
        let mut doc = doc_with(Vec::new(), &[("a", None), ("b", None), ("c", None)]);
        let first = create_group_with(&mut doc, "scr", &["a".into()], None).unwrap();
        let second = create_group_with(&mut doc, "scr", &["b".into()], None).unwrap();
        assert_eq!(doc.shape("scr").unwrap().group(&second).unwrap().name, "Group 2");

        assert!(ungroup(&mut doc, "scr", &first));
        let third = create_group_with(&mut doc, "scr", &["c".into()], None).unwrap();
        let screen = doc.shape("scr").unwrap();
        assert_eq!(screen.group(&third).unwrap().name, "Group 3");
        assert!(rename_group(&mut doc, "scr", &third, "Nav"));
        let fourth = create_group_with(&mut doc, "scr", &["a".into()], None).unwrap();
        assert_eq!(doc.shape("scr").unwrap().group(&fourth).unwrap().name, "Group 3");
    }

    #[test]
    fn test_rename_group() {
        let mut doc = doc_with(chain(), &[]);
        assert!(rename_group(&mut doc, "scr", "B", "Nav"));
        assert_eq!(doc.shape("scr").unwrap().group("B").unwrap().name, "Nav");
        assert!(!rename_group(&mut doc, "scr", "missing", "x"));
    }
}
