use indexmap::{IndexMap, IndexSet};

use crate::model::identity::{IndexPath, NodeKey};
use crate::model::todo::TodoItemRef;
use crate::model::tree::{Level, NodeRef, TaskTree};
use crate::ops::tree_ops::{find_by_id, for_each_node, locate, node_at};

/// Sparse completion map: key → `true`. Absent means not completed.
pub type CompletionState = IndexMap<String, bool>;

// ---------------------------------------------------------------------------
// Breakdown select-all
// ---------------------------------------------------------------------------

/// Set `needsBreakdown` on every task and subtask, overwriting prior flags.
/// Returns the number of nodes touched.
pub fn set_all_breakdown(tree: &mut TaskTree, value: bool) -> usize {
    let mut touched = 0;
    for cat in &mut tree.categories {
        for proj in &mut cat.projects {
            for task in &mut proj.tasks {
                task.needs_breakdown = Some(value);
                touched += 1;
                for sub in &mut task.subtasks {
                    sub.needs_breakdown = Some(value);
                    touched += 1;
                }
            }
        }
    }
    touched
}

// ---------------------------------------------------------------------------
// Descendant resolution
// ---------------------------------------------------------------------------

/// Keys of every node strictly beneath the node identified by `key`.
///
/// Categories, projects and tasks are searched for a matching id first. If
/// none matches and `key` is a positional path to an unidentified node, that
/// node is used instead. Descendants are keyed by id, or by path when they
/// have none. An unknown key yields an empty list.
pub fn resolve_descendants(tree: &TaskTree, key: &str) -> Vec<String> {
    let Some(root) = resolve_branch(tree, key) else {
        return Vec::new();
    };
    let mut keys = Vec::new();
    for_each_node(tree, &mut |path, node| {
        if path.is_descendant_of(&root) {
            keys.push(NodeKey::for_node(node.id(), path).to_string());
        }
    });
    keys
}

fn resolve_branch(tree: &TaskTree, key: &str) -> Option<IndexPath> {
    let path = match find_by_id(tree, key) {
        Some((path, _)) => Some(path),
        None => match NodeKey::parse_loose(key) {
            positional @ NodeKey::Positional(_) => locate(tree, &positional),
            NodeKey::StableId(_) => None,
        },
    }?;
    // Subtasks are terminal
    (path.level() != Level::Subtask).then_some(path)
}

// ---------------------------------------------------------------------------
// Completion cascade
// ---------------------------------------------------------------------------

/// Check or uncheck `key` and everything beneath it. Ancestors are never
/// touched. Returns every key that was written.
pub fn apply_completion(
    state: &mut CompletionState,
    tree: &TaskTree,
    key: &str,
    checked: bool,
) -> Vec<String> {
    let mut keys = vec![key.to_string()];
    keys.extend(resolve_descendants(tree, key));
    for k in &keys {
        set_completion(state, k, checked);
    }
    keys
}

/// Set a single key without cascading
pub fn set_completion(state: &mut CompletionState, key: &str, checked: bool) {
    if checked {
        state.insert(key.to_string(), true);
    } else {
        state.shift_remove(key);
    }
}

pub fn is_completed(state: &CompletionState, key: &str) -> bool {
    state.get(key).copied().unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

/// Carry completion state over from `old` to its replacement `new`.
/// Returns the keys that were dropped.
///
/// Id keys are kept. A positional key survives only when both trees hold an
/// unidentified node at that path, reached through the same names at every
/// level. Otherwise it would check off an unrelated node.
pub fn migrate_completion(state: &mut CompletionState, old: &TaskTree, new: &TaskTree) -> Vec<String> {
    let mut dropped = Vec::new();
    state.retain(|key, _| {
        let NodeKey::Positional(path) = NodeKey::parse_loose(key) else {
            return true;
        };
        if find_by_id(old, key).is_some() || find_by_id(new, key).is_some() {
            return true;
        }
        let keep = same_unidentified_node(old, new, &path);
        if !keep {
            dropped.push(key.clone());
        }
        keep
    });
    dropped
}

fn same_unidentified_node(old: &TaskTree, new: &TaskTree, path: &IndexPath) -> bool {
    let (Some(before), Some(after)) = (node_at(old, path), node_at(new, path)) else {
        return false;
    };
    if before.id().is_some() || after.id().is_some() {
        return false;
    }
    let mut current = Some(path.clone());
    while let Some(p) = current {
        match (node_at(old, &p), node_at(new, &p)) {
            (Some(a), Some(b)) if a.name() == b.name() => {}
            _ => return false,
        }
        current = p.parent();
    }
    true
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Check or uncheck `path` in a selection picker. Checking also checks every
/// node beneath it; unchecking clears them.
pub fn cascade_selection(
    selection: &mut IndexSet<IndexPath>,
    tree: &TaskTree,
    path: &IndexPath,
    checked: bool,
) {
    if checked {
        if node_at(tree, path).is_none() {
            return;
        }
        selection.insert(path.clone());
        for_each_node(tree, &mut |p, _| {
            if p.is_descendant_of(path) {
                selection.insert(p.clone());
            }
        });
    } else {
        selection.retain(|p| p != path && !p.is_descendant_of(path));
    }
}

/// Flatten checked paths into to-do item references, in the given order.
/// Paths that no longer resolve are skipped; nothing is deduplicated.
pub fn selected_items(tree: &TaskTree, paths: &[IndexPath]) -> Vec<TodoItemRef> {
    paths
        .iter()
        .filter_map(|path| {
            let node = node_at(tree, path)?;
            let parent = path
                .parent()
                .and_then(|p| node_at(tree, &p))
                .map(|p| p.name().to_string());
            Some(item_ref(node, path, parent))
        })
        .collect()
}

fn item_ref(node: NodeRef<'_>, path: &IndexPath, parent: Option<String>) -> TodoItemRef {
    let level = node.level();
    TodoItemRef {
        kind: level,
        name: node.name().to_string(),
        emoji: node.emoji().unwrap_or_default().to_string(),
        level: level.depth() as u8,
        parent,
        path: Some(path.clone()),
        id: node.id().map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
