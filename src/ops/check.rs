use std::collections::HashMap;

use serde::Serialize;

use crate::model::identity::IndexPath;
use crate::model::tree::{NodeRef, TaskTree};
use crate::ops::tree_ops::for_each_node;

/// Structured result from `pt check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A validation error (something that should be fixed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// The same id is carried by more than one node
    #[serde(rename = "duplicate_id")]
    DuplicateId { id: String, paths: Vec<IndexPath> },
    /// Node name is empty or whitespace
    #[serde(rename = "empty_name")]
    EmptyName { path: IndexPath },
    /// Two categories share a name, so merges can only ever reach the first
    #[serde(rename = "duplicate_category_name")]
    DuplicateCategoryName { name: String, paths: Vec<IndexPath> },
}

/// A validation warning (non-critical issue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// Node has no stable id (completion falls back to its position)
    #[serde(rename = "missing_id")]
    MissingId { path: IndexPath, name: String },
    /// Two projects/tasks/subtasks under the same parent share a name
    #[serde(rename = "duplicate_sibling_name")]
    DuplicateSiblingName { name: String, paths: Vec<IndexPath> },
    /// Task is flagged for breakdown but already has subtasks
    #[serde(rename = "flag_on_branch_task")]
    FlagOnBranchTask { path: IndexPath, name: String },
}

impl std::fmt::Display for CheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckError::DuplicateId { id, paths } => {
                write!(f, "duplicate id {} at {}", id, join_paths(paths))
            }
            CheckError::EmptyName { path } => write!(f, "empty name at {}", path),
            CheckError::DuplicateCategoryName { name, paths } => {
                write!(f, "category \"{}\" appears at {}", name, join_paths(paths))
            }
        }
    }
}

impl std::fmt::Display for CheckWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckWarning::MissingId { path, name } => write!(f, "{} \"{}\" has no id", path, name),
            CheckWarning::DuplicateSiblingName { name, paths } => {
                write!(f, "\"{}\" appears at {}", name, join_paths(paths))
            }
            CheckWarning::FlagOnBranchTask { path, name } => write!(
                f,
                "{} \"{}\" is flagged but already has subtasks",
                path, name
            ),
        }
    }
}

fn join_paths(paths: &[IndexPath]) -> String {
    paths
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a tree and return structured results. Read-only.
///
/// Checks performed:
/// 1. No id is used twice
/// 2. Every name is non-empty
/// 3. Category names are unique
/// 4. Warnings for missing ids, same-named siblings, flags on branch tasks
pub fn check_tree(tree: &TaskTree) -> CheckResult {
    let mut result = CheckResult::default();

    let mut id_locations: Vec<(String, Vec<IndexPath>)> = Vec::new();
    let mut id_index: HashMap<String, usize> = HashMap::new();
    // parent path (None for the root) → name → paths, in document order
    let mut siblings: Vec<(Option<IndexPath>, String, Vec<IndexPath>)> = Vec::new();
    let mut sibling_index: HashMap<(Option<IndexPath>, String), usize> = HashMap::new();

    for_each_node(tree, &mut |path, node| {
        if node.name().trim().is_empty() {
            result.errors.push(CheckError::EmptyName { path: path.clone() });
        }

        match node.id() {
            Some(id) => {
                let slot = *id_index.entry(id.to_string()).or_insert_with(|| {
                    id_locations.push((id.to_string(), Vec::new()));
                    id_locations.len() - 1
                });
                id_locations[slot].1.push(path.clone());
            }
            None => result.warnings.push(CheckWarning::MissingId {
                path: path.clone(),
                name: node.name().to_string(),
            }),
        }

        if let NodeRef::Task(task) = node
            && task.is_flagged()
            && !task.is_leaf()
        {
            result.warnings.push(CheckWarning::FlagOnBranchTask {
                path: path.clone(),
                name: task.name.clone(),
            });
        }

        let key = (path.parent(), node.name().to_string());
        let slot = *sibling_index.entry(key.clone()).or_insert_with(|| {
            siblings.push((key.0, key.1, Vec::new()));
            siblings.len() - 1
        });
        siblings[slot].2.push(path.clone());
    });

    for (id, paths) in id_locations {
        if paths.len() > 1 {
            result.errors.push(CheckError::DuplicateId { id, paths });
        }
    }

    for (parent, name, paths) in siblings {
        if paths.len() < 2 {
            continue;
        }
        if parent.is_none() {
            result
                .errors
                .push(CheckError::DuplicateCategoryName { name, paths });
        } else {
            result
                .warnings
                .push(CheckWarning::DuplicateSiblingName { name, paths });
        }
    }

    result.valid = result.errors.is_empty();
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
