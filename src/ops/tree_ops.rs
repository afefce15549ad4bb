use crate::model::identity::{IndexPath, NodeKey};
use crate::model::tree::{Category, Level, NodeRef, Project, Subtask, Task, TaskTree};

/// Error type for structural tree operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("nothing at {0}")]
    NotFound(IndexPath),
    #[error("{path} is a {actual}, expected a {expected}")]
    WrongLevel {
        path: IndexPath,
        expected: Level,
        actual: Level,
    },
    #[error("name must not be empty")]
    EmptyName,
    #[error("a {0} cannot be flagged for breakdown")]
    NotFlaggable(Level),
    #[error("a {0} has no dependencies")]
    NoDependencies(Level),
    #[error("{path} has no dependency #{index}")]
    NoSuchDependency { path: IndexPath, index: usize },
    #[error("subtasks cannot have children")]
    MaxDepthReached,
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("a category named \"{0}\" already exists")]
    DuplicateCategory(String),
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// Borrow the node at `path`, whatever its level
pub fn node_at<'a>(tree: &'a TaskTree, path: &IndexPath) -> Option<NodeRef<'a>> {
    let idx = path.indices();
    let cat = tree.categories.get(idx[0])?;
    let Some(&p) = idx.get(1) else {
        return Some(NodeRef::Category(cat));
    };
    let proj = cat.projects.get(p)?;
    let Some(&t) = idx.get(2) else {
        return Some(NodeRef::Project(proj));
    };
    let task = proj.tasks.get(t)?;
    let Some(&s) = idx.get(3) else {
        return Some(NodeRef::Task(task));
    };
    task.subtasks.get(s).map(NodeRef::Subtask)
}

pub fn category<'a>(tree: &'a TaskTree, path: &IndexPath) -> Result<&'a Category, TreeError> {
    match node_at(tree, path) {
        Some(NodeRef::Category(c)) => Ok(c),
        other => Err(level_error(path, Level::Category, other)),
    }
}

pub fn project<'a>(tree: &'a TaskTree, path: &IndexPath) -> Result<&'a Project, TreeError> {
    match node_at(tree, path) {
        Some(NodeRef::Project(p)) => Ok(p),
        other => Err(level_error(path, Level::Project, other)),
    }
}

pub fn task<'a>(tree: &'a TaskTree, path: &IndexPath) -> Result<&'a Task, TreeError> {
    match node_at(tree, path) {
        Some(NodeRef::Task(t)) => Ok(t),
        other => Err(level_error(path, Level::Task, other)),
    }
}

pub fn subtask<'a>(tree: &'a TaskTree, path: &IndexPath) -> Result<&'a Subtask, TreeError> {
    match node_at(tree, path) {
        Some(NodeRef::Subtask(s)) => Ok(s),
        other => Err(level_error(path, Level::Subtask, other)),
    }
}

fn level_error(path: &IndexPath, expected: Level, found: Option<NodeRef<'_>>) -> TreeError {
    match found {
        Some(node) => TreeError::WrongLevel {
            path: path.clone(),
            expected,
            actual: node.level(),
        },
        None => TreeError::NotFound(path.clone()),
    }
}

fn category_mut<'a>(tree: &'a mut TaskTree, path: &IndexPath) -> Result<&'a mut Category, TreeError> {
    tree.categories
        .get_mut(path.indices()[0])
        .ok_or_else(|| TreeError::NotFound(path.clone()))
}

fn project_mut<'a>(tree: &'a mut TaskTree, path: &IndexPath) -> Result<&'a mut Project, TreeError> {
    let idx = path.indices();
    let p = *idx.get(1).ok_or_else(|| TreeError::NotFound(path.clone()))?;
    category_mut(tree, path)?
        .projects
        .get_mut(p)
        .ok_or_else(|| TreeError::NotFound(path.clone()))
}

fn task_mut<'a>(tree: &'a mut TaskTree, path: &IndexPath) -> Result<&'a mut Task, TreeError> {
    let idx = path.indices();
    let t = *idx.get(2).ok_or_else(|| TreeError::NotFound(path.clone()))?;
    project_mut(tree, path)?
        .tasks
        .get_mut(t)
        .ok_or_else(|| TreeError::NotFound(path.clone()))
}

fn subtask_mut<'a>(tree: &'a mut TaskTree, path: &IndexPath) -> Result<&'a mut Subtask, TreeError> {
    let idx = path.indices();
    let s = *idx.get(3).ok_or_else(|| TreeError::NotFound(path.clone()))?;
    task_mut(tree, path)?
        .subtasks
        .get_mut(s)
        .ok_or_else(|| TreeError::NotFound(path.clone()))
}

/// Visit every node depth-first, in document order.
pub fn for_each_node<'a>(tree: &'a TaskTree, f: &mut dyn FnMut(&IndexPath, NodeRef<'a>)) {
    for (ci, cat) in tree.categories.iter().enumerate() {
        f(&IndexPath::category(ci), NodeRef::Category(cat));
        for (pi, proj) in cat.projects.iter().enumerate() {
            f(&IndexPath::project(ci, pi), NodeRef::Project(proj));
            for (ti, task) in proj.tasks.iter().enumerate() {
                f(&IndexPath::task(ci, pi, ti), NodeRef::Task(task));
                for (si, sub) in task.subtasks.iter().enumerate() {
                    f(&IndexPath::subtask(ci, pi, ti, si), NodeRef::Subtask(sub));
                }
            }
        }
    }
}

/// Find the first node (document order) whose id equals `id`.
pub fn find_by_id<'a>(tree: &'a TaskTree, id: &str) -> Option<(IndexPath, NodeRef<'a>)> {
    let mut found = None;
    for_each_node(tree, &mut |path, node| {
        if found.is_none() && node.id() == Some(id) {
            found = Some((path.clone(), node));
        }
    });
    found
}

/// Resolve a key to a position in the current tree.
///
/// A positional key only resolves to a node that has no id of its own: once a
/// node has been given a stable id, its position is no longer its identity.
pub fn locate(tree: &TaskTree, key: &NodeKey) -> Option<IndexPath> {
    match key {
        NodeKey::StableId(id) => find_by_id(tree, id).map(|(path, _)| path),
        NodeKey::Positional(path) => match node_at(tree, path) {
            Some(node) if node.id().is_none() => Some(path.clone()),
            _ => None,
        },
    }
}

// ---------------------------------------------------------------------------
// Insertion / removal
// ---------------------------------------------------------------------------

/// Where to insert a new node among its siblings
#[derive(Debug, Clone)]
pub enum InsertPosition {
    /// Append after the last sibling
    Bottom,
    /// Prepend before the first sibling
    Top,
    /// Insert so the new node ends up at this index
    At(usize),
}

/// Add a new node named `name` beneath `parent` (`None` = new category).
/// The level is implied by the parent. New nodes never get an id.
/// Returns the path of the inserted node.
pub fn add_node(
    tree: &mut TaskTree,
    parent: Option<&IndexPath>,
    name: &str,
    position: InsertPosition,
) -> Result<IndexPath, TreeError> {
    let name = clean_name(name)?;
    match parent {
        None => {
            ensure_category_name_free(tree, &name, None)?;
            let idx = insert_at(&mut tree.categories, Category::new(name), &position)?;
            Ok(IndexPath::category(idx))
        }
        Some(parent) => {
            let idx = match parent.level() {
                Level::Category => {
                    let cat = category_mut(tree, parent)?;
                    insert_at(&mut cat.projects, Project::new(name), &position)?
                }
                Level::Project => {
                    let proj = project_mut(tree, parent)?;
                    insert_at(&mut proj.tasks, Task::new(name), &position)?
                }
                Level::Task => {
                    // The parent's needsBreakdown is left as-is
                    let task = task_mut(tree, parent)?;
                    insert_at(&mut task.subtasks, Subtask::new(name), &position)?
                }
                Level::Subtask => return Err(TreeError::MaxDepthReached),
            };
            parent.child(idx).ok_or(TreeError::MaxDepthReached)
        }
    }
}

/// Remove the node at `path` together with everything beneath it.
/// Returns the removed node's name.
pub fn remove_node(tree: &mut TaskTree, path: &IndexPath) -> Result<String, TreeError> {
    let last = path.last();
    let not_found = || TreeError::NotFound(path.clone());
    match path.parent() {
        None => {
            if last >= tree.categories.len() {
                return Err(not_found());
            }
            Ok(tree.categories.remove(last).name)
        }
        Some(parent) => match path.level() {
            Level::Project => {
                let cat = category_mut(tree, &parent)?;
                if last >= cat.projects.len() {
                    return Err(not_found());
                }
                Ok(cat.projects.remove(last).name)
            }
            Level::Task => {
                let proj = project_mut(tree, &parent)?;
                if last >= proj.tasks.len() {
                    return Err(not_found());
                }
                Ok(proj.tasks.remove(last).name)
            }
            Level::Subtask => {
                let task = task_mut(tree, &parent)?;
                if last >= task.subtasks.len() {
                    return Err(not_found());
                }
                Ok(task.subtasks.remove(last).name)
            }
            Level::Category => Err(not_found()),
        },
    }
}

// ---------------------------------------------------------------------------
// Field edits
// ---------------------------------------------------------------------------

/// Rename the node at `path`. The id is untouched.
pub fn rename(tree: &mut TaskTree, path: &IndexPath, new_name: &str) -> Result<(), TreeError> {
    let name = clean_name(new_name)?;
    match path.level() {
        Level::Category => {
            ensure_category_name_free(tree, &name, Some(path.last()))?;
            category_mut(tree, path)?.name = name;
        }
        Level::Project => project_mut(tree, path)?.name = name,
        Level::Task => task_mut(tree, path)?.name = name,
        Level::Subtask => subtask_mut(tree, path)?.name = name,
    }
    Ok(())
}

/// Set or clear the display emoji
pub fn set_emoji(
    tree: &mut TaskTree,
    path: &IndexPath,
    emoji: Option<String>,
) -> Result<(), TreeError> {
    let emoji = emoji.filter(|e| !e.trim().is_empty());
    match path.level() {
        Level::Category => category_mut(tree, path)?.emoji = emoji,
        Level::Project => project_mut(tree, path)?.emoji = emoji,
        Level::Task => task_mut(tree, path)?.emoji = emoji,
        Level::Subtask => subtask_mut(tree, path)?.emoji = emoji,
    }
    Ok(())
}

/// Set the breakdown flag on a task or subtask
pub fn set_needs_breakdown(
    tree: &mut TaskTree,
    path: &IndexPath,
    value: bool,
) -> Result<(), TreeError> {
    match path.level() {
        Level::Task => task_mut(tree, path)?.needs_breakdown = Some(value),
        Level::Subtask => subtask_mut(tree, path)?.needs_breakdown = Some(value),
        level => return Err(TreeError::NotFlaggable(level)),
    }
    Ok(())
}

fn deps_mut<'a>(tree: &'a mut TaskTree, path: &IndexPath) -> Result<&'a mut Vec<String>, TreeError> {
    match path.level() {
        Level::Category => Err(TreeError::NoDependencies(Level::Category)),
        Level::Project => Ok(&mut project_mut(tree, path)?.dependencies),
        Level::Task => Ok(&mut task_mut(tree, path)?.dependencies),
        Level::Subtask => Ok(&mut subtask_mut(tree, path)?.dependencies),
    }
}

/// Append a free-text dependency. Returns its index.
pub fn add_dependency(tree: &mut TaskTree, path: &IndexPath, dep: &str) -> Result<usize, TreeError> {
    let deps = deps_mut(tree, path)?;
    deps.push(dep.trim().to_string());
    Ok(deps.len() - 1)
}

pub fn edit_dependency(
    tree: &mut TaskTree,
    path: &IndexPath,
    index: usize,
    value: &str,
) -> Result<(), TreeError> {
    let deps = deps_mut(tree, path)?;
    let slot = deps.get_mut(index).ok_or_else(|| TreeError::NoSuchDependency {
        path: path.clone(),
        index,
    })?;
    *slot = value.trim().to_string();
    Ok(())
}

/// Remove a dependency by index. Returns the removed text.
pub fn remove_dependency(
    tree: &mut TaskTree,
    path: &IndexPath,
    index: usize,
) -> Result<String, TreeError> {
    let deps = deps_mut(tree, path)?;
    if index >= deps.len() {
        return Err(TreeError::NoSuchDependency {
            path: path.clone(),
            index,
        });
    }
    Ok(deps.remove(index))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn clean_name(name: &str) -> Result<String, TreeError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TreeError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// Category names are the merge join key, so they must stay unique.
/// `skip` is the index of the category being renamed.
fn ensure_category_name_free(tree: &TaskTree, name: &str, skip: Option<usize>) -> Result<(), TreeError> {
    let taken = tree
        .categories
        .iter()
        .enumerate()
        .any(|(i, cat)| Some(i) != skip && cat.name == name);
    if taken {
        return Err(TreeError::DuplicateCategory(name.to_string()));
    }
    Ok(())
}

/// Insert `item` into `items` at the given position. Returns the final index.
fn insert_at<T>(items: &mut Vec<T>, item: T, position: &InsertPosition) -> Result<usize, TreeError> {
    match position {
        InsertPosition::Bottom => {
            items.push(item);
            Ok(items.len() - 1)
        }
        InsertPosition::Top => {
            items.insert(0, item);
            Ok(0)
        }
        InsertPosition::At(idx) => {
            if *idx > items.len() {
                return Err(TreeError::InvalidPosition(format!(
                    "index {} is past the end ({} siblings)",
                    idx,
                    items.len()
                )));
            }
            items.insert(*idx, item);
            Ok(*idx)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_tree;

    fn sample_tree() -> TaskTree {
        parse_tree(
            r#"{
  "categories": [
    {
      "id": "c1",
      "name": "Household",
      "emoji": "🏠",
      "projects": [
        {
          "id": "p1",
          "name": "Kitchen",
          "dependencies": ["Buy supplies"],
          "tasks": [
            {"id": "t1", "name": "Clean fridge", "subtasks": []},
            {"id": "t2", "name": "Dishes", "subtasks": [
              {"id": "s1", "name": "Load dishwasher"},
              {"id": "s2", "name": "Hand-wash pans"}
            ]}
          ]
        }
      ]
    },
    {
      "name": "Work",
      "projects": []
    }
  ]
}"#,
        )
        .unwrap()
    }

    // --- Navigation ---

    #[test]
    fn test_node_at_each_level() {
        let tree = sample_tree();
        assert_eq!(node_at(&tree, &IndexPath::category(0)).unwrap().name(), "Household");
        assert_eq!(node_at(&tree, &IndexPath::project(0, 0)).unwrap().name(), "Kitchen");
        assert_eq!(node_at(&tree, &IndexPath::task(0, 0, 1)).unwrap().name(), "Dishes");
        assert_eq!(
            node_at(&tree, &IndexPath::subtask(0, 0, 1, 1)).unwrap().name(),
            "Hand-wash pans"
        );
        assert!(node_at(&tree, &IndexPath::project(1, 0)).is_none());
        assert!(node_at(&tree, &IndexPath::category(7)).is_none());
    }

    #[test]
    fn test_typed_getters_check_level() {
        let tree = sample_tree();
        assert_eq!(task(&tree, &IndexPath::task(0, 0, 0)).unwrap().name, "Clean fridge");
        assert_eq!(
            task(&tree, &IndexPath::project(0, 0)),
            Err(TreeError::WrongLevel {
                path: IndexPath::project(0, 0),
                expected: Level::Task,
                actual: Level::Project,
            })
        );
        assert_eq!(
            category(&tree, &IndexPath::category(5)),
            Err(TreeError::NotFound(IndexPath::category(5)))
        );
    }

    #[test]
    fn test_find_by_id() {
        let tree = sample_tree();
        let (path, node) = find_by_id(&tree, "s2").unwrap();
        assert_eq!(path, IndexPath::subtask(0, 0, 1, 1));
        assert_eq!(node.level(), Level::Subtask);
        assert!(find_by_id(&tree, "nope").is_none());
    }

    #[test]
    fn test_locate_positional_only_for_unidentified_nodes() {
        let tree = sample_tree();
        // "Work" has no id, so its position is its identity
        assert_eq!(
            locate(&tree, &NodeKey::parse_loose("1")),
            Some(IndexPath::category(1))
        );
        // "Household" has an id; its position is not a valid key for it
        assert_eq!(locate(&tree, &NodeKey::parse_loose("0")), None);
        assert_eq!(
            locate(&tree, &NodeKey::StableId("t2".into())),
            Some(IndexPath::task(0, 0, 1))
        );
    }

    // --- Insert / remove ---

    #[test]
    fn test_add_each_level() {
        let mut tree = sample_tree();
        let cat = add_node(&mut tree, None, "Errands", InsertPosition::Bottom).unwrap();
        assert_eq!(cat, IndexPath::category(2));
        let proj = add_node(&mut tree, Some(&cat), "Groceries", InsertPosition::Bottom).unwrap();
        assert_eq!(proj, IndexPath::project(2, 0));
        let t = add_node(&mut tree, Some(&proj), "Milk", InsertPosition::Bottom).unwrap();
        let s = add_node(&mut tree, Some(&t), "Check fridge first", InsertPosition::Top).unwrap();
        assert_eq!(s, IndexPath::subtask(2, 0, 0, 0));
        assert_eq!(subtask(&tree, &s).unwrap().name, "Check fridge first");
    }

    #[test]
    fn test_new_nodes_have_no_id() {
        let mut tree = sample_tree();
        let path = add_node(
            &mut tree,
            Some(&IndexPath::project(0, 0)),
            "Mop floor",
            InsertPosition::Bottom,
        )
        .unwrap();
        assert_eq!(task(&tree, &path).unwrap().id, None);
    }

    #[test]
    fn test_add_below_subtask_fails() {
        let mut tree = sample_tree();
        let result = add_node(
            &mut tree,
            Some(&IndexPath::subtask(0, 0, 1, 0)),
            "Too deep",
            InsertPosition::Bottom,
        );
        assert_eq!(result, Err(TreeError::MaxDepthReached));
    }

    #[test]
    fn test_add_rejects_empty_name() {
        let mut tree = sample_tree();
        assert_eq!(
            add_node(&mut tree, None, "   ", InsertPosition::Bottom),
            Err(TreeError::EmptyName)
        );
        assert_eq!(tree.categories.len(), 2);
    }

    #[test]
    fn test_add_rejects_duplicate_category() {
        let mut tree = sample_tree();
        assert_eq!(
            add_node(&mut tree, None, " Work ", InsertPosition::Top),
            Err(TreeError::DuplicateCategory("Work".into()))
        );
        assert_eq!(tree.categories.len(), 2);
        // Same-named projects in different categories are fine
        add_node(&mut tree, Some(&IndexPath::category(1)), "Kitchen", InsertPosition::Bottom).unwrap();
    }

    #[test]
    fn test_add_at_index() {
        let mut tree = sample_tree();
        let path = add_node(
            &mut tree,
            Some(&IndexPath::project(0, 0)),
            "Wipe counters",
            InsertPosition::At(1),
        )
        .unwrap();
        assert_eq!(path, IndexPath::task(0, 0, 1));
        let names: Vec<&str> = tree.categories[0].projects[0]
            .tasks
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["Clean fridge", "Wipe counters", "Dishes"]);

        let err = add_node(&mut tree, None, "Late", InsertPosition::At(9));
        assert!(matches!(err, Err(TreeError::InvalidPosition(_))));
    }

    #[test]
    fn test_manual_subtask_keeps_parent_flag() {
        let mut tree = sample_tree();
        let t = IndexPath::task(0, 0, 0);
        set_needs_breakdown(&mut tree, &t, true).unwrap();
        add_node(&mut tree, Some(&t), "Toss old food", InsertPosition::Bottom).unwrap();
        let fridge = task(&tree, &t).unwrap();
        assert_eq!(fridge.needs_breakdown, Some(true));
        // ...but it no longer counts once the task has children
        assert!(!fridge.effective_needs_breakdown());
    }

    #[test]
    fn test_remove_cascades() {
        let mut tree = sample_tree();
        let before = tree.node_count();
        let name = remove_node(&mut tree, &IndexPath::task(0, 0, 1)).unwrap();
        assert_eq!(name, "Dishes");
        assert_eq!(tree.node_count(), before - 3);
        assert!(find_by_id(&tree, "s1").is_none());

        remove_node(&mut tree, &IndexPath::category(0)).unwrap();
        assert_eq!(tree.categories.len(), 1);
        assert_eq!(tree.categories[0].name, "Work");
    }

    #[test]
    fn test_remove_missing() {
        let mut tree = sample_tree();
        assert_eq!(
            remove_node(&mut tree, &IndexPath::subtask(0, 0, 0, 0)),
            Err(TreeError::NotFound(IndexPath::subtask(0, 0, 0, 0)))
        );
    }

    // --- Field edits ---

    #[test]
    fn test_rename_keeps_id() {
        let mut tree = sample_tree();
        let p = IndexPath::project(0, 0);
        rename(&mut tree, &p, "  Kitchen & pantry ").unwrap();
        let proj = project(&tree, &p).unwrap();
        assert_eq!(proj.name, "Kitchen & pantry");
        assert_eq!(proj.id.as_deref(), Some("p1"));
        assert_eq!(rename(&mut tree, &p, ""), Err(TreeError::EmptyName));
    }

    #[test]
    fn test_rename_category_onto_sibling_fails() {
        let mut tree = sample_tree();
        let work = IndexPath::category(1);
        assert_eq!(
            rename(&mut tree, &work, "Household"),
            Err(TreeError::DuplicateCategory("Household".into()))
        );
        assert_eq!(tree.categories[1].name, "Work");
        // Renaming to its own name is a no-op, not a clash
        rename(&mut tree, &work, "Work").unwrap();
    }

    #[test]
    fn test_set_emoji() {
        let mut tree = sample_tree();
        let c = IndexPath::category(1);
        set_emoji(&mut tree, &c, Some("💼".into())).unwrap();
        assert_eq!(category(&tree, &c).unwrap().emoji.as_deref(), Some("💼"));
        set_emoji(&mut tree, &c, Some(" ".into())).unwrap();
        assert_eq!(category(&tree, &c).unwrap().emoji, None);
    }

    #[test]
    fn test_flag_only_tasks_and_subtasks() {
        let mut tree = sample_tree();
        set_needs_breakdown(&mut tree, &IndexPath::subtask(0, 0, 1, 0), true).unwrap();
        assert!(subtask(&tree, &IndexPath::subtask(0, 0, 1, 0)).unwrap().is_flagged());
        assert_eq!(
            set_needs_breakdown(&mut tree, &IndexPath::project(0, 0), true),
            Err(TreeError::NotFlaggable(Level::Project))
        );
    }

    #[test]
    fn test_dependencies() {
        let mut tree = sample_tree();
        let t = IndexPath::task(0, 0, 0);
        let idx = add_dependency(&mut tree, &t, "Defrost").unwrap();
        assert_eq!(idx, 0);
        edit_dependency(&mut tree, &t, 0, "Defrost freezer").unwrap();
        assert_eq!(task(&tree, &t).unwrap().dependencies, vec!["Defrost freezer"]);
        assert_eq!(remove_dependency(&mut tree, &t, 0).unwrap(), "Defrost freezer");
        assert_eq!(
            remove_dependency(&mut tree, &t, 0),
            Err(TreeError::NoSuchDependency { path: t.clone(), index: 0 })
        );
        assert_eq!(
            add_dependency(&mut tree, &IndexPath::category(0), "x"),
            Err(TreeError::NoDependencies(Level::Category))
        );
    }

    #[test]
    fn test_for_each_node_document_order() {
        let tree = sample_tree();
        let mut seen = Vec::new();
        for_each_node(&tree, &mut |path, _| seen.push(path.to_string()));
        assert_eq!(
            seen,
            vec!["0", "0.0", "0.0.0", "0.0.1", "0.0.1.0", "0.0.1.1", "1"]
        );
    }
}
