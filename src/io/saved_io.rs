use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::io::completion::CompletionStore;
use crate::io::store::{get_json, set_json, KvStore, StoreError};
use crate::model::saved::{SavedTree, SessionDraft, SAVED_TREE_ID};
use crate::model::todo::TodoList;
use crate::model::tree::TaskTree;
use crate::ops::cascade::migrate_completion;
use crate::parse::tree_json::{tree_from_value, TreeJsonError};

pub const SAVED_TREE_KEY: &str = "savedTaskTree";
pub const TODO_LISTS_KEY: &str = "savedToDoLists";
pub const SESSION_DRAFT_KEY: &str = "sessionDraft";

#[derive(Debug, thiserror::Error)]
pub enum SavedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("saved task tree is invalid: {source}")]
    InvalidTree {
        source: TreeJsonError,
        /// The stored record, for the recovery log
        raw: String,
    },
    #[error("no saved task tree")]
    NothingSaved,
}

/// Human-readable local time, in the style of a US-locale date string
pub fn local_display(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}

// ---------------------------------------------------------------------------
// Saved tree
// ---------------------------------------------------------------------------

/// Overwrite the one saved tree with `tree`.
///
/// Progress recorded against the previous saved tree is migrated: positional
/// keys that no longer point at the same node are dropped (all of them if the
/// previous tree cannot be read). Returns the new record and the dropped keys.
pub fn save_tree<S: KvStore + ?Sized>(
    store: &mut S,
    tree: &TaskTree,
    now: DateTime<Utc>,
) -> Result<(SavedTree, Vec<String>), SavedError> {
    let previous = match load_saved(store) {
        Ok(prev) => prev.map(|saved| saved.task_tree),
        Err(SavedError::InvalidTree { .. }) => None,
        Err(e) => return Err(e),
    };

    let mut completion = CompletionStore::new(&mut *store);
    let mut state = completion.get(SAVED_TREE_ID)?;
    let dropped = match &previous {
        Some(old) => migrate_completion(&mut state, old, tree),
        None => {
            let all = state.keys().cloned().collect();
            state.clear();
            all
        }
    };
    if !dropped.is_empty() {
        if state.is_empty() {
            completion.discard(SAVED_TREE_ID)?;
        } else {
            completion.replace(SAVED_TREE_ID, &state)?;
        }
    }

    let record = SavedTree {
        id: SAVED_TREE_ID,
        task_tree: tree.clone(),
        timestamp: now,
        created_at: local_display(now),
    };
    set_json(store, SAVED_TREE_KEY, &record)?;
    Ok((record, dropped))
}

/// Stored shape, tolerant of older records: the tree may be nested under
/// extra `task_tree` keys and the timestamps may be missing.
#[derive(Deserialize)]
struct StoredRecord {
    #[serde(default = "default_saved_id")]
    id: u64,
    task_tree: Value,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<String>,
}

fn default_saved_id() -> u64 {
    SAVED_TREE_ID
}

/// Read the saved tree, `None` if nothing has been saved.
pub fn load_saved<S: KvStore + ?Sized>(store: &S) -> Result<Option<SavedTree>, SavedError> {
    let Some(raw) = store.get(SAVED_TREE_KEY)? else {
        return Ok(None);
    };
    let invalid = |source: TreeJsonError| SavedError::InvalidTree {
        source,
        raw: raw.clone(),
    };

    let record: StoredRecord = serde_json::from_str(&raw).map_err(|e| {
        invalid(TreeJsonError::Syntax {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        })
    })?;
    let task_tree = tree_from_value(record.task_tree).map_err(invalid)?;
    let timestamp = record.timestamp.unwrap_or_else(Utc::now);

    Ok(Some(SavedTree {
        id: record.id,
        task_tree,
        timestamp,
        created_at: record.created_at.unwrap_or_else(|| local_display(timestamp)),
    }))
}

pub fn has_saved<S: KvStore + ?Sized>(store: &S) -> Result<bool, SavedError> {
    Ok(store.get(SAVED_TREE_KEY)?.is_some())
}

/// Delete the saved tree together with its completion state and every
/// to-do list derived from it.
pub fn delete_saved<S: KvStore + ?Sized>(store: &mut S) -> Result<(), SavedError> {
    if !has_saved(store)? {
        return Err(SavedError::NothingSaved);
    }
    store.remove(SAVED_TREE_KEY)?;
    CompletionStore::new(&mut *store).discard(SAVED_TREE_ID)?;
    store.remove(TODO_LISTS_KEY)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// To-do lists
// ---------------------------------------------------------------------------

pub fn load_todo_lists<S: KvStore + ?Sized>(store: &S) -> Result<Vec<TodoList>, SavedError> {
    Ok(get_json(store, TODO_LISTS_KEY)?.unwrap_or_default())
}

/// Append a list. If its id collides with an existing list (two lists in
/// the same millisecond) it is bumped until unique. Returns the final id.
pub fn add_todo_list<S: KvStore + ?Sized>(
    store: &mut S,
    mut list: TodoList,
) -> Result<i64, SavedError> {
    let mut lists = load_todo_lists(store)?;
    while lists.iter().any(|l| l.id == list.id) {
        list.id += 1;
    }
    let id = list.id;
    lists.push(list);
    set_json(store, TODO_LISTS_KEY, &lists)?;
    Ok(id)
}

/// Remove a list by id. Returns whether it existed.
pub fn delete_todo_list<S: KvStore + ?Sized>(store: &mut S, id: i64) -> Result<bool, SavedError> {
    let mut lists = load_todo_lists(store)?;
    let before = lists.len();
    lists.retain(|l| l.id != id);
    if lists.len() == before {
        return Ok(false);
    }
    set_json(store, TODO_LISTS_KEY, &lists)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Session draft
// ---------------------------------------------------------------------------

pub fn load_draft<S: KvStore + ?Sized>(store: &S) -> Result<Option<SessionDraft>, SavedError> {
    Ok(get_json(store, SESSION_DRAFT_KEY)?)
}

pub fn save_draft<S: KvStore + ?Sized>(store: &mut S, draft: &SessionDraft) -> Result<(), SavedError> {
    set_json(store, SESSION_DRAFT_KEY, draft)?;
    Ok(())
}

pub fn clear_draft<S: KvStore + ?Sized>(store: &mut S) -> Result<(), SavedError> {
    store.remove(SESSION_DRAFT_KEY)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;
    use crate::model::saved::Stage;
    use crate::model::todo::{TodoEntry, TodoKind};
    use crate::model::tree::Category;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, 30, 0).unwrap()
    }

    fn tree(name: &str) -> TaskTree {
        TaskTree {
            categories: vec![Category::new(name)],
        }
    }

    fn list(id: i64, name: &str) -> TodoList {
        TodoList {
            id,
            name: name.into(),
            items: vec![TodoEntry::Plain("x".into())],
            created_at: now(),
            kind: TodoKind::Ai,
            prompt: None,
        }
    }

    #[test]
    fn test_save_and_load() {
        let mut store = MemoryStore::new();
        assert!(load_saved(&store).unwrap().is_none());

        let (saved, dropped) = save_tree(&mut store, &tree("Home"), now()).unwrap();
        assert_eq!(saved.id, 1);
        assert!(dropped.is_empty());

        let loaded = load_saved(&store).unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_save_overwrites() {
        let mut store = MemoryStore::new();
        save_tree(&mut store, &tree("First"), now()).unwrap();
        save_tree(&mut store, &tree("Second"), now()).unwrap();
        let loaded = load_saved(&store).unwrap().unwrap();
        assert_eq!(loaded.task_tree.categories[0].name, "Second");
    }

    #[test]
    fn test_replacing_save_migrates_progress() {
        let mut store = MemoryStore::new();
        save_tree(&mut store, &tree("Home"), now()).unwrap();
        let home = load_saved(&store).unwrap().unwrap().task_tree;
        CompletionStore::new(&mut store)
            .set_cascading(SAVED_TREE_ID, &home, "0", true)
            .unwrap();
        CompletionStore::new(&mut store).set(SAVED_TREE_ID, "c-7", true).unwrap();

        // Same tree again: everything still points where it did
        let (_, dropped) = save_tree(&mut store, &tree("Home"), now()).unwrap();
        assert!(dropped.is_empty());

        // A different tree at the same position must not inherit the mark
        let (_, dropped) = save_tree(&mut store, &tree("Fresh"), now()).unwrap();
        assert_eq!(dropped, vec!["0"]);
        let state = CompletionStore::new(&mut store).get(SAVED_TREE_ID).unwrap();
        assert_eq!(state.keys().collect::<Vec<_>>(), vec!["c-7"]);
    }

    #[test]
    fn test_save_over_unreadable_tree_discards_progress() {
        let mut store = MemoryStore::new();
        store.set(SAVED_TREE_KEY, "{broken").unwrap();
        CompletionStore::new(&mut store).set(SAVED_TREE_ID, "0", true).unwrap();

        let (_, dropped) = save_tree(&mut store, &tree("Home"), now()).unwrap();
        assert_eq!(dropped, vec!["0"]);
        assert!(store.get("taskTreeCompletion_1").unwrap().is_none());
    }

    #[test]
    fn test_record_field_names() {
        let mut store = MemoryStore::new();
        save_tree(&mut store, &tree("Home"), now()).unwrap();
        let v: Value = serde_json::from_str(&store.get(SAVED_TREE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(v["id"], 1);
        assert_eq!(v["timestamp"], "2025-05-01T09:30:00Z");
        assert!(v["created_at"].is_string());
        assert_eq!(v["task_tree"]["categories"][0]["name"], "Home");
    }

    #[test]
    fn test_load_unwraps_nested_tree() {
        let mut store = MemoryStore::new();
        store
            .set(
                SAVED_TREE_KEY,
                r#"{"id":1,"task_tree":{"task_tree":{"categories":[{"name":"Deep","projects":[]}]},"stage":"initial"},"timestamp":"2025-01-01T00:00:00Z","created_at":"1/1/2025"}"#,
            )
            .unwrap();
        let loaded = load_saved(&store).unwrap().unwrap();
        assert_eq!(loaded.task_tree.categories[0].name, "Deep");
        assert_eq!(loaded.created_at, "1/1/2025");
    }

    #[test]
    fn test_load_rejects_missing_categories() {
        let mut store = MemoryStore::new();
        store
            .set(SAVED_TREE_KEY, r#"{"id":1,"task_tree":{"stage":"initial"}}"#)
            .unwrap();
        match load_saved(&store) {
            Err(SavedError::InvalidTree {
                source: TreeJsonError::MissingCategories,
                raw,
            }) => assert!(raw.contains("stage")),
            other => panic!("expected invalid tree, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_saved_takes_completion_and_lists() {
        let mut store = MemoryStore::new();
        save_tree(&mut store, &tree("Home"), now()).unwrap();
        CompletionStore::new(&mut store).set(1, "a", true).unwrap();
        add_todo_list(&mut store, list(5, "Today")).unwrap();

        delete_saved(&mut store).unwrap();

        assert!(!has_saved(&store).unwrap());
        assert!(store.get("taskTreeCompletion_1").unwrap().is_none());
        assert!(load_todo_lists(&store).unwrap().is_empty());
        assert!(matches!(delete_saved(&mut store), Err(SavedError::NothingSaved)));
    }

    #[test]
    fn test_todo_list_ids_stay_unique() {
        let mut store = MemoryStore::new();
        assert_eq!(add_todo_list(&mut store, list(100, "A")).unwrap(), 100);
        assert_eq!(add_todo_list(&mut store, list(100, "B")).unwrap(), 101);
        assert_eq!(add_todo_list(&mut store, list(100, "C")).unwrap(), 102);
        let names: Vec<String> = load_todo_lists(&store)
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_delete_todo_list() {
        let mut store = MemoryStore::new();
        add_todo_list(&mut store, list(1, "A")).unwrap();
        add_todo_list(&mut store, list(2, "B")).unwrap();
        assert!(delete_todo_list(&mut store, 1).unwrap());
        assert!(!delete_todo_list(&mut store, 1).unwrap());
        assert_eq!(load_todo_lists(&store).unwrap().len(), 1);
    }

    #[test]
    fn test_draft_round_trip() {
        let mut store = MemoryStore::new();
        let draft = SessionDraft {
            task_tree: tree("Draft"),
            stage: Some(Stage::Refined),
        };
        save_draft(&mut store, &draft).unwrap();
        assert_eq!(load_draft(&store).unwrap(), Some(draft));
        clear_draft(&mut store).unwrap();
        assert_eq!(load_draft(&store).unwrap(), None);
    }
}
