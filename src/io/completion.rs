use crate::io::store::{get_json, set_json, KvStore, StoreError};
use crate::model::tree::TaskTree;
use crate::ops::cascade::{self, CompletionState};

/// Store key for a saved tree's completion map
pub fn completion_key(tree_id: u64) -> String {
    format!("taskTreeCompletion_{}", tree_id)
}

/// Completion state persisted per saved tree, independent of the tree blob.
///
/// Keys are node ids (or positional paths for unidentified nodes). Keys that
/// no longer match anything in the tree are kept and ignored.
pub struct CompletionStore<'a, S: KvStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: KvStore + ?Sized> CompletionStore<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        CompletionStore { store }
    }

    /// The state for `tree_id`; empty if nothing was ever checked
    pub fn get(&self, tree_id: u64) -> Result<CompletionState, StoreError> {
        Ok(get_json(&*self.store, &completion_key(tree_id))?.unwrap_or_default())
    }

    /// Set one key without touching descendants
    pub fn set(&mut self, tree_id: u64, key: &str, checked: bool) -> Result<(), StoreError> {
        let mut state = self.get(tree_id)?;
        cascade::set_completion(&mut state, key, checked);
        self.put(tree_id, &state)
    }

    /// Set `key` and every key beneath it in `tree`. Returns the keys written.
    pub fn set_cascading(
        &mut self,
        tree_id: u64,
        tree: &TaskTree,
        key: &str,
        checked: bool,
    ) -> Result<Vec<String>, StoreError> {
        let mut state = self.get(tree_id)?;
        let written = cascade::apply_completion(&mut state, tree, key, checked);
        self.put(tree_id, &state)?;
        Ok(written)
    }

    /// Overwrite the whole map for `tree_id`
    pub fn replace(&mut self, tree_id: u64, state: &CompletionState) -> Result<(), StoreError> {
        self.put(tree_id, state)
    }

    /// Drop all completion state for `tree_id`
    pub fn discard(&mut self, tree_id: u64) -> Result<(), StoreError> {
        self.store.remove(&completion_key(tree_id))
    }

    pub fn resolve_descendants(&self, tree: &TaskTree, key: &str) -> Vec<String> {
        cascade::resolve_descendants(tree, key)
    }

    fn put(&mut self, tree_id: u64, state: &CompletionState) -> Result<(), StoreError> {
        set_json(&mut *self.store, &completion_key(tree_id), state)
    }
}
