use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tree::TaskTree;

/// Id of the one saved tree. Only a single tree persists at a time.
pub const SAVED_TREE_ID: u64 = 1;

/// Where the current tree came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Fresh from a brain dump
    Initial,
    /// After one or more refine rounds
    Refined,
    /// Loaded from the saved tree (never returned by the backend)
    Loaded,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Initial => write!(f, "initial"),
            Stage::Refined => write!(f, "refined"),
            Stage::Loaded => write!(f, "loaded"),
        }
    }
}

/// The persisted `savedTaskTree` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTree {
    pub id: u64,
    pub task_tree: TaskTree,
    /// RFC 3339 save time
    pub timestamp: DateTime<Utc>,
    /// Human-readable local save time
    pub created_at: String,
}

/// The current, possibly unsaved, tree carried between CLI invocations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub task_tree: TaskTree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}
