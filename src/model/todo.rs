use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::IndexPath;
use super::tree::Level;

/// How a to-do list was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoKind {
    /// Hand-picked from the tree; items link back to tree nodes
    Manual,
    /// Generated by the backend; plain strings with no tree linkage
    Ai,
}

impl std::fmt::Display for TodoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TodoKind::Manual => write!(f, "manual"),
            TodoKind::Ai => write!(f, "ai"),
        }
    }
}

/// A reference to a tree node captured when a manual list was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItemRef {
    #[serde(rename = "type")]
    pub kind: Level,
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    /// 0 = category … 3 = subtask
    pub level: u8,
    /// Name of the parent node (absent for categories)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<IndexPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl TodoItemRef {
    /// Completion-store key: the node id, falling back to its path
    pub fn completion_key(&self) -> Option<String> {
        self.id
            .clone()
            .or_else(|| self.path.as_ref().map(|p| p.to_string()))
    }
}

/// One line of a to-do list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TodoEntry {
    Plain(String),
    Item(TodoItemRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    pub id: i64,
    pub name: String,
    pub items: Vec<TodoEntry>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TodoKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}
