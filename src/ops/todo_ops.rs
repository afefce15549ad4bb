use chrono::{DateTime, Local, Utc};
use regex::Regex;

use crate::model::identity::IndexPath;
use crate::model::todo::{TodoEntry, TodoKind, TodoList};
use crate::model::tree::TaskTree;
use crate::ops::cascade::{is_completed, selected_items, CompletionState};

#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    #[error("to-do list name must not be empty")]
    EmptyName,
    #[error("select at least one item")]
    NoItems,
    #[error("to-do list not found: {0}")]
    NotFound(i64),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Build a manual list from checked tree paths. Ids are creation millis.
pub fn new_manual_list(
    name: &str,
    tree: &TaskTree,
    paths: &[IndexPath],
    now: DateTime<Utc>,
) -> Result<TodoList, TodoError> {
    let name = clean_list_name(name)?;
    let items: Vec<TodoEntry> = selected_items(tree, paths)
        .into_iter()
        .map(TodoEntry::Item)
        .collect();
    if items.is_empty() {
        return Err(TodoError::NoItems);
    }
    Ok(TodoList {
        id: now.timestamp_millis(),
        name,
        items,
        created_at: now,
        kind: TodoKind::Manual,
        prompt: None,
    })
}

/// Wrap the backend's `todo_items` in a list
pub fn new_ai_list(
    name: &str,
    items: Vec<TodoEntry>,
    prompt: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TodoList, TodoError> {
    let name = clean_list_name(name)?;
    if items.is_empty() {
        return Err(TodoError::NoItems);
    }
    Ok(TodoList {
        id: now.timestamp_millis(),
        name,
        items,
        created_at: now,
        kind: TodoKind::Ai,
        prompt: prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
    })
}

fn clean_list_name(name: &str) -> Result<String, TodoError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TodoError::EmptyName);
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// AI line hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiLineKind {
    Group,
    Task,
    Subtask,
    Plain,
}

/// Detects `Group N:` / `Task:` / `Subtask:` prefixes in AI to-do strings.
pub struct AiLineStyler {
    prefix: Regex,
}

impl AiLineStyler {
    pub fn new() -> Result<Self, TodoError> {
        Ok(AiLineStyler {
            prefix: Regex::new(r"(?i)^(?:(group \d+:)|(subtask:)\s*|(task:)\s*)")?,
        })
    }

    /// Classify a line and rewrite its prefix for display
    pub fn style(&self, line: &str) -> (AiLineKind, String) {
        let Some(caps) = self.prefix.captures(line) else {
            return (AiLineKind::Plain, line.to_string());
        };
        let rest = &line[caps.get(0).map_or(0, |m| m.end())..];
        if caps.get(1).is_some() {
            (AiLineKind::Group, line.to_string())
        } else if caps.get(2).is_some() {
            (AiLineKind::Subtask, format!("• {}", rest))
        } else {
            (AiLineKind::Task, format!("✓ {}", rest))
        }
    }
}

// ---------------------------------------------------------------------------
// Viewing
// ---------------------------------------------------------------------------

/// One rendered line of a to-do list view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoLine {
    pub depth: usize,
    pub text: String,
    pub bold: bool,
    /// Completion key for tree-linked items; `None` when the line cannot be
    /// checked off
    pub key: Option<String>,
    pub checked: bool,
}

/// Resolve every entry of `list` against the completion state.
pub fn view_lines(list: &TodoList, state: &CompletionState, styler: &AiLineStyler) -> Vec<TodoLine> {
    list.items
        .iter()
        .map(|entry| match entry {
            TodoEntry::Plain(text) => {
                let (kind, text) = styler.style(text);
                TodoLine {
                    depth: match kind {
                        AiLineKind::Task | AiLineKind::Subtask => 1,
                        AiLineKind::Group | AiLineKind::Plain => 0,
                    },
                    text,
                    bold: kind == AiLineKind::Group,
                    key: None,
                    checked: false,
                }
            }
            TodoEntry::Item(item) => {
                let key = item.completion_key();
                let checked = key.as_deref().is_some_and(|k| is_completed(state, k));
                TodoLine {
                    depth: item.level as usize,
                    text: format!("{} {}", item.emoji, item.name),
                    bold: false,
                    key,
                    checked,
                }
            }
        })
        .collect()
}

pub fn find_list(lists: &[TodoList], id: i64) -> Result<&TodoList, TodoError> {
    lists
        .iter()
        .find(|l| l.id == id)
        .ok_or(TodoError::NotFound(id))
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Plain-text export: header, blank line, one `☐` line per item.
pub fn export_text(list: &TodoList) -> String {
    let mut out = String::new();
    out.push_str(&list.name);
    out.push('\n');
    out.push_str(&format!(
        "Created: {}\n",
        list.created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("Type: {}\n", list.kind));
    if let Some(prompt) = &list.prompt {
        out.push_str(&format!("Prompt: {}\n", prompt));
    }
    out.push('\n');
    for entry in &list.items {
        match entry {
            TodoEntry::Plain(text) => out.push_str(&format!("☐ {}\n", text)),
            TodoEntry::Item(item) => out.push_str(&format!(
                "{}☐ {} {}\n",
                "  ".repeat(item.level as usize),
                item.emoji,
                item.name
            )),
        }
    }
    out
}

/// `todo-<name-with-dashes>-<millis>.txt`
pub fn export_file_name(list: &TodoList, now: DateTime<Utc>) -> String {
    let slug = list.name.split_whitespace().collect::<Vec<_>>().join("-");
    format!("todo-{}-{}.txt", slug, now.timestamp_millis())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
