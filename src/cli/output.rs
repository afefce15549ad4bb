use serde::Serialize;

use crate::model::saved::{SavedTree, Stage};
use crate::model::todo::{TodoKind, TodoList};
use crate::model::tree::{NodeRef, TaskTree};
use crate::ops::cascade::{is_completed, CompletionState};
use crate::ops::check::CheckResult;
use crate::ops::merge::MergeReport;
use crate::ops::todo_ops::TodoLine;
use crate::ops::tree_ops::for_each_node;
use crate::session::Outcome;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct OutcomeJson<'a> {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeJson>,
    pub check: &'a CheckResult,
}

#[derive(Serialize)]
pub struct MergeJson {
    pub replaced: Vec<String>,
    pub unmatched: Vec<String>,
    pub ambiguous: Vec<String>,
}

#[derive(Serialize)]
pub struct SavedViewJson<'a> {
    pub created_at: &'a str,
    pub timestamp: String,
    pub task_tree: &'a TaskTree,
    pub completion: &'a CompletionState,
}

#[derive(Serialize)]
pub struct TodoListSummaryJson<'a> {
    pub id: i64,
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: TodoKind,
    pub items: usize,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct TodoLineJson<'a> {
    pub depth: usize,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<&'a str>,
    pub checked: bool,
}

#[derive(Serialize)]
pub struct CompletedJson<'a> {
    pub checked: bool,
    pub keys: &'a [String],
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn outcome_to_json(outcome: &Outcome) -> OutcomeJson<'_> {
    OutcomeJson {
        stage: outcome.stage,
        merge: outcome.merge.as_ref().map(merge_to_json),
        check: &outcome.check,
    }
}

pub fn merge_to_json(report: &MergeReport) -> MergeJson {
    MergeJson {
        replaced: report.replaced.iter().map(|p| p.to_string()).collect(),
        unmatched: report.unmatched.clone(),
        ambiguous: report.ambiguous.iter().map(|p| p.to_string()).collect(),
    }
}

pub fn saved_to_json<'a>(saved: &'a SavedTree, state: &'a CompletionState) -> SavedViewJson<'a> {
    SavedViewJson {
        created_at: &saved.created_at,
        timestamp: saved.timestamp.to_rfc3339(),
        task_tree: &saved.task_tree,
        completion: state,
    }
}

pub fn todo_summary_to_json(list: &TodoList) -> TodoListSummaryJson<'_> {
    TodoListSummaryJson {
        id: list.id,
        name: &list.name,
        kind: list.kind,
        items: list.items.len(),
        created_at: list.created_at.to_rfc3339(),
    }
}

pub fn todo_line_to_json(line: &TodoLine) -> TodoLineJson<'_> {
    TodoLineJson {
        depth: line.depth,
        text: &line.text,
        key: line.key.as_deref(),
        checked: line.checked,
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// Options for the annotated tree listing
#[derive(Default)]
pub struct TreeListing<'a> {
    /// Append each node's path
    pub paths: bool,
    /// Prefix each node with a completion box
    pub completion: Option<&'a CompletionState>,
}

/// One line per node: indentation, optional completion box, glyph, emoji,
/// name, optional path, and a marker for nodes flagged for breakdown.
pub fn tree_lines(tree: &TaskTree, opts: &TreeListing<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    for_each_node(tree, &mut |path, node| {
        let level = node.level();
        let mut line = "  ".repeat(level.depth());
        if let Some(state) = opts.completion {
            let key = node
                .id()
                .map(str::to_string)
                .unwrap_or_else(|| path.to_string());
            line.push_str(if is_completed(state, &key) { "[x] " } else { "[ ] " });
        }
        line.push_str(level.glyph());
        line.push(' ');
        if let Some(emoji) = node.emoji() {
            line.push_str(emoji);
            line.push(' ');
        }
        line.push_str(node.name());
        if flagged(node) {
            line.push_str(" (breakdown)");
        }
        if opts.paths {
            line.push_str(&format!("  [{}]", path));
        }
        lines.push(line);
    });
    lines
}

fn flagged(node: NodeRef<'_>) -> bool {
    match node {
        NodeRef::Task(t) => t.is_leaf() && t.is_flagged(),
        NodeRef::Subtask(s) => s.is_flagged(),
        NodeRef::Category(_) | NodeRef::Project(_) => false,
    }
}

pub fn print_check(result: &CheckResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for err in &result.errors {
            println!("  {}", err);
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            println!();
        }
        println!("Warnings:");
        for warn in &result.warnings {
            println!("  {}", warn);
        }
    }
}

pub fn print_merge_report(report: &MergeReport) {
    println!("Merged {} refined task(s)", report.replaced.len());
    for name in &report.unmatched {
        eprintln!("warning: no match for {} in the current tree; skipped", name);
    }
    for path in &report.ambiguous {
        eprintln!(
            "warning: {} shares its name with a sibling; only the first was updated",
            path
        );
    }
}

pub fn todo_line_text(line: &TodoLine) -> String {
    let indent = "  ".repeat(line.depth);
    match (&line.key, line.checked) {
        (Some(_), true) => format!("{}[x] {}", indent, line.text),
        (Some(_), false) => format!("{}[ ] {}", indent, line.text),
        (None, _) => format!("{}{}", indent, line.text),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_tree;

    fn sample() -> TaskTree {
        parse_tree(
            r#"{"categories":[{"id":"c1","name":"Home","emoji":"🏠","projects":[
                {"name":"Garden","tasks":[
                    {"id":"t1","name":"Weed","needsBreakdown":true,"subtasks":[]},
                    {"name":"Mow","needsBreakdown":true,"subtasks":[{"name":"Fuel"}]}
                ]}
            ]}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_tree_lines_plain() {
        let lines = tree_lines(&sample(), &TreeListing::default());
        insta::assert_snapshot!(lines.join("\n"), @r"
        📁 🏠 Home
          📋 Garden
            ✓ Weed (breakdown)
            ✓ Mow
              • Fuel
        ");
    }

    #[test]
    fn test_tree_lines_with_paths_and_completion() {
        let mut state = CompletionState::new();
        state.insert("c1".into(), true);
        state.insert("0.0".into(), true);
        let lines = tree_lines(
            &sample(),
            &TreeListing {
                paths: true,
                completion: Some(&state),
            },
        );
        insta::assert_snapshot!(lines.join("\n"), @r"
        [x] 📁 🏠 Home  [0]
          [x] 📋 Garden  [0.0]
            [ ] ✓ Weed (breakdown)  [0.0.0]
            [ ] ✓ Mow  [0.0.1]
              [ ] • Fuel  [0.0.1.0]
        ");
    }

    #[test]
    fn test_todo_line_text() {
        let line = TodoLine {
            depth: 2,
            text: "🧹 Sweep".into(),
            bold: false,
            key: Some("t-1".into()),
            checked: true,
        };
        assert_eq!(todo_line_text(&line), "    [x] 🧹 Sweep");
        let plain = TodoLine {
            depth: 0,
            text: "Group 1: Chores".into(),
            bold: true,
            key: None,
            checked: false,
        };
        assert_eq!(todo_line_text(&plain), "Group 1: Chores");
    }
}
