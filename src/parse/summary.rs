use crate::model::tree::{Level, TaskTree};
use crate::parse::tree_json::{serialize_tree, TreeJsonError};

const EXPORT_TITLE: &str = "AI Planning Assistant - Task Tree";

/// Render the read-only text summary of a tree.
///
/// Each level is indented two spaces deeper than its parent and marked with
/// its glyph. Dependencies follow their node, indented three spaces past it.
/// Every category is followed by a blank line.
pub fn format_tree(tree: &TaskTree) -> String {
    let mut lines: Vec<String> = Vec::new();

    for cat in &tree.categories {
        lines.push(node_line(Level::Category, &cat.name));
        for proj in &cat.projects {
            lines.push(node_line(Level::Project, &proj.name));
            push_deps(&mut lines, Level::Project, &proj.dependencies);
            for task in &proj.tasks {
                lines.push(node_line(Level::Task, &task.name));
                push_deps(&mut lines, Level::Task, &task.dependencies);
                for sub in &task.subtasks {
                    lines.push(node_line(Level::Subtask, &sub.name));
                    push_deps(&mut lines, Level::Subtask, &sub.dependencies);
                }
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn node_line(level: Level, name: &str) -> String {
    format!("{}{} {}", indent(level), level.glyph(), name)
}

fn push_deps(lines: &mut Vec<String>, level: Level, deps: &[String]) {
    if !deps.is_empty() {
        lines.push(format!(
            "{}   Dependencies: {}",
            indent(level),
            deps.join(", ")
        ));
    }
}

fn indent(level: Level) -> String {
    "  ".repeat(level.depth())
}

/// Timestamps appended to an export
pub enum ExportStamp<'a> {
    /// Exporting the working tree
    Generated { at: &'a str },
    /// Exporting the saved tree
    Saved { saved_at: &'a str, exported_at: &'a str },
}

/// Full text export: title, rule, summary, JSON form, timestamps.
pub fn export_tree_text(tree: &TaskTree, stamp: ExportStamp<'_>) -> Result<String, TreeJsonError> {
    let json = serialize_tree(tree)?;
    let mut out = format!(
        "{}\n{}\n\n{}\n\nJSON Format:\n{}\n\n",
        EXPORT_TITLE,
        "=".repeat(50),
        format_tree(tree),
        json
    );
    match stamp {
        ExportStamp::Generated { at } => out.push_str(&format!("Generated: {}\n", at)),
        ExportStamp::Saved {
            saved_at,
            exported_at,
        } => out.push_str(&format!("Saved: {}\nExported: {}\n", saved_at, exported_at)),
    }
    Ok(out)
}

/// `task-tree-<millis>.txt`
pub fn export_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("task-tree-{}.txt", now.timestamp_millis())
}
