use std::path::PathBuf;

use chrono::Utc;
use indexmap::IndexSet;

use super::{parse_path, print_json, CmdResult, Context};
use crate::cli::commands::*;
use crate::cli::output::{todo_line_text, todo_line_to_json, todo_summary_to_json};
use crate::io::completion::CompletionStore;
use crate::io::recovery::atomic_write;
use crate::io::saved_io;
use crate::model::identity::IndexPath;
use crate::model::saved::SAVED_TREE_ID;
use crate::ops::cascade::cascade_selection;
use crate::ops::todo_ops::{self, AiLineStyler};
use crate::ops::tree_ops::{node_at, TreeError};

pub fn cmd_todo(args: TodoCmd, json: bool) -> CmdResult {
    match args.action.unwrap_or(TodoAction::List) {
        TodoAction::List => cmd_todo_list(json),
        TodoAction::New(a) => cmd_todo_new(a, json),
        TodoAction::Ai(a) => cmd_todo_ai(a, json),
        TodoAction::Show(a) => cmd_todo_show(a, json),
        TodoAction::Export(a) => cmd_todo_export(a),
        TodoAction::Rm(a) => cmd_todo_rm(a),
    }
}

fn cmd_todo_list(json: bool) -> CmdResult {
    let ctx = Context::open()?;
    let lists = saved_io::load_todo_lists(&ctx.store).map_err(|e| ctx.saved_error(e))?;

    if json {
        let out: Vec<_> = lists.iter().map(todo_summary_to_json).collect();
        return print_json(&out);
    }
    if lists.is_empty() {
        println!("No to-do lists");
        return Ok(());
    }
    for list in &lists {
        println!(
            "{}  {} ({}, {} item{})",
            list.id,
            list.name,
            list.kind,
            list.items.len(),
            if list.items.len() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

fn cmd_todo_new(args: TodoNewArgs, json: bool) -> CmdResult {
    let mut ctx = Context::open()?;
    let saved = ctx.require_saved()?;
    let tree = &saved.task_tree;

    let mut selection: IndexSet<IndexPath> = IndexSet::new();
    for raw in &args.paths {
        let path = parse_path(raw)?;
        if node_at(tree, &path).is_none() {
            return Err(TreeError::NotFound(path).into());
        }
        cascade_selection(&mut selection, tree, &path, true);
    }
    // Document order, whatever order the paths were given in
    let mut paths: Vec<IndexPath> = selection.into_iter().collect();
    paths.sort();

    let list = todo_ops::new_manual_list(&args.name, tree, &paths, Utc::now())?;
    let count = list.items.len();
    let id = saved_io::add_todo_list(&mut ctx.store, list)?;

    if json {
        return print_json(&serde_json::json!({ "id": id, "items": count }));
    }
    println!("Created to-do list {} with {} item(s)", id, count);
    Ok(())
}

fn cmd_todo_ai(args: TodoAiArgs, json: bool) -> CmdResult {
    let mut ctx = Context::open()?;
    let session = ctx.session()?;
    let backend = ctx.backend()?;

    let items = session.generate_ai_todo(&backend, args.prompt.as_deref())?;
    let list = todo_ops::new_ai_list(&args.name, items, args.prompt.as_deref(), Utc::now())?;
    let count = list.items.len();
    let id = saved_io::add_todo_list(&mut ctx.store, list)?;

    if json {
        return print_json(&serde_json::json!({ "id": id, "items": count }));
    }
    println!("Created to-do list {} with {} item(s)", id, count);
    Ok(())
}

fn cmd_todo_show(args: TodoIdArg, json: bool) -> CmdResult {
    let mut ctx = Context::open()?;
    let lists = saved_io::load_todo_lists(&ctx.store).map_err(|e| ctx.saved_error(e))?;
    let list = todo_ops::find_list(&lists, args.id)?;
    let state = CompletionStore::new(&mut ctx.store)
        .get(SAVED_TREE_ID)
        .map_err(|e| super::store_error(&ctx.ws, e))?;
    let styler = AiLineStyler::new()?;
    let lines = todo_ops::view_lines(list, &state, &styler);

    if json {
        let out: Vec<_> = lines.iter().map(todo_line_to_json).collect();
        return print_json(&out);
    }
    println!("{} ({})", list.name, list.kind);
    if let Some(prompt) = &list.prompt {
        println!("Prompt: {}", prompt);
    }
    println!();
    for line in &lines {
        println!("{}", todo_line_text(line));
    }
    Ok(())
}

fn cmd_todo_export(args: TodoExportArgs) -> CmdResult {
    let ctx = Context::open()?;
    let lists = saved_io::load_todo_lists(&ctx.store).map_err(|e| ctx.saved_error(e))?;
    let list = todo_ops::find_list(&lists, args.id)?;
    let text = todo_ops::export_text(list);

    let target = match args.output {
        Some(path) => PathBuf::from(path),
        None => {
            let cwd = std::env::current_dir()?;
            let dir = ctx.ws.export_dir(&cwd);
            std::fs::create_dir_all(&dir)?;
            dir.join(todo_ops::export_file_name(list, Utc::now()))
        }
    };
    atomic_write(&target, text.as_bytes())
        .map_err(|e| format!("could not write {}: {}", target.display(), e))?;
    println!("Exported to {}", target.display());
    Ok(())
}

fn cmd_todo_rm(args: TodoIdArg) -> CmdResult {
    let mut ctx = Context::open()?;
    if !saved_io::delete_todo_list(&mut ctx.store, args.id)? {
        return Err(todo_ops::TodoError::NotFound(args.id).into());
    }
    println!("Deleted to-do list {}", args.id);
    Ok(())
}
