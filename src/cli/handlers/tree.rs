use std::path::PathBuf;

use chrono::Utc;

use super::{parse_path, print_json, read_input, CmdResult, Context};
use crate::cli::commands::*;
use crate::cli::output::{print_check, tree_lines, TreeListing};
use crate::io::recovery::atomic_write;
use crate::io::saved_io::local_display;
use crate::ops::check::check_tree;
use crate::ops::tree_ops::{self, InsertPosition};
use crate::parse::summary::{export_file_name, export_tree_text, ExportStamp};
use crate::session::SessionError;

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

pub fn cmd_show(args: ShowArgs, json: bool) -> CmdResult {
    let ctx = Context::open()?;
    let session = ctx.session()?;
    let tree = session.require_tree()?;

    if json || args.raw {
        println!("{}", session.json_view());
    } else if args.paths {
        for line in tree_lines(tree, &TreeListing {
            paths: true,
            completion: None,
        }) {
            println!("{}", line);
        }
    } else {
        if let Some(stage) = session.stage() {
            println!("Stage: {}\n", stage);
        }
        println!("{}", session.summary_view().trim_end());
    }
    Ok(())
}

pub fn cmd_check(json: bool) -> CmdResult {
    let ctx = Context::open()?;
    let session = ctx.session()?;
    let result = check_tree(session.require_tree()?);

    if json {
        print_json(&result)?;
    } else if result.errors.is_empty() && result.warnings.is_empty() {
        println!("Tree is valid");
    } else {
        print_check(&result);
    }

    if !result.valid {
        return Err(format!("{} error(s) found", result.errors.len()).into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Structural edits
// ---------------------------------------------------------------------------

pub fn cmd_add(args: AddArgs) -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    if session.tree().is_none() {
        if args.under.is_some() {
            return Err(SessionError::NoTree.into());
        }
        // First category starts a new tree
        session.apply_json(r#"{"categories": []}"#)?;
    }

    let parent = args.under.as_deref().map(parse_path).transpose()?;
    let position = match (args.top, args.at) {
        (true, _) => InsertPosition::Top,
        (false, Some(i)) => InsertPosition::At(i),
        (false, None) => InsertPosition::Bottom,
    };
    let path = session.mutate(|tree| tree_ops::add_node(tree, parent.as_ref(), &args.name, position))?;
    ctx.persist(&session)?;

    println!("Added {} {} at {}", path.level(), args.name.trim(), path);
    Ok(())
}

pub fn cmd_rm(args: PathArg) -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    let path = parse_path(&args.path)?;
    let name = session.mutate(|tree| tree_ops::remove_node(tree, &path))?;
    ctx.persist(&session)?;
    println!("Removed {} {}", path.level(), name);
    Ok(())
}

pub fn cmd_rename(args: RenameArgs) -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    let path = parse_path(&args.path)?;
    session.mutate(|tree| tree_ops::rename(tree, &path, &args.name))?;
    ctx.persist(&session)?;
    println!("{}: {}", path, args.name.trim());
    Ok(())
}

pub fn cmd_emoji(args: EmojiArgs) -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    let path = parse_path(&args.path)?;
    let cleared = args.emoji.as_deref().is_none_or(|e| e.trim().is_empty());
    session.mutate(|tree| tree_ops::set_emoji(tree, &path, args.emoji.clone()))?;
    ctx.persist(&session)?;
    if cleared {
        println!("{}: emoji cleared", path);
    } else {
        println!("{}: emoji set", path);
    }
    Ok(())
}

pub fn cmd_dep(args: DepCmd) -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    match args.action {
        DepAction::Add(a) => {
            let path = parse_path(&a.path)?;
            let idx = session.mutate(|tree| tree_ops::add_dependency(tree, &path, &a.text))?;
            println!("{}: dependency #{} added", path, idx);
        }
        DepAction::Edit(a) => {
            let path = parse_path(&a.path)?;
            session.mutate(|tree| tree_ops::edit_dependency(tree, &path, a.index, &a.text))?;
            println!("{}: dependency #{} updated", path, a.index);
        }
        DepAction::Rm(a) => {
            let path = parse_path(&a.path)?;
            let removed = session.mutate(|tree| tree_ops::remove_dependency(tree, &path, a.index))?;
            println!("{}: removed dependency \"{}\"", path, removed);
        }
    }
    ctx.persist(&session)?;
    Ok(())
}

pub fn cmd_flag(args: FlagArgs) -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    let path = parse_path(&args.path)?;
    let value = !args.off;
    session.mutate(|tree| tree_ops::set_needs_breakdown(tree, &path, value))?;
    ctx.persist(&session)?;

    if value
        && let Ok(task) = tree_ops::task(session.require_tree()?, &path)
        && !task.is_leaf()
    {
        eprintln!(
            "warning: {} has subtasks; flag its subtasks to have them broken down",
            path
        );
    }
    println!(
        "{}: {}",
        path,
        if value { "flagged for breakdown" } else { "unflagged" }
    );
    Ok(())
}

pub fn cmd_flag_all(args: FlagAllArgs) -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    let count = session.set_all_breakdown(!args.off)?;
    ctx.persist(&session)?;
    println!(
        "{} {} node(s)",
        if args.off { "Unflagged" } else { "Flagged" },
        count
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON import / reset
// ---------------------------------------------------------------------------

pub fn cmd_apply(args: ApplyArgs, json: bool) -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    let text = read_input(&args.file)?;
    let result = session.apply_json(&text)?;
    ctx.persist(&session)?;

    if json {
        return print_json(&result);
    }
    let tree = session.require_tree()?;
    println!(
        "Applied tree: {} categor{}, {} node(s)",
        tree.categories.len(),
        if tree.categories.len() == 1 { "y" } else { "ies" },
        tree.node_count()
    );
    for warn in &result.warnings {
        eprintln!("warning: {}", warn);
    }
    Ok(())
}

pub fn cmd_clear() -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    session.clear();
    ctx.persist(&session)?;
    println!("Cleared the current tree");
    Ok(())
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

pub fn cmd_export(args: ExportArgs) -> CmdResult {
    let ctx = Context::open()?;
    let now = Utc::now();
    let exported_at = local_display(now);

    let text = if args.saved {
        let saved = ctx.require_saved()?;
        export_tree_text(
            &saved.task_tree,
            ExportStamp::Saved {
                saved_at: &saved.created_at,
                exported_at: &exported_at,
            },
        )?
    } else {
        let session = ctx.session()?;
        export_tree_text(
            session.require_tree()?,
            ExportStamp::Generated { at: &exported_at },
        )?
    };

    let target = match args.output {
        Some(path) => PathBuf::from(path),
        None => {
            let cwd = std::env::current_dir()?;
            let dir = ctx.ws.export_dir(&cwd);
            std::fs::create_dir_all(&dir)?;
            dir.join(export_file_name(now))
        }
    };
    atomic_write(&target, text.as_bytes())
        .map_err(|e| format!("could not write {}: {}", target.display(), e))?;
    println!("Exported to {}", target.display());
    Ok(())
}
