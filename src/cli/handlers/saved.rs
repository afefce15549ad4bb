use chrono::Utc;

use super::{confirm, print_json, CmdResult, Context};
use crate::cli::commands::{CompleteArgs, DeleteSavedArgs};
use crate::cli::output::{saved_to_json, tree_lines, CompletedJson, TreeListing};
use crate::io::completion::CompletionStore;
use crate::io::saved_io::{self, SavedError};
use crate::model::identity::NodeKey;
use crate::model::saved::SAVED_TREE_ID;
use crate::model::tree::TaskTree;
use crate::ops::tree_ops::{locate, node_at};

pub fn cmd_save(json: bool) -> CmdResult {
    let mut ctx = Context::open()?;
    let session = ctx.session()?;
    let tree = session.require_tree()?;
    let replacing = saved_io::has_saved(&ctx.store)?;

    let (saved, dropped) = saved_io::save_tree(&mut ctx.store, tree, Utc::now())?;
    if !dropped.is_empty() {
        eprintln!(
            "warning: cleared {} completion mark(s) that no longer match the saved tree: {}",
            dropped.len(),
            dropped.join(", ")
        );
    }
    if json {
        return print_json(&saved);
    }
    if replacing {
        println!("Replaced the saved tree ({})", saved.created_at);
    } else {
        println!("Saved tree ({})", saved.created_at);
    }
    Ok(())
}

pub fn cmd_load() -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    let saved = ctx.require_saved()?;
    let created_at = saved.created_at.clone();
    session.load_saved(saved)?;
    ctx.persist(&session)?;
    println!("Loaded tree saved {}", created_at);
    Ok(())
}

pub fn cmd_delete_saved(args: DeleteSavedArgs) -> CmdResult {
    let mut ctx = Context::open()?;
    if !saved_io::has_saved(&ctx.store)? {
        return Err(SavedError::NothingSaved.into());
    }
    if !args.yes
        && !confirm("Delete the saved tree, its progress and all to-do lists? This cannot be undone.")
    {
        println!("Cancelled");
        return Ok(());
    }
    saved_io::delete_saved(&mut ctx.store)?;
    println!("Deleted the saved tree");
    Ok(())
}

pub fn cmd_view(json: bool) -> CmdResult {
    let mut ctx = Context::open()?;
    let saved = ctx.require_saved()?;
    let state = CompletionStore::new(&mut ctx.store)
        .get(SAVED_TREE_ID)
        .map_err(|e| super::store_error(&ctx.ws, e))?;

    if json {
        return print_json(&saved_to_json(&saved, &state));
    }
    println!("Saved {}\n", saved.created_at);
    for line in tree_lines(
        &saved.task_tree,
        &TreeListing {
            paths: true,
            completion: Some(&state),
        },
    ) {
        println!("{}", line);
    }
    Ok(())
}

/// The completion key for a user-supplied node reference: a path pointing at
/// a node with an id is turned into that id.
fn completion_key_for(tree: &TaskTree, raw: &str) -> String {
    match NodeKey::parse_loose(raw.trim()) {
        NodeKey::Positional(path) => match node_at(tree, &path).and_then(|n| n.id()) {
            Some(id) => id.to_string(),
            None => path.to_string(),
        },
        NodeKey::StableId(id) => id,
    }
}

pub fn cmd_complete(args: CompleteArgs, json: bool) -> CmdResult {
    let mut ctx = Context::open()?;
    let saved = ctx.require_saved()?;
    let key = completion_key_for(&saved.task_tree, &args.key);
    if locate(&saved.task_tree, &NodeKey::parse_loose(&key)).is_none() {
        eprintln!("warning: {} does not match any node in the saved tree", key);
    }

    let checked = !args.off;
    let written = CompletionStore::new(&mut ctx.store)
        .set_cascading(SAVED_TREE_ID, &saved.task_tree, &key, checked)?;

    if json {
        return print_json(&CompletedJson {
            checked,
            keys: &written,
        });
    }
    println!(
        "{} {} node(s)",
        if checked { "Checked" } else { "Unchecked" },
        written.len()
    );
    Ok(())
}
