use std::error::Error;
use std::path::PathBuf;

use super::{load_workspace_cwd, print_json, CmdResult};
use crate::cli::commands::{ConfigAction, ConfigCmd, InitArgs};
use crate::io::config_io;
use crate::io::workspace::{self, WORKSPACE_DIR};

/// Resolve where `pt init` should create the workspace
fn init_root(target: Option<&str>) -> Result<PathBuf, Box<dyn Error>> {
    match target {
        Some(dir) => {
            let path = PathBuf::from(dir);
            std::fs::create_dir_all(&path)
                .map_err(|e| format!("cannot create -C path '{}': {}", dir, e))?;
            Ok(std::fs::canonicalize(&path)?)
        }
        None => Ok(std::env::current_dir()?),
    }
}

pub fn cmd_init(args: InitArgs, target: Option<&str>) -> CmdResult {
    let root = init_root(target)?;

    // Note an enclosing workspace; the new one will shadow it below this point
    if !args.force
        && let Some(parent) = root.parent()
        && let Ok(parent_root) = workspace::discover_workspace(parent)
    {
        eprintln!(
            "Note: enclosing workspace found at {}/",
            parent_root.join(WORKSPACE_DIR).display()
        );
    }

    let ws = workspace::init_workspace(&root, args.backend_url.as_deref(), args.force)?;
    println!("Initialized plantree workspace in {}", ws.dir.display());
    println!("  backend: {}", ws.config.backend.url);
    Ok(())
}

pub fn cmd_config(args: ConfigCmd, json: bool) -> CmdResult {
    let ws = load_workspace_cwd()?;
    match args.action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            if json {
                print_json(&ws.config)
            } else {
                print!("{}", toml::to_string_pretty(&ws.config)?);
                Ok(())
            }
        }
        ConfigAction::Set(set) => {
            let (_, mut doc) = config_io::read_config(&ws.dir)?;
            config_io::set_config_value(&mut doc, &set.key, &set.value)?;
            // The edited document must still load
            let _: crate::model::config::AppConfig = toml::from_str(&doc.to_string())?;
            config_io::write_config(&ws.dir, &doc)?;
            if set.value.trim().is_empty() {
                println!("Cleared {}", set.key);
            } else {
                println!("Set {} = {}", set.key, set.value.trim());
            }
            Ok(())
        }
    }
}
