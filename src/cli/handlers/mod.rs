mod backend;
mod init;
mod recovery;
mod saved;
mod todo;
mod tree;

pub use init::cmd_init;

use std::error::Error;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::api::http::HttpBackend;
use crate::cli::commands::*;
use crate::io::recovery::{log_recovery, RecoveryCategory, RecoveryEntry};
use crate::io::saved_io::{self, SavedError};
use crate::io::store::{FileStore, StoreError};
use crate::io::workspace::{self, Workspace, WorkspaceError};
use crate::model::identity::IndexPath;
use crate::model::saved::SavedTree;
use crate::session::Session;

/// Global override for the workspace directory (set by -C flag)
static WORKSPACE_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

type CmdResult = Result<(), Box<dyn Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;

    if let Some(ref dir) = cli.workspace_dir {
        let abs = std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
        if let Ok(mut slot) = WORKSPACE_DIR_OVERRIDE.lock() {
            slot.replace(abs);
        }
    }

    match cli.command {
        // Init is handled in main.rs before workspace discovery
        Commands::Init(args) => cmd_init(args, cli.workspace_dir.as_deref()),
        Commands::Config(args) => init::cmd_config(args, json),

        // Current tree
        Commands::Show(args) => tree::cmd_show(args, json),
        Commands::Check => tree::cmd_check(json),
        Commands::Add(args) => tree::cmd_add(args),
        Commands::Rm(args) => tree::cmd_rm(args),
        Commands::Rename(args) => tree::cmd_rename(args),
        Commands::Emoji(args) => tree::cmd_emoji(args),
        Commands::Dep(args) => tree::cmd_dep(args),
        Commands::Flag(args) => tree::cmd_flag(args),
        Commands::FlagAll(args) => tree::cmd_flag_all(args),
        Commands::Apply(args) => tree::cmd_apply(args, json),
        Commands::Clear => tree::cmd_clear(),
        Commands::Export(args) => tree::cmd_export(args),

        // Backend
        Commands::Generate(args) => backend::cmd_generate(args, json),
        Commands::Refine(args) => backend::cmd_refine(args, json),
        Commands::Ocr(args) => backend::cmd_ocr(args, json),
        Commands::Health => backend::cmd_health(json),

        // Saved tree
        Commands::Save => saved::cmd_save(json),
        Commands::Load => saved::cmd_load(),
        Commands::DeleteSaved(args) => saved::cmd_delete_saved(args),
        Commands::View => saved::cmd_view(json),
        Commands::Complete(args) => saved::cmd_complete(args, json),

        Commands::Todo(args) => todo::cmd_todo(args, json),
        Commands::Recovery(args) => recovery::cmd_recovery(args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn start_dir() -> std::io::Result<PathBuf> {
    let override_dir = WORKSPACE_DIR_OVERRIDE
        .lock()
        .ok()
        .and_then(|slot| slot.clone());
    match override_dir {
        Some(dir) => Ok(dir),
        None => std::env::current_dir(),
    }
}

fn load_workspace_cwd() -> Result<Workspace, Box<dyn Error>> {
    let start = start_dir()?;
    let root = workspace::discover_workspace(&start)?;
    Ok(workspace::load_workspace(&root)?)
}

/// An opened workspace with its store
struct Context {
    ws: Workspace,
    store: FileStore,
}

impl Context {
    fn open() -> Result<Self, Box<dyn Error>> {
        let ws = load_workspace_cwd()?;
        let store = ws.open_store().map_err(|e| match e {
            WorkspaceError::Store(err) => store_error(&ws, err),
            other => other.into(),
        })?;
        Ok(Context { ws, store })
    }

    /// The session as the previous command left it
    fn session(&self) -> Result<Session, Box<dyn Error>> {
        let draft = saved_io::load_draft(&self.store).map_err(|e| self.saved_error(e))?;
        let session = match draft {
            Some(draft) => Session::from_draft(draft)?,
            None => Session::new(),
        };
        Ok(session.with_recovery_dir(self.ws.dir.clone()))
    }

    /// Carry the session's tree over to the next command
    fn persist(&mut self, session: &Session) -> CmdResult {
        match session.to_draft() {
            Some(draft) => saved_io::save_draft(&mut self.store, &draft)?,
            None => saved_io::clear_draft(&mut self.store)?,
        }
        Ok(())
    }

    fn require_saved(&self) -> Result<SavedTree, Box<dyn Error>> {
        saved_io::load_saved(&self.store)
            .map_err(|e| self.saved_error(e))?
            .ok_or_else(|| SavedError::NothingSaved.into())
    }

    fn backend(&self) -> Result<HttpBackend, Box<dyn Error>> {
        Ok(HttpBackend::new(&self.ws.config.backend)?)
    }

    /// Log unreadable stored data to the recovery log before reporting it
    fn saved_error(&self, err: SavedError) -> Box<dyn Error> {
        if let SavedError::InvalidTree { source, raw } = &err {
            log_recovery(
                &self.ws.dir,
                RecoveryEntry::new(RecoveryCategory::Store, source.to_string(), raw.clone())
                    .with_field("Key", saved_io::SAVED_TREE_KEY),
            );
        }
        match err {
            SavedError::Store(e) => store_error(&self.ws, e),
            other => other.into(),
        }
    }
}

fn store_error(ws: &Workspace, err: StoreError) -> Box<dyn Error> {
    if let StoreError::Corrupt { key, message, raw } = &err {
        log_recovery(
            &ws.dir,
            RecoveryEntry::new(RecoveryCategory::Store, message.clone(), raw.clone())
                .with_field("Key", key.clone()),
        );
    }
    err.into()
}

fn parse_path(raw: &str) -> Result<IndexPath, Box<dyn Error>> {
    raw.parse::<IndexPath>()
        .map_err(|e| format!("invalid path '{}': {}", raw, e).into())
}

/// Read a file, or stdin when `path` is `-`
fn read_input(path: &str) -> Result<String, Box<dyn Error>> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).map_err(|e| format!("could not read {}: {}", path, e).into())
}

/// Ask a yes/no question on stderr; anything but y/yes is no.
fn confirm(prompt: &str) -> bool {
    eprint!("{} [y/N] ", prompt);
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
