use std::fs;
use std::path::{Path, PathBuf};

use crate::io::config_io::{self, ConfigError, CONFIG_FILE};
use crate::io::store::{FileStore, StoreError};
use crate::model::config::AppConfig;

/// Name of the workspace directory
pub const WORKSPACE_DIR: &str = ".plantree";

const CONFIG_TEMPLATE: &str = r##"# plantree workspace settings

[backend]
# Base URL of the planning service
url = "{url}"
# Seconds to wait for a backend response. Leave unset to wait indefinitely.
# timeout_secs = 120

[store]
# Saved tree, to-do lists and completion state, relative to .plantree/
dir = "store"

# [export]
# dir = "exports"
"##;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("not a plantree workspace: no .plantree/ directory found (run `pt init`)")]
    NotAWorkspace,
    #[error("already initialized: {0}")]
    AlreadyInitialized(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not create {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// An opened workspace: where it lives and how it is configured
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory containing `.plantree/`
    pub root: PathBuf,
    /// The `.plantree/` directory itself
    pub dir: PathBuf,
    pub config: AppConfig,
}

impl Workspace {
    pub fn store_dir(&self) -> PathBuf {
        self.dir.join(&self.config.store.dir)
    }

    pub fn open_store(&self) -> Result<FileStore, WorkspaceError> {
        Ok(FileStore::open(&self.store_dir())?)
    }

    /// Where `pt export` writes files
    pub fn export_dir(&self, cwd: &Path) -> PathBuf {
        match &self.config.export.dir {
            Some(dir) => self.root.join(dir),
            None => cwd.to_path_buf(),
        }
    }
}

/// Walk up from `start` looking for a directory containing `.plantree/config.toml`.
pub fn discover_workspace(start: &Path) -> Result<PathBuf, WorkspaceError> {
    let mut current = start.to_path_buf();
    loop {
        let dir = current.join(WORKSPACE_DIR);
        if dir.is_dir() && dir.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(WorkspaceError::NotAWorkspace);
        }
    }
}

pub fn load_workspace(root: &Path) -> Result<Workspace, WorkspaceError> {
    let dir = root.join(WORKSPACE_DIR);
    if !dir.is_dir() {
        return Err(WorkspaceError::NotAWorkspace);
    }
    let (config, _doc) = config_io::read_config(&dir)?;
    Ok(Workspace {
        root: root.to_path_buf(),
        dir,
        config,
    })
}

/// Create `.plantree/` under `root` with a commented config and an empty store.
pub fn init_workspace(
    root: &Path,
    backend_url: Option<&str>,
    force: bool,
) -> Result<Workspace, WorkspaceError> {
    let dir = root.join(WORKSPACE_DIR);
    if dir.join(CONFIG_FILE).exists() && !force {
        return Err(WorkspaceError::AlreadyInitialized(dir));
    }
    fs::create_dir_all(&dir).map_err(|e| WorkspaceError::Create {
        path: dir.clone(),
        source: e,
    })?;

    let mut doc: toml_edit::DocumentMut = CONFIG_TEMPLATE
        .replace("{url}", "http://localhost:8000")
        .parse()
        .map_err(ConfigError::from)?;
    if let Some(url) = backend_url {
        config_io::set_config_value(&mut doc, "backend.url", url)?;
    }
    config_io::write_config(&dir, &doc)?;

    let workspace = load_workspace(root)?;
    workspace.open_store()?;
    Ok(workspace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_then_load() {
        let tmp = TempDir::new().unwrap();
        let ws = init_workspace(tmp.path(), None, false).unwrap();
        assert_eq!(ws.config.backend.url, "http://localhost:8000");
        assert!(ws.store_dir().is_dir());

        let loaded = load_workspace(tmp.path()).unwrap();
        assert_eq!(loaded.dir, tmp.path().join(".plantree"));
    }

    #[test]
    fn test_init_with_url() {
        let tmp = TempDir::new().unwrap();
        let ws = init_workspace(tmp.path(), Some("https://planner.internal:9000/"), false).unwrap();
        assert_eq!(ws.config.backend.url, "https://planner.internal:9000");
        let text = fs::read_to_string(ws.dir.join(CONFIG_FILE)).unwrap();
        assert!(text.contains("# timeout_secs = 120"));
    }

    #[test]
    fn test_init_twice_needs_force() {
        let tmp = TempDir::new().unwrap();
        init_workspace(tmp.path(), None, false).unwrap();
        assert!(matches!(
            init_workspace(tmp.path(), None, false),
            Err(WorkspaceError::AlreadyInitialized(_))
        ));
        assert!(init_workspace(tmp.path(), None, true).is_ok());
    }

    #[test]
    fn test_discover_walks_up() {
        let tmp = TempDir::new().unwrap();
        init_workspace(tmp.path(), None, false).unwrap();
        let nested = tmp.path().join("notes").join("week1");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(discover_workspace(&nested).unwrap(), tmp.path());
    }

    #[test]
    fn test_discover_fails_outside() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            discover_workspace(tmp.path()),
            Err(WorkspaceError::NotAWorkspace)
        ));
    }

    #[test]
    fn test_export_dir() {
        let tmp = TempDir::new().unwrap();
        let mut ws = init_workspace(tmp.path(), None, false).unwrap();
        let cwd = tmp.path().join("elsewhere");
        assert_eq!(ws.export_dir(&cwd), cwd);
        ws.config.export.dir = Some("exports".into());
        assert_eq!(ws.export_dir(&cwd), tmp.path().join("exports"));
    }
}
