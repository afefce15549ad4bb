use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Lock file kept inside the locked directory
pub const LOCK_FILE: &str = ".pt.lock";

const DEFAULT_WAIT: Duration = Duration::from_secs(5);
const MAX_PAUSE: Duration = Duration::from_millis(100);

/// Exclusive advisory lock on a `.plantree/` directory (the blob store, or
/// the workspace itself for the recovery log), held for the length of one
/// write and released when dropped.
///
/// Only the `flock` matters; the file itself stays behind. Whoever holds the
/// lock writes its pid into the file so a waiting `pt` can report it.
pub struct DirLock {
    _file: File,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{dir} is busy{}", holder_note(.holder))]
    Busy { dir: PathBuf, holder: Option<u32> },
}

fn holder_note(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!(" (another pt process, pid {}, is writing)", pid),
        None => " (another pt process is writing)".to_string(),
    }
}

impl DirLock {
    /// Lock `dir`, retrying with a growing pause until `wait` has passed.
    pub fn acquire(dir: &Path, wait: Duration) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + wait;
        let mut pause = Duration::from_millis(5);
        while !try_flock(&file) {
            if Instant::now() >= deadline {
                return Err(LockError::Busy {
                    dir: dir.to_path_buf(),
                    holder: read_holder(&mut file),
                });
            }
            std::thread::sleep(pause);
            pause = (pause * 2).min(MAX_PAUSE);
        }

        // The pid is informational only
        let _ = record_holder(&mut file);
        Ok(DirLock { _file: file })
    }

    pub fn acquire_default(dir: &Path) -> Result<Self, LockError> {
        Self::acquire(dir, DEFAULT_WAIT)
    }
}

fn record_holder(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write!(file, "{}", std::process::id())?;
    file.flush()
}

fn read_holder(file: &mut File) -> Option<u32> {
    file.seek(SeekFrom::Start(0)).ok()?;
    let mut text = String::new();
    file.read_to_string(&mut text).ok()?;
    text.trim().parse().ok()
}

/// Non-blocking exclusive flock; released when the descriptor closes
#[cfg(unix)]
fn try_flock(file: &File) -> bool {
    use std::os::unix::io::AsRawFd;
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 }
}

#[cfg(not(unix))]
fn try_flock(_file: &File) -> bool {
    true
}
