/**
 * Persistence of the per-install user identifier.
 *
 * The first `initialize` on a device creates a random UUID and stores it;
 * later runs load the same value, which is also how the SDK tells a
 * `first_open` from an `open`.
 *
 * The store is injected through `InitOptions` and owned by the tracker,
 * so embedders decide where (and whether) the id survives restarts.
 */
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name used by `FileUserIdStore::in_dir`.
pub const USER_ID_FILE: &str = "activity_tracker_user_id";

pub trait UserIdStore: Send + Sync {
    /// Returns the stored id, or `None` if nothing has been stored yet.
    fn load(&self) -> io::Result<Option<String>>;

    fn store(&self, user_id: &str) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// FileUserIdStore
// ---------------------------------------------------------------------------

/**
 * Keeps the id as the sole content of a single file.
 *
 * A missing or blank file reads as "no id". Parent directories are
 * created on first store.
 */
#[derive(Debug, Clone)]
pub struct FileUserIdStore {
    path: PathBuf,
}

impl FileUserIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stores the id in `dir/activity_tracker_user_id`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(USER_ID_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UserIdStore for FileUserIdStore {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let id = content.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn store(&self, user_id: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, user_id)
    }
}

// ---------------------------------------------------------------------------
// MemoryUserIdStore
// ---------------------------------------------------------------------------

/// Process-local store; every new instance starts empty.
#[derive(Debug, Default)]
pub struct MemoryUserIdStore {
    user_id: Mutex<Option<String>>,
}

impl MemoryUserIdStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `user_id`, as on a returning install.
    pub fn with_user_id(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Mutex::new(Some(user_id.into())),
        }
    }
}

impl UserIdStore for MemoryUserIdStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self
            .user_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn store(&self, user_id: &str) -> io::Result<()> {
        *self
            .user_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(user_id.to_string());
        Ok(())
    }
}
