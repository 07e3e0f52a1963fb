use super::SessionError;
use std::{
    collections::BTreeMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::debug;
use ulid::Ulid;

/// Local persistent key/value storage, the browser's `localStorage` contract.
pub trait SessionStorage: Send + Sync {
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// # Errors
    /// Returns an error if the store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;

    /// # Errors
    /// Returns an error if the store cannot be written.
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let entries = self.entries.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().map_err(|_| SessionError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().map_err(|_| SessionError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// JSON object on disk; one file per operator.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, SessionError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    // Private (0600) sibling file renamed over the real one; readers only see whole files.
    fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), SessionError> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir)?;
        }

        let file_name = self
            .path
            .file_name()
            .map_or_else(|| "session".into(), |name| name.to_string_lossy());
        let temp_name = format!(".{file_name}.{}.tmp", Ulid::new());
        let temp_path = dir.map_or_else(|| PathBuf::from(&temp_name), |dir| dir.join(&temp_name));

        let written = write_private(&temp_path, &serde_json::to_vec_pretty(entries)?)
            .and_then(|()| fs::rename(&temp_path, &self.path));

        if let Err(err) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }

        debug!(path = %self.path.display(), "session storage written");

        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().map_err(|_| SessionError::Poisoned)?;
        let mut entries = self.load()?;
        f(&mut entries);
        self.store(&entries)
    }
}

fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let _guard = self.lock.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}
