//! Profile-directory storage: one file per key, replaced atomically on every write.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::dao::storage::{KeyValueStore, StorageError, StorageResult};

const VALUE_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// Key-value store persisting every key as a file inside a profile directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create when missing) the profile directory at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| {
            StorageError::unavailable(
                format!("cannot create profile directory `{}`", root.display()),
                source,
            )
        })?;
        debug!(path = %root.display(), "opened file store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str, extension: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(format!("{key}.{extension}")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key, VALUE_EXTENSION)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::unavailable(
                format!("cannot read `{}`", path.display()),
                err,
            )),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key, VALUE_EXTENSION)?;
        let temp = self.path_for(key, TEMP_EXTENSION)?;

        fs::write(&temp, value).map_err(|source| {
            StorageError::unavailable(format!("cannot write `{}`", temp.display()), source)
        })?;
        fs::rename(&temp, &path).map_err(|source| {
            StorageError::unavailable(format!("cannot replace `{}`", path.display()), source)
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key, VALUE_EXTENSION)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::unavailable(
                format!("cannot remove `{}`", path.display()),
                err,
            )),
        }
    }
}
