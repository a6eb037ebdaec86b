use std::error::Error;

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::warn;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying medium.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("failed to encode value for key `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid storage key `{key}`")]
    InvalidKey { key: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Synchronous string key-value storage, modelled on browser local storage.
///
/// Each logical collection or preference lives under a single key and is rewritten in full on
/// every mutation. Concurrent writers are not coordinated: the last write wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Read and decode a JSON value stored under `key`.
///
/// Missing keys, unreadable backends and corrupt JSON all yield `None`: a damaged entry must
/// never prevent the client from starting with defaults.
pub fn read_json<T>(store: &dyn KeyValueStore, key: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!(key, error = %err, "failed to read stored value; using defaults");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "stored value is not valid JSON; using defaults");
            None
        }
    }
}

/// Encode `value` as JSON and write it under `key` in a single write.
pub fn write_json<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> StorageResult<()>
where
    T: ?Sized + Serialize,
{
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}
