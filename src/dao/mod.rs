/// Profile-directory storage backend.
pub mod file_store;
/// In-memory storage backend.
pub mod memory_store;
/// Persisted record definitions and storage keys.
pub mod models;
/// Storage abstraction shared by every persisted store.
pub mod storage;
