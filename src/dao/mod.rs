/// Persisted record definitions.
pub mod models;
/// Persistence collaborator abstraction and its backends.
pub mod room_store;
/// Storage abstraction layer for database operations.
pub mod storage;
