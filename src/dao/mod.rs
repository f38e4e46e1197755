/// Chat-completion provider client.
pub mod completion;
/// Entity definitions shared by every backend.
pub mod models;
/// Storage error types.
pub mod storage;
/// Store traits and their Postgres / in-memory implementations.
pub mod store;
