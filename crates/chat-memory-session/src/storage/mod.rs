//! Persistence backends.

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "memory")]
pub use memory::MemoryPersistence;

#[cfg(feature = "sqlite")]
pub use sqlite::SqlitePersistence;
