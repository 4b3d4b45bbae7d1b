//! Message store implementations for shelftalk.
//!
//! Two backends implement [`shelftalk_core::Repository`]:
//! - [`SqliteRepository`] — the durable store (feature `sqlite`, default)
//! - [`InMemoryRepository`] — for tests and ephemeral sessions

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryRepository;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRepository;
