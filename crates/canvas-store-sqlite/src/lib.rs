//! SQLite backend for the canvas record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The schema is owned by a numbered set
//! of migration scripts applied by [`migrate::MigrationRunner`] before the
//! store accepts any traffic.

mod acl;
mod audit;
mod encode;
mod search;
mod store;

pub mod error;
pub mod migrate;
pub mod schema;

pub use error::{Error, Result};
pub use migrate::{Migration, MigrationRecord, MigrationReport, MigrationRunner};
pub use store::{DefaultAdmin, SqliteStore, StoreOptions};
