//! SQLite backend for the Larder inventory ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every logical operation is one
//! `BEGIN IMMEDIATE` transaction: the write lock is taken before any lot is
//! read, so concurrent withdrawals serialise on it instead of racing on
//! `remaining`.

mod cache;
mod encode;
mod enforcer;
mod journal;
mod lots;
mod projector;
mod schema;
mod scope;
mod session;
mod store;

pub mod error;
pub mod options;

pub use error::{Error, Result};
pub use options::StoreOptions;
pub use session::TenantSession;
pub use store::SqliteStore;
