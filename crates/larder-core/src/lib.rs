//! Core types and trait definitions for the Larder inventory ledger.
//!
//! No database code lives here. The crate owns the domain model (tenants,
//! locations, products, lots, aggregate stock and movement records), the
//! allocation policy, the task-local tenant context and the storage traits
//! that backends such as `larder-store-sqlite` implement.

pub mod allocation;
pub mod clock;
pub mod context;
pub mod error;
pub mod history;
pub mod id;
pub mod ledger;
pub mod lot;
pub mod movement;
pub mod operation;
pub mod stock;
pub mod store;
pub mod tenant;

pub use error::{Error, ErrorClass, Result};
