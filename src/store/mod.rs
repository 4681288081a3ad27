//! Persistence for store accounts, refresh tokens and deals.

pub mod base;
pub mod memory_store;
pub mod mongodb_store;

pub use base::{create_store, Store, StoreError};
